//! Roster and view configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::layout::TimeAxis;
use crate::types::Role;

const TEACHERS: &[&str] = &[
    "Adina", "Assel", "Bagdan", "Damir", "Diana", "Erkezhan", "Polina", "Raushan", "Shapagat",
    "Togzhan", "Yernur",
];

const STUDENTS: &[&str] = &[
    "Alizhan", "Amina", "Ayazhan", "Batyrali", "Eskendir", "Kaisar", "Karina", "Madina",
    "Mukhamadi", "Nurlyzhan", "Olzhas", "Sayazhan", "Sultanali", "Timur", "Turan", "Zeine",
    "Zere", "Zhasmin", "Alua", "Birganym", "Lyazzat", "Amirkhan",
];

const ROOMS: &[&str] = &[
    "6 передний",
    "6 у окна",
    "8 передний",
    "8 у окна",
    "19 передний",
    "19 у окна",
];

/// People and rooms known to the centre.
///
/// Sidebar, search and the rooms grid all read from here. Any list left out
/// of a roster file keeps its built-in default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub teachers: Vec<String>,
    pub students: Vec<String>,
    pub rooms: Vec<String>,
}

impl Default for Roster {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            teachers: owned(TEACHERS),
            students: owned(STUDENTS),
            rooms: owned(ROOMS),
        }
    }
}

impl Roster {
    /// Load a roster from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster file: {}", path.display()))?;
        let roster: Roster = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse roster file: {}", path.display()))?;

        debug!(
            teachers = roster.teachers.len(),
            students = roster.students.len(),
            rooms = roster.rooms.len(),
            "Loaded roster"
        );
        Ok(roster)
    }

    pub fn is_teacher(&self, name: &str) -> bool {
        self.teachers.iter().any(|t| t == name)
    }

    /// Which side of a lesson `name` sits on, if the roster knows them.
    pub fn role_of(&self, name: &str) -> Role {
        if self.is_teacher(name) {
            Role::Teacher
        } else if self.students.iter().any(|s| s == name) {
            Role::Student
        } else {
            Role::Any
        }
    }
}

/// Hour range and slot size of one grid view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfig {
    pub start_hour: u16,
    pub end_hour: u16,
    pub step_minutes: u16,
}

impl ViewConfig {
    /// One person's week, 08:00 to 20:30.
    pub const WEEKLY: ViewConfig = ViewConfig {
        start_hour: 8,
        end_hour: 21,
        step_minutes: 30,
    };

    /// All rooms on one day, 09:00 to 18:30.
    pub const ROOMS: ViewConfig = ViewConfig {
        start_hour: 9,
        end_hour: 19,
        step_minutes: 30,
    };

    pub fn time_axis(&self) -> TimeAxis {
        TimeAxis::new(self.start_hour, self.end_hour, self.step_minutes)
    }
}
