//! Weekly and per-room timetable views.
//!
//! A view owns the time axis, the column axis and the lesson entries, and
//! lays them out on demand with [`layout`]. Both views share the same layout
//! code and differ only in what a column is.

use serde::Serialize;
use tracing::warn;

use crate::color::{color_for_name, Swatch};
use crate::config::ViewConfig;
use crate::layout::{layout, Entry, Grid, TimeAxis};
use crate::types::{day_name, Lesson, Role, GRID_DAYS};

/// What the grid shows and how a lesson card reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewKind {
    /// One person's week; columns are weekdays.
    Week { person: String, role: Role },
    /// One weekday across rooms; columns are rooms.
    Rooms { day: u8 },
}

/// Payload attached to every grid entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card<'l> {
    #[serde(flatten)]
    pub lesson: &'l Lesson,
    /// Name that picks the card colour
    pub color_by: &'l str,
    pub color: Swatch,
}

impl<'l> Card<'l> {
    fn new(lesson: &'l Lesson, color_by: &'l str) -> Self {
        Self {
            lesson,
            color_by,
            color: color_for_name(color_by),
        }
    }
}

pub struct View<'l, A> {
    pub kind: ViewKind,
    /// Column headers, one per axis value
    pub labels: Vec<String>,
    axis: Vec<A>,
    time: TimeAxis,
    entries: Vec<Entry<A, Card<'l>>>,
}

impl<'l, A: PartialEq> View<'l, A> {
    /// Lay the lessons out. Lessons that do not fit are logged and left out.
    pub fn grid(&self) -> Grid<'_, A, Card<'l>> {
        let grid = layout(&self.time, &self.axis, &self.entries);
        for dropped in grid.dropped() {
            let lesson = dropped.entry.payload.lesson;
            warn!(
                id = lesson.id,
                teacher = %lesson.teacher,
                student = %lesson.student,
                room = %lesson.room,
                start = %lesson.start,
                reason = %dropped.reason,
                "Lesson not shown on grid"
            );
        }
        grid
    }

    pub fn lesson_count(&self) -> usize {
        self.entries.len()
    }

    /// Weekday and room a click on an empty cell in `column` should prefill.
    pub fn cell_target(&self, column: usize) -> (u8, Option<&str>) {
        match &self.kind {
            ViewKind::Week { .. } => (column as u8, None),
            ViewKind::Rooms { day } => (*day, self.labels.get(column).map(String::as_str)),
        }
    }

    /// Title used for headings and download file names.
    pub fn title(&self) -> String {
        match &self.kind {
            ViewKind::Week { person, .. } => person.clone(),
            ViewKind::Rooms { day } => day_name(*day).unwrap_or_default().to_string(),
        }
    }
}

/// One person's week. Cards are coloured by the other participant.
pub fn weekly_view<'l>(person: &str, role: Role, lessons: &'l [Lesson], cfg: ViewConfig) -> View<'l, u8> {
    let axis: Vec<u8> = (0..GRID_DAYS as u8).collect();
    let labels = axis
        .iter()
        .filter_map(|d| day_name(*d))
        .map(str::to_string)
        .collect();

    let entries = lessons
        .iter()
        .map(|lesson| Entry {
            id: lesson.id,
            axis: lesson.day,
            start: lesson.start,
            end: lesson.end,
            payload: Card::new(lesson, lesson.other_participant(person)),
        })
        .collect();

    View {
        kind: ViewKind::Week {
            person: person.to_string(),
            role,
        },
        labels,
        axis,
        time: cfg.time_axis(),
        entries,
    }
}

/// All rooms on one weekday. Cards are coloured by teacher. Lessons on other
/// days are ignored; lessons in rooms outside `rooms` cannot be placed.
pub fn rooms_view<'l>(day: u8, lessons: &'l [Lesson], rooms: &[String], cfg: ViewConfig) -> View<'l, String> {
    let entries = lessons
        .iter()
        .filter(|lesson| lesson.day == day)
        .map(|lesson| Entry {
            id: lesson.id,
            axis: lesson.room.clone(),
            start: lesson.start,
            end: lesson.end,
            payload: Card::new(lesson, &lesson.teacher),
        })
        .collect();

    View {
        kind: ViewKind::Rooms { day },
        labels: rooms.to_vec(),
        axis: rooms.to_vec(),
        time: cfg.time_axis(),
        entries,
    }
}
