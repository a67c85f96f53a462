use serde::{Deserialize, Serialize};

use crate::layout::{ParseTimeSlotError, TimeSlot};

/// Room given to lessons whose source does not say where they happen.
pub const DEFAULT_ROOM: &str = "Cab 1";

/// Source tag for lessons booked through the UI.
pub const MANUAL_SOURCE: &str = "Manual";

/// Weekday names, Monday first. Index = `Lesson::day`.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// The timetable grids show Monday to Saturday.
pub const GRID_DAYS: usize = 6;

pub fn day_name(day: u8) -> Option<&'static str> {
    WEEKDAYS.get(usize::from(day)).copied()
}

/// Day index for a full English weekday name as exports spell it ("Monday").
/// Abbreviations are not weekdays: an export column headed "Sat" is skipped.
pub fn day_index(name: &str) -> Option<u8> {
    let name = name.trim();
    WEEKDAYS.iter().position(|d| *d == name).map(|i| i as u8)
}

/// A single lesson in the weekly timetable
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Lesson {
    /// Database id, 0 until stored
    pub id: i64,

    pub teacher: String,

    pub student: String,

    pub subject: String,

    pub room: String,

    /// Day of the week, Monday = 0
    #[serde(rename = "day_idx")]
    pub day: u8,

    pub start: TimeSlot,

    pub end: TimeSlot,

    /// File the lesson was imported from, or "Manual"
    pub source: String,
}

impl Lesson {
    pub fn new(
        teacher: String,
        student: String,
        subject: String,
        day: u8,
        start: TimeSlot,
        end: TimeSlot,
    ) -> Self {
        Self {
            id: 0,
            teacher,
            student,
            subject,
            room: DEFAULT_ROOM.to_string(),
            day,
            start,
            end,
            source: MANUAL_SOURCE.to_string(),
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// The participant to highlight when looking at `person`'s schedule:
    /// the teacher if `person` is the student, the student otherwise.
    pub fn other_participant(&self, person: &str) -> &str {
        if self.student == person {
            &self.teacher
        } else {
            &self.student
        }
    }

    pub fn duration_minutes(&self) -> i32 {
        i32::from(self.end.minutes()) - i32::from(self.start.minutes())
    }
}

/// Which side of a lesson a person search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
    #[default]
    Any,
}

/// A booking request from the "add lesson" form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLesson {
    pub teacher: String,
    pub student: String,
    pub subject: String,
    #[serde(default)]
    pub room: String,
    pub day_idx: u8,
    pub start_time: String,
    /// Length in minutes
    pub duration: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("unknown day index {0}")]
    UnknownDay(u8),
    #[error(transparent)]
    Time(#[from] ParseTimeSlotError),
    #[error("duration must be positive")]
    ZeroDuration,
    #[error("lesson would end after midnight")]
    PastMidnight,
}

impl NewLesson {
    /// Validate the request and turn it into an unsaved lesson.
    pub fn into_lesson(self) -> Result<Lesson, BookingError> {
        for (field, value) in [
            ("teacher", &self.teacher),
            ("student", &self.student),
            ("subject", &self.subject),
        ] {
            if value.trim().is_empty() {
                return Err(BookingError::Missing(field));
            }
        }
        if day_name(self.day_idx).is_none() {
            return Err(BookingError::UnknownDay(self.day_idx));
        }
        if self.duration == 0 {
            return Err(BookingError::ZeroDuration);
        }

        let start: TimeSlot = self.start_time.parse()?;
        let end = start
            .checked_add_minutes(self.duration)
            .ok_or(BookingError::PastMidnight)?;

        let room = if self.room.trim().is_empty() {
            DEFAULT_ROOM.to_string()
        } else {
            self.room.trim().to_string()
        };

        Ok(Lesson::new(
            self.teacher.trim().to_string(),
            self.student.trim().to_string(),
            self.subject.trim().to_string(),
            self.day_idx,
            start,
            end,
        )
        .with_room(room))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeSlot {
        s.parse().unwrap()
    }

    fn request(start: &str, duration: u16) -> NewLesson {
        NewLesson {
            teacher: "Adina".to_string(),
            student: "Turan".to_string(),
            subject: "Math".to_string(),
            room: "6 у окна".to_string(),
            day_idx: 2,
            start_time: start.to_string(),
            duration,
        }
    }

    #[test]
    fn test_day_names() {
        assert_eq!(day_name(0), Some("Monday"));
        assert_eq!(day_name(5), Some("Saturday"));
        assert_eq!(day_name(7), None);
    }

    #[test]
    fn test_day_index_full_names_only() {
        assert_eq!(day_index("Monday"), Some(0));
        assert_eq!(day_index("Saturday "), Some(5));
        assert_eq!(day_index("Sunday"), Some(6));
        assert_eq!(day_index("Sun"), None);
        assert_eq!(day_index("tue"), None);
        assert_eq!(day_index("Time:"), None);
    }

    #[test]
    fn test_lesson_defaults() {
        let lesson = Lesson::new(
            "Adina".to_string(),
            "Turan".to_string(),
            "Math".to_string(),
            0,
            t("09:00"),
            t("10:30"),
        );
        assert_eq!(lesson.id, 0);
        assert_eq!(lesson.room, DEFAULT_ROOM);
        assert_eq!(lesson.source, MANUAL_SOURCE);
        assert_eq!(lesson.duration_minutes(), 90);
    }

    #[test]
    fn test_other_participant() {
        let lesson = Lesson::new(
            "Adina".to_string(),
            "Turan".to_string(),
            "Math".to_string(),
            0,
            t("09:00"),
            t("10:00"),
        );
        assert_eq!(lesson.other_participant("Turan"), "Adina");
        assert_eq!(lesson.other_participant("Adina"), "Turan");
    }

    #[test]
    fn test_lesson_serialization() {
        let lesson = Lesson::new(
            "Adina".to_string(),
            "Turan".to_string(),
            "Math".to_string(),
            3,
            t("14:00"),
            t("16:00"),
        )
        .with_source("Students schedule new - Turan.csv");

        let json = serde_json::to_value(&lesson).unwrap();
        assert_eq!(json["day_idx"], 3);
        assert_eq!(json["start"], "14:00");
        assert_eq!(json["end"], "16:00");
        assert_eq!(json["room"], "Cab 1");
    }

    #[test]
    fn test_role_deserialization() {
        let role: Role = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(role, Role::Teacher);
        assert_eq!(Role::default(), Role::Any);
    }

    #[test]
    fn test_new_lesson_into_lesson() {
        let lesson = request("16:30", 90).into_lesson().unwrap();
        assert_eq!(lesson.start, t("16:30"));
        assert_eq!(lesson.end, t("18:00"));
        assert_eq!(lesson.day, 2);
        assert_eq!(lesson.room, "6 у окна");
        assert_eq!(lesson.source, MANUAL_SOURCE);
    }

    #[test]
    fn test_new_lesson_blank_room_uses_default() {
        let mut req = request("09:00", 60);
        req.room = "  ".to_string();
        assert_eq!(req.into_lesson().unwrap().room, DEFAULT_ROOM);
    }

    #[test]
    fn test_new_lesson_validation() {
        let mut req = request("09:00", 60);
        req.teacher = String::new();
        assert_eq!(req.into_lesson(), Err(BookingError::Missing("teacher")));

        let mut req = request("09:00", 60);
        req.day_idx = 9;
        assert_eq!(req.into_lesson(), Err(BookingError::UnknownDay(9)));

        assert_eq!(
            request("09:00", 0).into_lesson(),
            Err(BookingError::ZeroDuration)
        );
        assert_eq!(
            request("23:30", 60).into_lesson(),
            Err(BookingError::PastMidnight)
        );
        assert!(matches!(
            request("nine", 60).into_lesson(),
            Err(BookingError::Time(_))
        ));
    }
}
