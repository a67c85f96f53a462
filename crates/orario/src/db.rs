//! Database operations module for SQLite storage
//!
//! This module handles all database operations including:
//! - Database initialization and migrations
//! - CRUD operations for lessons
//! - Person and day queries for the grid views
//! - Booking conflict lookup

use anyhow::{Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::layout::TimeSlot;
use crate::types::{Lesson, Role};

/// Schema migrations, applied in order and recorded in `schema_migrations`
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    include_str!("../db/migrations/001_initial_schema.sql"),
)];

const LESSON_COLUMNS: &str =
    "id, teacher, student, subject, room, day, start_minute, end_minute, source";

impl ToSql for TimeSlot {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.minutes())))
    }
}

impl FromSql for TimeSlot {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let minutes = i64::column_result(value)?;
        u16::try_from(minutes)
            .ok()
            .and_then(TimeSlot::from_minutes)
            .ok_or(FromSqlError::OutOfRange(minutes))
    }
}

/// Initialize the database at the given path, running any pending migrations
pub fn init_db(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let count = run_migrations(&conn)?;
    if count > 0 {
        info!(count = count, "Applied migrations");
    }

    Ok(conn)
}

/// Run pending migrations
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version TEXT PRIMARY KEY,
             applied_at TEXT NOT NULL
         );",
    )?;

    let mut applied = 0;

    for (version, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )?;

        if already_applied {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("Failed to apply migration: {}", version))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;

        debug!(version = %version, "Applied migration");
        applied += 1;
    }

    Ok(applied)
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        teacher: row.get(1)?,
        student: row.get(2)?,
        subject: row.get(3)?,
        room: row.get(4)?,
        day: row.get(5)?,
        start: row.get(6)?,
        end: row.get(7)?,
        source: row.get(8)?,
    })
}

/// Escape a search term for use inside `LIKE '%' || ?1 || '%' ESCAPE '\'`
fn like_escape(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Insert a new lesson and return its id
pub fn insert_lesson(conn: &Connection, lesson: &Lesson) -> Result<i64> {
    conn.execute(
        "INSERT INTO lessons (teacher, student, subject, room, day, start_minute, end_minute, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            lesson.teacher,
            lesson.student,
            lesson.subject,
            lesson.room,
            lesson.day,
            lesson.start,
            lesson.end,
            lesson.source,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a lesson unless the same teacher, student, subject, day and times
/// are already stored. Re-importing an export therefore adds nothing.
pub fn insert_lesson_if_not_exists(conn: &Connection, lesson: &Lesson) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM lessons
         WHERE teacher = ?1 AND student = ?2 AND subject = ?3
           AND day = ?4 AND start_minute = ?5 AND end_minute = ?6",
        params![
            lesson.teacher,
            lesson.student,
            lesson.subject,
            lesson.day,
            lesson.start,
            lesson.end,
        ],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    insert_lesson(conn, lesson)?;
    Ok(true)
}

/// Import multiple lessons in one transaction, skipping duplicates.
/// Returns the number of lessons actually inserted.
pub fn import_lessons(conn: &Connection, lessons: &[Lesson]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    for lesson in lessons {
        if insert_lesson_if_not_exists(&tx, lesson)? {
            count += 1;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Get a single lesson by ID
pub fn get_lesson(conn: &Connection, id: i64) -> Result<Option<Lesson>> {
    let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
    let lesson = conn.query_row(&sql, [id], lesson_from_row).optional()?;
    Ok(lesson)
}

/// Delete a lesson by ID
pub fn delete_lesson(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM lessons WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

/// Lessons where `name` appears in the teacher and/or student column,
/// case-insensitively, oldest first
pub fn lessons_for_person(conn: &Connection, name: &str, role: Role) -> Result<Vec<Lesson>> {
    let filter = match role {
        Role::Teacher => "teacher LIKE '%' || ?1 || '%' ESCAPE '\\'",
        Role::Student => "student LIKE '%' || ?1 || '%' ESCAPE '\\'",
        Role::Any => {
            "(teacher LIKE '%' || ?1 || '%' ESCAPE '\\' OR student LIKE '%' || ?1 || '%' ESCAPE '\\')"
        }
    };
    let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE {filter} ORDER BY id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let lessons = stmt
        .query_map([like_escape(name)], lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lessons)
}

/// All lessons on one weekday, oldest first
pub fn lessons_for_day(conn: &Connection, day: u8) -> Result<Vec<Lesson>> {
    let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE day = ?1 ORDER BY id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let lessons = stmt
        .query_map([day], lesson_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lessons)
}

/// Count all lessons in the database
pub fn count_lessons(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM lessons", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Why a booking cannot go ahead
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    TeacherBusy(String),
    StudentBusy(String),
    RoomBusy { room: String, teacher: String },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::TeacherBusy(name) | Conflict::StudentBusy(name) => {
                write!(f, "{} is busy at that time", name)
            }
            Conflict::RoomBusy { room, teacher } => {
                write!(f, "Room {} is taken at that time ({})", room, teacher)
            }
        }
    }
}

/// Find the first lesson that overlaps the proposed booking.
///
/// The teacher is checked first, then the student (unless blank or
/// "unknown"), then the room. Two lessons overlap when each starts before
/// the other ends.
pub fn find_conflict(conn: &Connection, lesson: &Lesson) -> Result<Option<Conflict>> {
    const OVERLAP: &str = "day = ?2 AND start_minute < ?4 AND end_minute > ?3";

    let busy = |column: &str, value: &str| -> Result<Option<String>> {
        let sql = format!(
            "SELECT teacher FROM lessons WHERE {column} = ?1 COLLATE NOCASE AND {OVERLAP} LIMIT 1"
        );
        let found = conn
            .query_row(
                &sql,
                params![value, lesson.day, lesson.start, lesson.end],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    };

    if busy("teacher", &lesson.teacher)?.is_some() {
        return Ok(Some(Conflict::TeacherBusy(lesson.teacher.clone())));
    }

    let student = lesson.student.trim();
    if !student.is_empty()
        && !student.eq_ignore_ascii_case("unknown")
        && busy("student", student)?.is_some()
    {
        return Ok(Some(Conflict::StudentBusy(lesson.student.clone())));
    }

    if !lesson.room.is_empty() {
        if let Some(teacher) = busy("room", &lesson.room)? {
            return Ok(Some(Conflict::RoomBusy {
                room: lesson.room.clone(),
                teacher,
            }));
        }
    }

    Ok(None)
}
