use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::layout::TimeSlot;
use crate::types::{day_index, Lesson};

/// Student recorded for exports whose file name does not carry one
pub const UNKNOWN_STUDENT: &str = "Unknown";

/// Lesson text found in one timetable cell, before times are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellText {
    pub teacher: String,
    pub subject: String,
    pub start: String,
    pub end: String,
}

/// Extract the student from an export file name.
///
/// `"Students schedule new - Turan.csv"` -> `"Turan"`.
pub fn student_from_filename(file_name: &str) -> String {
    file_name
        .split(" - ")
        .nth(1)
        .map(|part| part.trim_end_matches(".csv").trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_STUDENT)
        .to_string()
}

/// Split a timetable cell into its lesson parts.
///
/// A lesson cell holds at least three non-empty lines: teacher, subject and,
/// last, a time range such as `14.00 - 16.00`. Anything else is not a lesson.
pub fn parse_cell(cell: &str) -> Option<CellText> {
    let lines: Vec<&str> = cell
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 3 {
        return None;
    }

    let range = lines[lines.len() - 1];
    let times: Vec<&str> = range.split('-').map(str::trim).collect();
    if times.len() != 2 {
        return None;
    }

    Some(CellText {
        teacher: lines[0].to_string(),
        subject: lines[1].to_string(),
        start: times[0].replace('.', ":"),
        end: times[1].replace('.', ":"),
    })
}

/// Parse a timetable export file.
pub fn parse_csv_file(path: &Path) -> Result<Vec<Lesson>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    parse_csv(&content, file_name)
}

/// Parse the content of one timetable export.
///
/// The export has a few free-form lines on top, then a header row naming the
/// weekdays, then one row per time band. Every day column cell that holds a
/// lesson becomes a [`Lesson`] for the student named in `file_name`.
pub fn parse_csv(content: &str, file_name: &str) -> Result<Vec<Lesson>> {
    let rows = read_rows(content)?;
    let student = student_from_filename(file_name);

    let Some(header_idx) = find_header_row(&rows) else {
        warn!(file = %file_name, "No weekday header row, skipping file");
        return Ok(Vec::new());
    };

    let day_columns = map_day_columns(&rows[header_idx]);
    debug!(file = %file_name, columns = day_columns.len(), "Found day columns");

    let mut lessons = Vec::new();

    for (col, day) in day_columns {
        for row in rows.iter().skip(header_idx + 1) {
            let Some(cell) = row.get(col).and_then(|c| parse_cell(c)) else {
                continue;
            };
            match (cell.start.parse::<TimeSlot>(), cell.end.parse::<TimeSlot>()) {
                (Ok(start), Ok(end)) => lessons.push(
                    Lesson::new(
                        cell.teacher,
                        student.clone(),
                        cell.subject,
                        day,
                        start,
                        end,
                    )
                    .with_source(file_name),
                ),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(file = %file_name, teacher = %cell.teacher, error = %e, "Bad lesson time");
                }
            }
        }
    }

    Ok(lessons)
}

/// Read every CSV record as a row of strings. Rows may differ in length.
fn read_rows(content: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed CSV record")?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// The header is the first row mentioning Monday.
fn find_header_row(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter()
        .position(|row| row.iter().any(|c| c.to_lowercase().contains("monday")))
}

/// Map header columns that name a weekday to that day's index.
fn map_day_columns(header: &[String]) -> Vec<(usize, u8)> {
    header
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let first_word = h.split_whitespace().next()?;
            day_index(first_word).map(|day| (i, day))
        })
        .collect()
}
