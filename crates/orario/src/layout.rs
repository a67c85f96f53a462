//! Slot grid layout.
//!
//! Places time-ranged entries onto a grid of `axis x time slot` cells. An
//! entry longer than one slot becomes an anchor cell with a row span, and the
//! slots it covers below the anchor are suppressed. The computation is a pure
//! function of its inputs and never fails: entries that cannot be placed are
//! left out of the grid and reported through [`Grid::dropped`].

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::hash_map::{Entry as MapEntry, HashMap};
use std::fmt;
use std::str::FromStr;

/// Default distance between two consecutive slots, in minutes.
pub const DEFAULT_STEP_MINUTES: u16 = 30;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A clock time, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u16);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time {0:?}, expected HH:MM")]
pub struct ParseTimeSlotError(String);

impl TimeSlot {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour.checked_mul(60)?.checked_add(minute)?)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Returns `None` when the result would reach or pass midnight.
    pub fn checked_add_minutes(self, minutes: u16) -> Option<Self> {
        Self::from_minutes(self.0.checked_add(minutes)?)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Accepts `HH:MM` as well as the dotted `HH.MM` used in timetable exports.
impl FromStr for TimeSlot {
    type Err = ParseTimeSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('.', ":");
        let time = NaiveTime::parse_from_str(&normalized, "%H:%M")
            .map_err(|_| ParseTimeSlotError(s.to_string()))?;
        // hour() < 24 and minute() < 60, so this always fits
        Self::from_hm(time.hour() as u16, time.minute() as u16)
            .ok_or_else(|| ParseTimeSlotError(s.to_string()))
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The vertical dimension of a grid: evenly spaced, strictly increasing slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxis {
    slots: Vec<TimeSlot>,
    step: u16,
}

impl TimeAxis {
    /// Slots from `start_hour:00` up to, but not including, `end_hour:00`.
    ///
    /// A zero step falls back to [`DEFAULT_STEP_MINUTES`]; `end_hour` is capped
    /// at midnight.
    pub fn new(start_hour: u16, end_hour: u16, step_minutes: u16) -> Self {
        let step = if step_minutes == 0 {
            DEFAULT_STEP_MINUTES
        } else {
            step_minutes
        };
        let first = start_hour.saturating_mul(60);
        let last = end_hour.min(24).saturating_mul(60);

        let slots = (first..last)
            .step_by(usize::from(step))
            .filter_map(TimeSlot::from_minutes)
            .collect();

        Self { slots, step }
    }

    /// Wrap an explicit slot list. The step is taken from the first two slots.
    pub fn from_slots(mut slots: Vec<TimeSlot>) -> Self {
        slots.sort_unstable();
        slots.dedup();
        let step = match slots.as_slice() {
            [a, b, ..] => b.minutes() - a.minutes(),
            _ => DEFAULT_STEP_MINUTES,
        };
        Self { slots, step }
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn step(&self) -> u16 {
        self.step
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn position(&self, time: TimeSlot) -> Option<usize> {
        self.slots.binary_search(&time).ok()
    }

    /// Number of rows an entry covers, rounded to the nearest slot, at least one.
    fn span_for(&self, start: TimeSlot, end: TimeSlot) -> usize {
        let duration = i32::from(end.minutes()) - i32::from(start.minutes());
        if duration <= 0 {
            return 1;
        }
        let rows = (f64::from(duration) / f64::from(self.step)).round() as usize;
        rows.max(1)
    }
}

/// One occupancy of an axis column between two times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry<A, P> {
    pub id: i64,
    pub axis: A,
    pub start: TimeSlot,
    pub end: TimeSlot,
    pub payload: P,
}

/// A single coordinate of the laid out grid.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridCell<'a, A, P> {
    /// Nothing scheduled here.
    Empty,
    /// Top cell of an entry, covering `span` consecutive rows.
    Anchor { entry: &'a Entry<A, P>, span: usize },
    /// Covered by an anchor above it; renders nothing.
    Suppressed,
}

impl<A, P> Clone for GridCell<'_, A, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, P> Copy for GridCell<'_, A, P> {}

/// Why an entry did not make it onto the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Its axis value is not one of the grid's columns.
    UnknownAxis,
    /// Its start time is not one of the grid's slots.
    OffGrid,
    /// An earlier entry already anchors the same cell.
    Collision,
    /// Its anchor cell lies under an earlier entry's span.
    Covered,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::UnknownAxis => "unknown column",
            DropReason::OffGrid => "start time not on the grid",
            DropReason::Collision => "cell already taken",
            DropReason::Covered => "covered by a longer entry",
        };
        f.write_str(s)
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Dropped<'a, A, P> {
    pub entry: &'a Entry<A, P>,
    pub reason: DropReason,
}

/// Output of [`layout`]: one column of cells per axis value.
#[derive(Debug, Serialize)]
pub struct Grid<'a, A, P> {
    slots: &'a [TimeSlot],
    axis: &'a [A],
    columns: Vec<Vec<GridCell<'a, A, P>>>,
    dropped: Vec<Dropped<'a, A, P>>,
}

impl<'a, A, P> Grid<'a, A, P> {
    pub fn slots(&self) -> &'a [TimeSlot] {
        self.slots
    }

    pub fn axis(&self) -> &'a [A] {
        self.axis
    }

    pub fn cell(&self, axis_idx: usize, slot_idx: usize) -> Option<&GridCell<'a, A, P>> {
        self.columns.get(axis_idx)?.get(slot_idx)
    }

    pub fn column(&self, axis_idx: usize) -> Option<&[GridCell<'a, A, P>]> {
        self.columns.get(axis_idx).map(Vec::as_slice)
    }

    /// Cells of one time-slot row, left to right. Table renderers walk the
    /// grid row by row and skip suppressed cells.
    pub fn row(&self, slot_idx: usize) -> impl Iterator<Item = &GridCell<'a, A, P>> + '_ {
        self.columns.iter().filter_map(move |col| col.get(slot_idx))
    }

    pub fn cells(&self) -> impl Iterator<Item = &GridCell<'a, A, P>> + '_ {
        self.columns.iter().flatten()
    }

    /// Every placed entry with its column, row and span.
    pub fn anchors(&self) -> impl Iterator<Item = (usize, usize, &'a Entry<A, P>, usize)> + '_ {
        self.columns.iter().enumerate().flat_map(|(col, cells)| {
            cells.iter().enumerate().filter_map(move |(row, cell)| match *cell {
                GridCell::Anchor { entry, span } => Some((col, row, entry, span)),
                _ => None,
            })
        })
    }

    pub fn dropped(&self) -> &[Dropped<'a, A, P>] {
        &self.dropped
    }
}

/// Lay `entries` out on an `axis x time` grid.
///
/// Columns follow `axis` order and rows follow `time` order. When two entries
/// start in the same cell the first one in `entries` wins.
pub fn layout<'a, A, P>(
    time: &'a TimeAxis,
    axis: &'a [A],
    entries: &'a [Entry<A, P>],
) -> Grid<'a, A, P>
where
    A: PartialEq,
{
    let mut dropped = Vec::new();
    let mut anchors: HashMap<(usize, usize), &'a Entry<A, P>> = HashMap::new();

    for entry in entries {
        let Some(col) = axis.iter().position(|a| *a == entry.axis) else {
            dropped.push(Dropped {
                entry,
                reason: DropReason::UnknownAxis,
            });
            continue;
        };
        let Some(row) = time.position(entry.start) else {
            dropped.push(Dropped {
                entry,
                reason: DropReason::OffGrid,
            });
            continue;
        };
        match anchors.entry((col, row)) {
            MapEntry::Occupied(_) => dropped.push(Dropped {
                entry,
                reason: DropReason::Collision,
            }),
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    let rows = time.len();
    let mut columns = Vec::with_capacity(axis.len());

    for col in 0..axis.len() {
        let mut cells = Vec::with_capacity(rows);
        // Rows below this index are covered by the last anchor's span.
        let mut covered_until = 0;

        for row in 0..rows {
            let anchor = anchors.get(&(col, row)).copied();

            if row < covered_until {
                if let Some(entry) = anchor {
                    dropped.push(Dropped {
                        entry,
                        reason: DropReason::Covered,
                    });
                }
                cells.push(GridCell::Suppressed);
                continue;
            }

            match anchor {
                Some(entry) => {
                    let span = time.span_for(entry.start, entry.end).min(rows - row);
                    covered_until = row + span;
                    cells.push(GridCell::Anchor { entry, span });
                }
                None => cells.push(GridCell::Empty),
            }
        }

        columns.push(cells);
    }

    Grid {
        slots: time.slots(),
        axis,
        columns,
        dropped,
    }
}
