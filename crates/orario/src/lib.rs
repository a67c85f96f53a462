//! Lesson timetables for a small tutoring centre.
//!
//! Lessons are imported from spreadsheet CSV exports or booked by hand,
//! stored in SQLite, and shown as weekly or per-room grids laid out by
//! [`layout::layout`].

pub mod color;
pub mod config;
pub mod db;
pub mod error;
pub mod html;
pub mod import;
pub mod layout;
pub mod parser;
pub mod search;
pub mod server;
pub mod types;
pub mod views;
