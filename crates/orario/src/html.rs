use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::config::{Roster, ViewConfig};
use crate::layout::GridCell;
use crate::search::Query;
use crate::types::{day_name, Lesson, GRID_DAYS};
use crate::views::{rooms_view, weekly_view, Card, View, ViewKind};

/// Which half of the split weekly view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// What a panel's search turned up.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelOutcome {
    /// Nothing searched yet
    Blank,
    /// The text named nobody
    NotUnderstood,
    Schedule { query: Query, lessons: Vec<Lesson> },
}

impl PanelOutcome {
    /// The person whose week is shown, if any
    pub fn query(&self) -> Option<&Query> {
        match self {
            PanelOutcome::Schedule { query, .. } => Some(query),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub text: String,
    pub outcome: PanelOutcome,
}

impl Panel {
    pub fn blank() -> Self {
        Self {
            text: String::new(),
            outcome: PanelOutcome::Blank,
        }
    }
}

/// Everything the main page shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Week { left: Panel, right: Panel },
    Rooms { day: u8, lessons: Vec<Lesson> },
}

pub fn render_page(page: &Page, roster: &Roster) -> Markup {
    let is_week = matches!(page, Page::Week { .. });

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Orario" }
                style { (PreEscaped(CSS)) }
            }
            body {
                header.top-bar {
                    div.brand { "Orario" }
                    nav.view-selector {
                        a.active[is_week] href="/?view=week" { "Weekly" }
                        a.active[!is_week] href="/?view=rooms" { "Rooms" }
                    }
                    @if is_week {
                        div.target-selector {
                            button type="button" data-target="left" { "Left" }
                            button type="button" data-target="right" { "Right" }
                        }
                    }
                    form.upload-form #"upload-form" {
                        label.upload-btn {
                            "Import CSV"
                            input #"upload-input" type="file" name="files" accept=".csv" multiple hidden;
                        }
                    }
                }
                div.main-layout {
                    (render_sidebar(roster))
                    main.content-area {
                        @match page {
                            Page::Week { left, right } => {
                                div.split-view {
                                    (render_panel(Side::Left, left, &right.text))
                                    (render_panel(Side::Right, right, &left.text))
                                }
                            }
                            Page::Rooms { day, lessons } => {
                                (render_rooms(*day, lessons, roster))
                            }
                        }
                    }
                }
                (render_booking_modal(roster))
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

fn render_sidebar(roster: &Roster) -> Markup {
    html! {
        aside.sidebar {
            div.sidebar-section {
                h4 { "Teachers" }
                ul {
                    @for name in &roster.teachers {
                        li data-name=(name) { (name) }
                    }
                }
            }
            div.sidebar-section {
                h4 { "Students" }
                ul {
                    @for name in &roster.students {
                        li data-name=(name) { (name) }
                    }
                }
            }
        }
    }
}

fn render_panel(side: Side, panel: &Panel, other_text: &str) -> Markup {
    let title = match side {
        Side::Left => "Left panel",
        Side::Right => "Right panel",
    };

    html! {
        section.schedule-column data-side=(side.as_str()) {
            div.column-header {
                div.header-top {
                    h3 { (title) }
                    @if let Some(query) = panel.outcome.query() {
                        form.export-form method="get" action="/export/week.svg" {
                            input type="hidden" name="person" value=(query.person);
                            button.export-btn type="submit" { "Download" }
                        }
                    }
                }
                form.mini-search method="get" action="/" data-side=(side.as_str()) {
                    input type="hidden" name="view" value="week";
                    input type="hidden" name=(side.other().as_str()) value=(other_text);
                    input type="search" name=(side.as_str()) value=(panel.text) placeholder="Search...";
                    button type="submit" { "Search" }
                }
            }
            div.column-content {
                @match &panel.outcome {
                    PanelOutcome::Blank => {
                        div.empty-state { "Search for a teacher or student." }
                    }
                    PanelOutcome::NotUnderstood => {
                        div.message-card.error { "Could not understand the request." }
                    }
                    PanelOutcome::Schedule { query, lessons } => {
                        @let view = weekly_view(&query.person, query.role, lessons, ViewConfig::WEEKLY);
                        div.schedule-card {
                            h4 { "Schedule: " (query.person) }
                            (render_grid(&view))
                        }
                    }
                }
            }
        }
    }
}

fn render_rooms(day: u8, lessons: &[Lesson], roster: &Roster) -> Markup {
    let view = rooms_view(day, lessons, &roster.rooms, ViewConfig::ROOMS);
    let days = 0..GRID_DAYS as u8;

    html! {
        section.daily-view {
            div.daily-header-bar {
                nav.day-tabs {
                    @for d in days {
                        a.day-btn.active[d == day] href={ "/?view=rooms&day=" (d) } {
                            (day_name(d).unwrap_or_default())
                        }
                    }
                }
                form.export-form method="get" action="/export/rooms.svg" {
                    input type="hidden" name="day" value=(day);
                    button.export-btn type="submit" { "Download" }
                }
            }
            div.schedule-card {
                h4 { (view.title()) }
                (render_grid(&view))
            }
        }
    }
}

/// Timetable as an HTML table. Placed lessons span rows; the cells they
/// cover are left out.
fn render_grid<A: PartialEq>(view: &View<'_, A>) -> Markup {
    let grid = view.grid();

    html! {
        div.table-wrapper {
            table.timetable {
                thead {
                    tr {
                        th.corner-cell { "Time" }
                        @for label in &view.labels {
                            th { (label) }
                        }
                    }
                }
                tbody {
                    @for (row, slot) in grid.slots().iter().enumerate() {
                        tr {
                            td.time-col { (slot.to_string()) }
                            @for (col, cell) in grid.row(row).enumerate() {
                                @match cell {
                                    GridCell::Anchor { entry, span } => {
                                        (render_lesson_cell(&view.kind, &entry.payload, *span))
                                    }
                                    GridCell::Empty => {
                                        @let (day, room) = view.cell_target(col);
                                        td.cell-free
                                            data-day=(day)
                                            data-day-name=(day_name(day).unwrap_or_default())
                                            data-time=(slot.to_string())
                                            data-room=[room] {
                                            div.add-hint { "+" }
                                        }
                                    }
                                    GridCell::Suppressed => {}
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_lesson_cell(kind: &ViewKind, card: &Card<'_>, span: usize) -> Markup {
    let lesson = card.lesson;
    let color = card.color;

    html! {
        td.cell-busy
            rowspan=(span)
            style={ "background-color:" (color.bg) ";border-left:4px solid " (color.border) } {
            div.lesson-info {
                button.delete-btn type="button" data-lesson-id=(lesson.id) title="Delete" { "×" }
                div.subj style={ "color:" (color.border) } { (lesson.subject) }
                @match kind {
                    ViewKind::Week { .. } => {
                        div.partic { (card.color_by) }
                        div.room-badge { (lesson.room) }
                    }
                    ViewKind::Rooms { .. } => {
                        div.partic { (lesson.teacher) }
                        div.partic.student { (lesson.student) }
                    }
                }
                div.duration-badge { (lesson.start.to_string()) "-" (lesson.end.to_string()) }
            }
        }
    }
}

fn render_booking_modal(roster: &Roster) -> Markup {
    html! {
        div.modal-overlay #"booking-modal" hidden {
            div.modal-content {
                h3 #"booking-title" { "New lesson" }
                form #"booking-form" {
                    input type="hidden" name="day_idx" value="0";
                    input type="hidden" name="start_time" value="";
                    div.form-row {
                        label {
                            "Teacher"
                            select name="teacher" required {
                                option value="" { "-" }
                                @for name in &roster.teachers {
                                    option value=(name) { (name) }
                                }
                            }
                        }
                        label {
                            "Room"
                            select name="room" {
                                @for room in &roster.rooms {
                                    option value=(room) { (room) }
                                }
                            }
                        }
                    }
                    label {
                        "Student"
                        select name="student" required {
                            option value="" { "-" }
                            @for name in &roster.students {
                                option value=(name) { (name) }
                            }
                        }
                    }
                    label {
                        "Subject"
                        input type="text" name="subject" value="Math" required;
                    }
                    label {
                        "Duration"
                        select name="duration" {
                            @for minutes in [30, 60, 90, 120] {
                                option value=(minutes) selected[minutes == 60] { (minutes) " min" }
                            }
                        }
                    }
                    p.form-message #"booking-message" {}
                    div.modal-actions {
                        button type="button" data-close-modal { "Cancel" }
                        button.save-btn type="submit" { "Save" }
                    }
                }
            }
        }
    }
}

const SVG_TITLE_H: usize = 40;
const SVG_HEADER_H: usize = 30;
const SVG_ROW_H: usize = 28;
const SVG_TIME_W: usize = 60;
const SVG_COL_W: usize = 130;

/// Standalone SVG drawing of a view's grid, for download.
///
/// Elements are written with explicit close tags so the output is
/// well-formed XML.
pub fn render_svg<A: PartialEq>(view: &View<'_, A>) -> String {
    let grid = view.grid();
    let columns = view.labels.len();
    let width = SVG_TIME_W + columns * SVG_COL_W;
    let top = SVG_TITLE_H + SVG_HEADER_H;
    let height = top + grid.slots().len() * SVG_ROW_H;

    let markup = html! {
        svg xmlns="http://www.w3.org/2000/svg"
            width=(width)
            height=(height)
            viewBox={ "0 0 " (width) " " (height) }
            font-family="Inter, Helvetica, Arial, sans-serif" {
            rect x="0" y="0" width=(width) height=(height) fill="#ffffff" {}
            text x="10" y="26" font-size="18" font-weight="bold" fill="#0f172a" { (view.title()) }

            rect x="0" y=(SVG_TITLE_H) width=(width) height=(SVG_HEADER_H) fill="#f1f5f9" {}
            text x="8" y=(SVG_TITLE_H + 20) font-size="12" fill="#475569" { "Time" }
            @for (col, label) in view.labels.iter().enumerate() {
                text x=(SVG_TIME_W + col * SVG_COL_W + 6) y=(SVG_TITLE_H + 20)
                    font-size="12" font-weight="bold" fill="#0f172a" { (label) }
            }

            @for (row, slot) in grid.slots().iter().enumerate() {
                @let y = top + row * SVG_ROW_H;
                text x="8" y=(y + 18) font-size="11" fill="#64748b" { (slot.to_string()) }
                @for (col, cell) in grid.row(row).enumerate() {
                    @if matches!(cell, GridCell::Empty) {
                        rect x=(SVG_TIME_W + col * SVG_COL_W) y=(y)
                            width=(SVG_COL_W) height=(SVG_ROW_H)
                            fill="none" stroke="#e2e8f0" {}
                    }
                }
            }

            @for (col, row, entry, span) in grid.anchors() {
                @let x = SVG_TIME_W + col * SVG_COL_W;
                @let y = top + row * SVG_ROW_H;
                @let card = &entry.payload;
                rect x=(x + 1) y=(y + 1)
                    width=(SVG_COL_W - 2) height=(span * SVG_ROW_H - 2)
                    rx="4" fill=(card.color.bg) stroke=(card.color.border) {}
                @for (i, line) in svg_card_lines(&view.kind, card).iter().enumerate() {
                    text x=(x + 6) y=(y + 13 + i * 12) font-size="10"
                        font-weight=(if i == 0 { "bold" } else { "normal" })
                        fill=(if i == 0 { card.color.border } else { "#1e293b" }) {
                        (line)
                    }
                }
            }
        }
    };

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
        markup.into_string()
    )
}

fn svg_card_lines(kind: &ViewKind, card: &Card<'_>) -> Vec<String> {
    let lesson = card.lesson;
    let time = format!("{}-{}", lesson.start, lesson.end);
    match kind {
        ViewKind::Week { .. } => vec![
            lesson.subject.clone(),
            card.color_by.to_string(),
            lesson.room.clone(),
            time,
        ],
        ViewKind::Rooms { .. } => vec![
            lesson.subject.clone(),
            lesson.teacher.clone(),
            lesson.student.clone(),
            time,
        ],
    }
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: 'Inter', -apple-system, BlinkMacSystemFont, sans-serif;
    background: #f8fafc;
    color: #0f172a;
    min-height: 100vh;
    line-height: 1.4;
}

.top-bar {
    display: flex;
    align-items: center;
    gap: 16px;
    padding: 10px 20px;
    background: #ffffff;
    border-bottom: 1px solid #e2e8f0;
}

.brand {
    font-weight: 900;
    font-size: 1.2rem;
    margin-right: auto;
}

.view-selector, .target-selector, .day-tabs {
    display: flex;
    gap: 4px;
    background: #f1f5f9;
    padding: 4px;
    border-radius: 8px;
}

.view-selector a, .target-selector button, .day-btn {
    border: none;
    background: transparent;
    padding: 6px 12px;
    border-radius: 6px;
    color: #475569;
    text-decoration: none;
    font-weight: 600;
    cursor: pointer;
}

.view-selector a.active, .target-selector button.active, .day-btn.active {
    background: #ffffff;
    color: #0f172a;
    box-shadow: 0 1px 2px rgba(0, 0, 0, 0.1);
}

.upload-btn, .export-btn, .save-btn {
    background: #2563eb;
    color: #ffffff;
    border: none;
    padding: 6px 14px;
    border-radius: 6px;
    font-weight: 600;
    cursor: pointer;
}

.main-layout {
    display: flex;
    min-height: calc(100vh - 56px);
}

.sidebar {
    width: 180px;
    background: #ffffff;
    border-right: 1px solid #e2e8f0;
    padding: 12px;
    overflow-y: auto;
}

.sidebar h4 {
    font-size: 0.75rem;
    text-transform: uppercase;
    color: #64748b;
    margin: 12px 0 6px;
}

.sidebar ul {
    list-style: none;
}

.sidebar li {
    padding: 4px 8px;
    border-radius: 4px;
    cursor: pointer;
}

.sidebar li:hover {
    background: #eff6ff;
}

.content-area {
    flex: 1;
    padding: 16px;
    overflow: auto;
}

.split-view {
    display: grid;
    grid-template-columns: 1fr 1fr;
    gap: 16px;
}

.column-header {
    display: flex;
    flex-direction: column;
    gap: 8px;
    margin-bottom: 12px;
}

.header-top {
    display: flex;
    justify-content: space-between;
    align-items: center;
}

.mini-search {
    display: flex;
    gap: 6px;
}

.mini-search input {
    flex: 1;
    padding: 6px 10px;
    border: 1px solid #cbd5e1;
    border-radius: 6px;
}

.schedule-card {
    background: #ffffff;
    border-radius: 8px;
    padding: 12px;
    box-shadow: 0 1px 3px rgba(0, 0, 0, 0.08);
}

.schedule-card h4 {
    margin-bottom: 8px;
}

.empty-state, .message-card {
    padding: 24px;
    text-align: center;
    color: #64748b;
}

.message-card.error {
    color: #b91c1c;
}

.daily-header-bar {
    display: flex;
    justify-content: space-between;
    align-items: center;
    margin-bottom: 12px;
}

.table-wrapper {
    overflow-x: auto;
}

.timetable {
    width: 100%;
    border-collapse: collapse;
    table-layout: fixed;
    font-size: 0.75rem;
}

.timetable th, .timetable td {
    border: 1px solid #e2e8f0;
    height: 28px;
    vertical-align: top;
}

.timetable th {
    background: #f1f5f9;
    padding: 4px;
}

.corner-cell, .time-col {
    width: 56px;
    color: #64748b;
    text-align: center;
}

.cell-free {
    cursor: pointer;
}

.cell-free:hover {
    background: #eff6ff;
}

.add-hint {
    display: none;
    text-align: center;
    color: #2563eb;
    font-weight: 700;
}

.cell-free:hover .add-hint {
    display: block;
}

.lesson-info {
    position: relative;
    padding: 3px 5px;
}

.subj {
    font-weight: 900;
}

.partic.student {
    font-style: italic;
}

.room-badge, .duration-badge {
    display: inline-block;
    font-size: 0.65rem;
    color: #475569;
    margin-right: 4px;
}

.delete-btn {
    position: absolute;
    top: 2px;
    right: 2px;
    border: none;
    background: transparent;
    color: #94a3b8;
    cursor: pointer;
    font-size: 0.9rem;
}

.delete-btn:hover {
    color: #dc2626;
}

.modal-overlay {
    position: fixed;
    inset: 0;
    background: rgba(15, 23, 42, 0.4);
    display: flex;
    align-items: center;
    justify-content: center;
}

.modal-overlay[hidden] {
    display: none;
}

.modal-content {
    background: #ffffff;
    border-radius: 10px;
    padding: 20px;
    width: 360px;
}

.modal-content form {
    display: flex;
    flex-direction: column;
    gap: 10px;
    margin-top: 12px;
}

.modal-content label {
    display: flex;
    flex-direction: column;
    font-size: 0.8rem;
    color: #475569;
    gap: 4px;
}

.form-row {
    display: flex;
    gap: 10px;
}

.form-message {
    color: #b91c1c;
    font-size: 0.8rem;
}

.modal-actions {
    display: flex;
    justify-content: flex-end;
    gap: 8px;
}
"#;

const JAVASCRIPT: &str = r#"
(function() {
    const ACTIVE_KEY = 'orario-active-panel';

    function activePanel() {
        return localStorage.getItem(ACTIVE_KEY) || 'left';
    }

    function setActivePanel(side) {
        localStorage.setItem(ACTIVE_KEY, side);
        document.querySelectorAll('[data-target]').forEach(btn => {
            btn.classList.toggle('active', btn.dataset.target === side);
        });
    }

    document.querySelectorAll('[data-target]').forEach(btn => {
        btn.addEventListener('click', () => setActivePanel(btn.dataset.target));
    });
    setActivePanel(activePanel());

    // Sidebar names load into the active panel
    document.querySelectorAll('.sidebar li[data-name]').forEach(item => {
        item.addEventListener('click', () => {
            const form = document.querySelector(`form.mini-search[data-side="${activePanel()}"]`);
            if (!form) {
                window.location = '/?view=week&left=' + encodeURIComponent(item.dataset.name);
                return;
            }
            form.querySelector(`input[name="${form.dataset.side}"]`).value = item.dataset.name;
            form.submit();
        });
    });

    document.querySelectorAll('.delete-btn').forEach(btn => {
        btn.addEventListener('click', async (e) => {
            e.stopPropagation();
            if (!confirm('Delete this lesson?')) return;
            try {
                const res = await fetch(`/api/lessons/${btn.dataset.lessonId}`, { method: 'DELETE' });
                const body = await res.json();
                if (body.status !== 'success') alert(body.message);
                window.location.reload();
            } catch (err) {
                alert('Connection error');
            }
        });
    });

    const modal = document.getElementById('booking-modal');
    const bookingForm = document.getElementById('booking-form');
    const bookingMessage = document.getElementById('booking-message');

    document.querySelectorAll('.cell-free').forEach(cell => {
        cell.addEventListener('click', () => {
            bookingForm.elements.day_idx.value = cell.dataset.day;
            bookingForm.elements.start_time.value = cell.dataset.time;
            if (cell.dataset.room) bookingForm.elements.room.value = cell.dataset.room;
            document.getElementById('booking-title').textContent =
                `${cell.dataset.dayName} at ${cell.dataset.time}`;
            bookingMessage.textContent = '';
            modal.hidden = false;
        });
    });

    modal.addEventListener('click', (e) => {
        if (e.target === modal || e.target.hasAttribute('data-close-modal')) modal.hidden = true;
    });

    bookingForm.addEventListener('submit', async (e) => {
        e.preventDefault();
        const data = Object.fromEntries(new FormData(bookingForm));
        data.day_idx = Number(data.day_idx);
        data.duration = Number(data.duration);
        try {
            const res = await fetch('/api/lessons', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(data),
            });
            const body = await res.json();
            if (body.status === 'success') {
                window.location.reload();
            } else {
                bookingMessage.textContent = body.message;
            }
        } catch (err) {
            bookingMessage.textContent = 'Connection error';
        }
    });

    const uploadInput = document.getElementById('upload-input');
    uploadInput.addEventListener('change', async () => {
        if (!uploadInput.files.length) return;
        const data = new FormData();
        for (const file of uploadInput.files) data.append('files', file);
        try {
            const res = await fetch('/api/upload', { method: 'POST', body: data });
            const body = await res.json();
            alert(body.message);
            window.location.reload();
        } catch (err) {
            alert('Connection error');
        }
    });
})();
"#;
