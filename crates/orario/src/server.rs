use anyhow::Context;
use axum::{
    extract::{self, Multipart, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Datelike;
use notify_debouncer_mini::{
    new_debouncer,
    notify::{RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::config::{Roster, ViewConfig};
use crate::db;
use crate::error::{AppError, AppResult, Status, StatusMessage};
use crate::html::{self, Page, Panel, PanelOutcome};
use crate::import;
use crate::parser;
use crate::search::analyze_intent;
use crate::types::{day_name, Lesson, NewLesson, Role, GRID_DAYS};
use crate::views::{rooms_view, weekly_view};

/// Application state shared across requests
pub struct AppState {
    pub db: Mutex<Connection>,
    pub roster: Roster,
}

impl AppState {
    pub fn new(conn: Connection, roster: Roster) -> Self {
        Self {
            db: Mutex::new(conn),
            roster,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/search", post(search_handler))
        .route("/api/daily", post(daily_handler))
        .route("/api/layout/week", get(week_layout_handler))
        .route("/api/layout/rooms", get(rooms_layout_handler))
        .route("/api/lessons", post(create_lesson_handler))
        .route("/api/lessons/{id}", delete(delete_lesson_handler))
        .route("/api/upload", post(upload_handler))
        .route("/export/week.svg", get(export_week_handler))
        .route("/export/rooms.svg", get(export_rooms_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server, optionally watching `watch_dir` for new exports
pub async fn serve(port: u16, state: Arc<AppState>, watch_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let _watcher = match watch_dir {
        Some(dir) => Some(start_file_watcher(state.clone(), &dir).await?),
        None => None,
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(url = %format!("http://{}", addr), "Server running");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Import what is already in `dir`, then keep importing CSV files that
/// appear or change there. The returned debouncer must be kept alive.
async fn start_file_watcher(
    state: Arc<AppState>,
    dir: &Path,
) -> anyhow::Result<Debouncer<RecommendedWatcher>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        info!(dir = %dir.display(), "Created import directory");
    }

    {
        let conn = state.db.lock().await;
        import::import_dir(&conn, dir)?;
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<PathBuf>>(10);

    let mut debouncer = new_debouncer(
        Duration::from_secs(2),
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let changed: Vec<PathBuf> = events
                    .into_iter()
                    .map(|e| e.path)
                    .filter(|p| import::is_csv(p) && p.is_file())
                    .collect();

                if !changed.is_empty() {
                    let _ = tx.blocking_send(changed);
                }
            }
            Err(e) => warn!(error = %e, "File watch error"),
        },
    )
    .context("Failed to create file watcher")?;

    debouncer
        .watcher()
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    info!(dir = %dir.display(), "Watching for new exports");

    tokio::spawn(async move {
        while let Some(paths) = rx.recv().await {
            debug!(count = paths.len(), "Detected changed exports");
            let conn = state.db.lock().await;
            if let Err(e) = import::import_paths(&conn, &paths) {
                error!(error = %e, "Failed to import changed exports");
            }
        }
    });

    Ok(debouncer)
}

/// Weekday shown when the rooms view is opened without one
fn default_day() -> u8 {
    let today = chrono::Local::now().weekday().num_days_from_monday() as u8;
    if usize::from(today) < GRID_DAYS {
        today
    } else {
        0
    }
}

fn check_day(day: u8) -> AppResult<u8> {
    match day_name(day) {
        Some(_) => Ok(day),
        None => Err(AppError::BadRequest(format!("Unknown day index {}", day))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexParams {
    view: Option<String>,
    day: Option<u8>,
    left: Option<String>,
    right: Option<String>,
}

/// Serve the main HTML page
async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndexParams>,
) -> AppResult<Html<String>> {
    let conn = state.db.lock().await;

    let page = if params.view.as_deref() == Some("rooms") {
        let day = params
            .day
            .filter(|d| usize::from(*d) < GRID_DAYS)
            .unwrap_or_else(default_day);
        let lessons = db::lessons_for_day(&conn, day)?;
        Page::Rooms { day, lessons }
    } else {
        Page::Week {
            left: load_panel(&conn, &state.roster, params.left)?,
            right: load_panel(&conn, &state.roster, params.right)?,
        }
    };

    let markup = html::render_page(&page, &state.roster);
    Ok(Html(markup.into_string()))
}

fn load_panel(conn: &Connection, roster: &Roster, text: Option<String>) -> anyhow::Result<Panel> {
    let text = text.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(Panel::blank());
    }

    let outcome = match analyze_intent(&text, roster) {
        Some(query) => {
            let lessons = db::lessons_for_person(conn, &query.person, query.role)?;
            PanelOutcome::Schedule { query, lessons }
        }
        None => PanelOutcome::NotUnderstood,
    };

    Ok(Panel { text, outcome })
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    status: Status,
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    data: Vec<Lesson>,
    person: String,
}

/// Free-text lookup of one person's week
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Response> {
    let Some(query) = analyze_intent(&request.text, &state.roster) else {
        debug!(text = %request.text, "Search named nobody");
        let body = StatusMessage::new(Status::Error, "Could not understand the request.");
        return Ok(Json(body).into_response());
    };

    let conn = state.db.lock().await;
    let data = first_per_slot(db::lessons_for_person(&conn, &query.person, query.role)?);

    Ok(Json(SearchResponse {
        status: Status::Success,
        message: format!("Schedule: {}", query.person),
        kind: "weekly_table",
        data,
        person: query.person,
    })
    .into_response())
}

/// Keep the first lesson at each weekday and start time
fn first_per_slot(lessons: Vec<Lesson>) -> Vec<Lesson> {
    let mut seen = HashSet::new();
    lessons
        .into_iter()
        .filter(|lesson| seen.insert((lesson.day, lesson.start)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct DayRequest {
    day_idx: u8,
}

#[derive(Debug, Serialize)]
struct LessonList {
    status: Status,
    data: Vec<Lesson>,
}

/// Every lesson on one weekday
async fn daily_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DayRequest>,
) -> AppResult<Json<LessonList>> {
    let day = check_day(request.day_idx)?;
    let conn = state.db.lock().await;
    let data = db::lessons_for_day(&conn, day)?;

    Ok(Json(LessonList {
        status: Status::Success,
        data,
    }))
}

#[derive(Debug, Deserialize)]
struct PersonParams {
    person: String,
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct DayParams {
    day: u8,
}

async fn person_lessons(state: &AppState, params: &PersonParams) -> AppResult<(Role, Vec<Lesson>)> {
    if params.person.trim().is_empty() {
        return Err(AppError::BadRequest("person is required".to_string()));
    }

    let role = params
        .role
        .unwrap_or_else(|| state.roster.role_of(&params.person));
    let conn = state.db.lock().await;
    let lessons = db::lessons_for_person(&conn, &params.person, role)?;
    Ok((role, lessons))
}

/// Laid-out weekly grid as JSON
async fn week_layout_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PersonParams>,
) -> AppResult<Json<serde_json::Value>> {
    let (role, lessons) = person_lessons(&state, &params).await?;
    let view = weekly_view(&params.person, role, &lessons, ViewConfig::WEEKLY);
    let grid = view.grid();

    Ok(Json(serde_json::json!({
        "kind": view.kind,
        "labels": view.labels,
        "grid": grid,
    })))
}

/// Laid-out rooms grid as JSON
async fn rooms_layout_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DayParams>,
) -> AppResult<Json<serde_json::Value>> {
    let day = check_day(params.day)?;
    let lessons = {
        let conn = state.db.lock().await;
        db::lessons_for_day(&conn, day)?
    };
    let view = rooms_view(day, &lessons, &state.roster.rooms, ViewConfig::ROOMS);
    let grid = view.grid();

    Ok(Json(serde_json::json!({
        "kind": view.kind,
        "labels": view.labels,
        "grid": grid,
    })))
}

/// Book a lesson unless someone or the room is already taken
async fn create_lesson_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewLesson>,
) -> AppResult<Json<StatusMessage>> {
    let lesson = request.into_lesson()?;
    let conn = state.db.lock().await;

    if let Some(conflict) = db::find_conflict(&conn, &lesson)? {
        info!(conflict = %conflict, "Booking refused");
        return Ok(Json(StatusMessage::new(Status::Conflict, conflict.to_string())));
    }

    let id = db::insert_lesson(&conn, &lesson)?;
    info!(
        id,
        teacher = %lesson.teacher,
        student = %lesson.student,
        day = lesson.day,
        start = %lesson.start,
        minutes = lesson.duration_minutes(),
        "Lesson booked"
    );

    Ok(Json(StatusMessage::new(Status::Success, "Lesson added")))
}

async fn delete_lesson_handler(
    State(state): State<Arc<AppState>>,
    extract::Path(id): extract::Path<i64>,
) -> AppResult<Json<StatusMessage>> {
    let conn = state.db.lock().await;
    let Some(lesson) = db::get_lesson(&conn, id)? else {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    };
    db::delete_lesson(&conn, id)?;

    info!(id, teacher = %lesson.teacher, student = %lesson.student, "Lesson deleted");
    Ok(Json(StatusMessage::new(Status::Success, "Lesson deleted")))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: String,
    files: Vec<String>,
}

/// Import uploaded CSV exports. Every file is parsed before anything is
/// stored; a file that fails to parse is skipped.
async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut files = Vec::new();
    let mut lessons = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }

        let name = field
            .file_name()
            .and_then(|n| Path::new(n).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        let bytes = field.bytes().await?;

        match parser::parse_csv(&String::from_utf8_lossy(&bytes), &name) {
            Ok(found) => {
                debug!(file = %name, count = found.len(), "Parsed upload");
                lessons.extend(found);
            }
            Err(e) => warn!(file = %name, error = %e, "Failed to parse upload"),
        }
        files.push(name);
    }

    let inserted = {
        let conn = state.db.lock().await;
        db::import_lessons(&conn, &lessons)?
    };
    info!(files = files.len(), inserted, "Upload imported");

    Ok(Json(UploadResponse {
        message: format!("Processed {} files, {} new lessons", files.len(), inserted),
        files,
    }))
}

async fn export_week_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PersonParams>,
) -> AppResult<Response> {
    let (role, lessons) = person_lessons(&state, &params).await?;
    let view = weekly_view(&params.person, role, &lessons, ViewConfig::WEEKLY);
    let svg = html::render_svg(&view);

    Ok(svg_download(&format!("Schedule-{}.svg", params.person), svg))
}

async fn export_rooms_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DayParams>,
) -> AppResult<Response> {
    let day = check_day(params.day)?;
    let lessons = {
        let conn = state.db.lock().await;
        db::lessons_for_day(&conn, day)?
    };
    let view = rooms_view(day, &lessons, &state.roster.rooms, ViewConfig::ROOMS);
    let svg = html::render_svg(&view);

    Ok(svg_download(&format!("Rooms-{}.svg", view.title()), svg))
}

fn svg_download(file_name: &str, svg: String) -> Response {
    // Header values must be visible ASCII
    let safe_name: String = file_name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();

    (
        [
            (header::CONTENT_TYPE, "image/svg+xml".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", safe_name),
            ),
        ],
        svg,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn setup_test_state() -> (TempDir, Arc<AppState>) {
        let temp_dir = TempDir::new().unwrap();
        let conn = db::init_db(&temp_dir.path().join("test.db")).unwrap();
        (temp_dir, Arc::new(AppState::new(conn, Roster::default())))
    }

    async fn add_lesson(state: &AppState, lesson: Lesson) -> i64 {
        let conn = state.db.lock().await;
        db::insert_lesson(&conn, &lesson).unwrap()
    }

    fn lesson(teacher: &str, student: &str, day: u8, start: &str, end: &str) -> Lesson {
        Lesson::new(
            teacher.to_string(),
            student.to_string(),
            "Math".to_string(),
            day,
            start.parse().unwrap(),
            end.parse().unwrap(),
        )
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send_json(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = send(state, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    // ========== page tests ==========

    #[tokio::test]
    async fn test_index_blank() {
        let (_dir, state) = setup_test_state();
        let (status, body) = send(&state, get("/")).await;

        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Left panel"));
        assert!(html.contains("Search for a teacher or student."));
    }

    #[tokio::test]
    async fn test_index_with_panels() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Adina", "Turan", 0, "09:00", "10:00")).await;

        let (status, body) = send(&state, get("/?view=week&left=Adina&right=blah")).await;
        assert_eq!(status, StatusCode::OK);

        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Schedule: Adina"));
        assert!(html.contains(r#"class="cell-busy""#));
        assert!(html.contains("Could not understand the request."));
    }

    #[tokio::test]
    async fn test_index_rooms_view() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Damir", "Zere", 3, "11:00", "12:00").with_room("19 у окна")).await;

        let (status, body) = send(&state, get("/?view=rooms&day=3")).await;
        assert_eq!(status, StatusCode::OK);

        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Thursday"));
        assert!(html.contains("Zere"));
    }

    // ========== search tests ==========

    #[tokio::test]
    async fn test_search_success() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Adina", "Turan", 0, "09:00", "10:00")).await;
        add_lesson(&state, lesson("Damir", "Turan", 1, "09:00", "10:00")).await;
        add_lesson(&state, lesson("Damir", "Zere", 1, "11:00", "12:00")).await;

        let (status, json) =
            send_json(&state, "POST", "/api/search", serde_json::json!({"text": "Turan"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["type"], "weekly_table");
        assert_eq!(json["person"], "Turan");
        assert_eq!(json["message"], "Schedule: Turan");
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["data"][0]["day_idx"], 0);
        assert_eq!(json["data"][0]["start"], "09:00");
    }

    #[tokio::test]
    async fn test_search_keeps_first_lesson_per_slot() {
        let (_dir, state) = setup_test_state();
        let first = add_lesson(&state, lesson("Adina", "Turan", 2, "09:00", "10:00")).await;
        add_lesson(&state, lesson("Damir", "Turan", 2, "09:00", "10:30")).await;
        add_lesson(&state, lesson("Damir", "Turan", 2, "10:00", "11:00")).await;

        let (_, json) =
            send_json(&state, "POST", "/api/search", serde_json::json!({"text": "Turan"})).await;

        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], first);
        assert_eq!(data[1]["start"], "10:00");
    }

    #[tokio::test]
    async fn test_search_not_understood() {
        let (_dir, state) = setup_test_state();
        let (status, json) =
            send_json(&state, "POST", "/api/search", serde_json::json!({"text": "hello"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Could not understand the request.");
    }

    // ========== daily tests ==========

    #[tokio::test]
    async fn test_daily() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Adina", "Turan", 2, "09:00", "10:00")).await;
        add_lesson(&state, lesson("Damir", "Zere", 3, "09:00", "10:00")).await;

        let (status, json) =
            send_json(&state, "POST", "/api/daily", serde_json::json!({"day_idx": 2})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["teacher"], "Adina");
    }

    #[tokio::test]
    async fn test_daily_unknown_day() {
        let (_dir, state) = setup_test_state();
        let (status, json) =
            send_json(&state, "POST", "/api/daily", serde_json::json!({"day_idx": 9})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
    }

    // ========== booking tests ==========

    fn booking(teacher: &str, student: &str, room: &str, start: &str) -> serde_json::Value {
        serde_json::json!({
            "teacher": teacher,
            "student": student,
            "subject": "Math",
            "room": room,
            "day_idx": 1,
            "start_time": start,
            "duration": 60,
        })
    }

    #[tokio::test]
    async fn test_create_lesson_then_conflicts() {
        let (_dir, state) = setup_test_state();

        let (status, json) = send_json(
            &state,
            "POST",
            "/api/lessons",
            booking("Adina", "Turan", "6 у окна", "10:00"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");

        let (_, json) = send_json(
            &state,
            "POST",
            "/api/lessons",
            booking("Adina", "Zere", "8 у окна", "10:30"),
        )
        .await;
        assert_eq!(json["status"], "conflict");
        assert_eq!(json["message"], "Adina is busy at that time");

        let (_, json) = send_json(
            &state,
            "POST",
            "/api/lessons",
            booking("Damir", "Zere", "6 у окна", "10:30"),
        )
        .await;
        assert_eq!(json["status"], "conflict");
        assert_eq!(json["message"], "Room 6 у окна is taken at that time (Adina)");

        // Back-to-back is fine
        let (_, json) = send_json(
            &state,
            "POST",
            "/api/lessons",
            booking("Damir", "Turan", "6 у окна", "11:00"),
        )
        .await;
        assert_eq!(json["status"], "success");

        let conn = state.db.lock().await;
        assert_eq!(db::count_lessons(&conn).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_lesson_invalid() {
        let (_dir, state) = setup_test_state();
        let body = booking("Adina", "Turan", "", "23:30");

        let (status, json) = send_json(&state, "POST", "/api/lessons", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "lesson would end after midnight");
    }

    #[tokio::test]
    async fn test_delete_lesson() {
        let (_dir, state) = setup_test_state();
        let id = add_lesson(&state, lesson("Adina", "Turan", 0, "09:00", "10:00")).await;
        let uri = format!("/api/lessons/{}", id);

        let (status, json) = send_json(&state, "DELETE", &uri, serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");

        let (status, json) = send_json(&state, "DELETE", &uri, serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Lesson not found");
    }

    // ========== upload tests ==========

    #[tokio::test]
    async fn test_upload_csv() {
        let (_dir, state) = setup_test_state();
        let export = "Time:,Monday,Tuesday\n,\"Adina\nMath\n9.00 - 10.00\",\"Damir\nPhysics\n11.00 - 12.00\"\n";
        let boundary = "orarioboundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"Schedule - Turan.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {export}\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, bytes) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["files"][0], "Schedule - Turan.csv");
        assert_eq!(json["message"], "Processed 1 files, 2 new lessons");

        let conn = state.db.lock().await;
        let turan = db::lessons_for_person(&conn, "Turan", Role::Student).unwrap();
        assert_eq!(turan.len(), 2);
    }

    // ========== file watcher tests ==========

    const EXPORT: &str =
        "Time:,Monday,Tuesday\n,\"Adina\nMath\n9.00 - 10.00\",\"Damir\nPhysics\n11.00 - 12.30\"\n";

    async fn lesson_count(state: &AppState) -> usize {
        let conn = state.db.lock().await;
        db::count_lessons(&conn).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_imports_existing_files_on_start() {
        let (temp_dir, state) = setup_test_state();
        let dir = temp_dir.path().join("uploads");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("Schedule - Turan.csv"), EXPORT).unwrap();
        std::fs::write(dir.join("notes.txt"), "not an export").unwrap();

        let _watcher = start_file_watcher(state.clone(), &dir).await.unwrap();

        assert_eq!(lesson_count(&state).await, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_creates_missing_dir() {
        let (temp_dir, state) = setup_test_state();
        let dir = temp_dir.path().join("new-uploads");

        let _watcher = start_file_watcher(state.clone(), &dir).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(lesson_count(&state).await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_imports_new_files() {
        let (temp_dir, state) = setup_test_state();
        let dir = temp_dir.path().join("uploads");

        let _watcher = start_file_watcher(state.clone(), &dir).await.unwrap();
        assert_eq!(lesson_count(&state).await, 0);

        std::fs::write(dir.join("notes.txt"), "not an export").unwrap();
        std::fs::write(dir.join("X - Zere.csv"), EXPORT).unwrap();

        // Debounce is two seconds; give the watcher a generous margin
        let mut count = 0;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(250)).await;
            count = lesson_count(&state).await;
            if count > 0 {
                break;
            }
        }
        assert_eq!(count, 2);

        let conn = state.db.lock().await;
        let zere = db::lessons_for_person(&conn, "Zere", Role::Student).unwrap();
        assert_eq!(zere.len(), 2);
    }

    // ========== layout and export tests ==========

    #[tokio::test]
    async fn test_week_layout_json() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Adina", "Turan", 0, "09:00", "10:00")).await;
        add_lesson(&state, lesson("Adina", "Zere", 0, "09:00", "10:00")).await;

        let (status, bytes) = send(&state, get("/api/layout/week?person=Adina")).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"]["view"], "week");
        assert_eq!(json["kind"]["role"], "teacher");
        assert_eq!(json["labels"].as_array().unwrap().len(), 6);
        assert_eq!(json["grid"]["columns"][0][2]["kind"], "anchor");
        assert_eq!(json["grid"]["columns"][0][3]["kind"], "suppressed");
        // Second lesson at the same slot loses
        assert_eq!(json["grid"]["dropped"][0]["reason"], "collision");
    }

    #[tokio::test]
    async fn test_rooms_layout_json() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Adina", "Turan", 4, "09:00", "10:00").with_room("6 передний")).await;

        let (status, bytes) = send(&state, get("/api/layout/rooms?day=4")).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"]["view"], "rooms");
        assert_eq!(json["labels"][0], "6 передний");
        assert_eq!(json["grid"]["columns"][0][0]["kind"], "anchor");
    }

    #[tokio::test]
    async fn test_export_week_svg() {
        let (_dir, state) = setup_test_state();
        add_lesson(&state, lesson("Adina", "Turan", 0, "09:00", "10:00")).await;

        let response = router(state.clone())
            .oneshot(get("/export/week.svg?person=Turan"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "image/svg+xml"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Schedule-Turan.svg\""
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let svg = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(svg.contains(">Adina</text>"));
    }

    #[tokio::test]
    async fn test_export_rooms_svg() {
        let (_dir, state) = setup_test_state();
        let response = router(state.clone())
            .oneshot(get("/export/rooms.svg?day=5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Rooms-Saturday.svg\""
        );

        let (status, _) = send(&state, get("/export/rooms.svg?day=7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_week_requires_person() {
        let (_dir, state) = setup_test_state();
        let (status, _) = send(&state, get("/export/week.svg?person=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_svg_download_sanitizes_name() {
        let response = svg_download("Rooms-Среда.svg", String::new());
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Rooms-_____.svg\""
        );
    }
}
