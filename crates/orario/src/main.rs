use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use orario::config::{Roster, ViewConfig};
use orario::types::day_name;
use orario::{db, html, import, server, views};

#[derive(Parser, Debug)]
#[command(name = "orario")]
#[command(about = "Import lesson exports, book lessons and view weekly and per-room timetables")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// SQLite database file
    #[arg(long, env = "ORARIO_DB", default_value = "lessons.db", global = true)]
    db: PathBuf,

    /// Directory watched for CSV exports
    #[arg(long, env = "ORARIO_IMPORT_DIR", default_value = "uploads", global = true)]
    import_dir: PathBuf,

    /// JSON file with teachers, students and rooms (built-in list if omitted)
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    /// Port the web server listens on
    #[arg(short, long, env = "ORARIO_PORT", default_value = "8000", global = true)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Import new CSV files dropped into the import directory
        #[arg(long)]
        watch: bool,
    },

    /// Import CSV exports (files or directories)
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write a timetable as SVG
    Export {
        /// Weekly timetable of this teacher or student
        #[arg(long, conflicts_with = "day", required_unless_present = "day")]
        person: Option<String>,

        /// Rooms timetable of this weekday (0 = Monday)
        #[arg(long)]
        day: Option<u8>,

        /// Output file (defaults to Schedule-<person>.svg or Rooms-<day>.svg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("Invalid log level: {}", log_level))?
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower_http=warn".parse()?);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();

    Ok(())
}

fn load_roster(path: Option<&Path>) -> Result<Roster> {
    match path {
        Some(path) => Roster::load(path),
        None => Ok(Roster::default()),
    }
}

fn export_svg(
    conn: &rusqlite::Connection,
    roster: &Roster,
    person: Option<String>,
    day: Option<u8>,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let (svg, default_name) = match (person, day) {
        (Some(person), _) => {
            let role = roster.role_of(&person);
            let lessons = db::lessons_for_person(conn, &person, role)?;
            let view = views::weekly_view(&person, role, &lessons, ViewConfig::WEEKLY);
            (html::render_svg(&view), format!("Schedule-{}.svg", person))
        }
        (None, Some(day)) => {
            let Some(name) = day_name(day) else {
                bail!("Unknown day index {}", day);
            };
            let lessons = db::lessons_for_day(conn, day)?;
            let view = views::rooms_view(day, &lessons, &roster.rooms, ViewConfig::ROOMS);
            (html::render_svg(&view), format!("Rooms-{}.svg", name))
        }
        (None, None) => bail!("Either --person or --day is required"),
    };

    let path = output.unwrap_or_else(|| PathBuf::from(default_name));
    std::fs::write(&path, svg).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_tracing(&args.log_level)?;

    let roster = load_roster(args.roster.as_deref())?;
    let conn = db::init_db(&args.db)?;

    match args.command {
        // Default to serve if no command specified
        None => {
            let state = Arc::new(server::AppState::new(conn, roster));
            server::serve(args.port, state, None).await?;
        }
        Some(Commands::Serve { watch }) => {
            let state = Arc::new(server::AppState::new(conn, roster));
            let watch_dir = watch.then(|| args.import_dir.clone());
            server::serve(args.port, state, watch_dir).await?;
        }
        Some(Commands::Import { paths }) => {
            let summary = import::import_paths(&conn, &paths)?;
            info!(
                files = summary.files,
                inserted = summary.inserted,
                total = db::count_lessons(&conn)?,
                "Import complete"
            );
        }
        Some(Commands::Export {
            person,
            day,
            output,
        }) => {
            let path = export_svg(&conn, &roster, person, day, output)?;
            info!(path = %path.display(), "SVG saved");
        }
    }

    Ok(())
}
