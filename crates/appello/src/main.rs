use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use appello::api::HttpApi;
use appello::calendar;
use appello::config::Session;
use appello::controller::AttendanceController;
use appello::html;
use appello::reconcile::SaveOutcome;
use appello::render::{self, SheetView};
use appello::types::{AttendanceStatus, StudentId};

#[derive(Parser)]
#[command(name = "appello")]
#[command(about = "Teacher attendance sheets for the school portal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// Class id (default: the teacher's first class)
    #[arg(long)]
    class: Option<i64>,

    /// Subject id (default: the class's own subject)
    #[arg(long)]
    subject: Option<i64>,

    /// Day of the sheet (YYYY-MM-DD format)
    /// Default: today
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the teacher's classes and subjects
    Classes,

    /// Show the attendance sheet
    Show {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Only list students whose name contains this text
        #[arg(long, default_value = "")]
        search: String,
    },

    /// Set statuses and save them
    Mark {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Student ids to mark present (comma separated)
        #[arg(long, value_delimiter = ',')]
        present: Vec<StudentId>,

        /// Student ids to mark absent
        #[arg(long, value_delimiter = ',')]
        absent: Vec<StudentId>,

        /// Student ids to mark late
        #[arg(long, value_delimiter = ',')]
        late: Vec<StudentId>,

        /// Student ids to reset to no status
        #[arg(long, value_delimiter = ',')]
        none: Vec<StudentId>,
    },

    /// Print a month grid
    Calendar {
        /// Reference day (YYYY-MM-DD format)
        /// Default: today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Months to move from the reference day (negative goes back)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        months: i32,
    },

    /// Write the sheet as an HTML page
    Render {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Render the editable form instead of the read-only sheet
        #[arg(long)]
        edit: bool,

        /// Output file
        #[arg(long, short, default_value = "attendance.html")]
        output: PathBuf,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level))
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_max_level(Level::TRACE)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Classes => classes_command().await?,
        Commands::Show { sheet, search } => show_command(sheet, &search).await?,
        Commands::Mark {
            sheet,
            present,
            absent,
            late,
            none,
        } => {
            let changes = present
                .into_iter()
                .map(|id| (id, AttendanceStatus::Present))
                .chain(absent.into_iter().map(|id| (id, AttendanceStatus::Absent)))
                .chain(late.into_iter().map(|id| (id, AttendanceStatus::Late)))
                .chain(none.into_iter().map(|id| (id, AttendanceStatus::None)))
                .collect();
            mark_command(sheet, changes).await?;
        }
        Commands::Calendar { date, months } => calendar_command(date, months),
        Commands::Render {
            sheet,
            edit,
            output,
        } => render_command(sheet, edit, output).await?,
    }

    Ok(())
}

fn client() -> Result<HttpApi> {
    let session = Session::from_env().context("Failed to load session")?;
    info!(api_url = %session.api_url, teacher_id = session.teacher_id, "Using portal session");
    HttpApi::new(&session).context("Failed to build API client")
}

/// Mount the sheet and apply the requested selection.
async fn open_sheet(args: SheetArgs) -> Result<AttendanceController<HttpApi>> {
    let date = args.date.unwrap_or_else(calendar::today);
    let mut controller = AttendanceController::new(client()?, date);
    controller.mount().await.context("Failed to load attendance")?;

    if let Some(class_id) = args.class {
        controller.select_class(class_id).await?;
    }
    if let Some(subject_id) = args.subject {
        controller.select_subject(subject_id, |_| true).await?;
    }

    Ok(controller)
}

async fn classes_command() -> Result<()> {
    let mut controller = AttendanceController::new(client()?, calendar::today());
    controller.mount().await.context("Failed to load classes")?;

    println!("Classes:");
    for class in controller.classes() {
        println!("{:>5}  {}", class.id, class.label());
    }
    println!("\nSubjects:");
    for subject in controller.subjects() {
        println!("{:>5}  {}", subject.id, subject.name);
    }

    Ok(())
}

async fn show_command(args: SheetArgs, search: &str) -> Result<()> {
    let controller = open_sheet(args).await?;
    let view = SheetView::capture(&controller, search);

    print!("{}", render::sheet_text(&view));
    Ok(())
}

async fn mark_command(args: SheetArgs, changes: Vec<(StudentId, AttendanceStatus)>) -> Result<()> {
    let mut controller = open_sheet(args).await?;
    controller.begin_edit()?;

    for (student_id, status) in changes {
        controller.set_status(student_id, status)?;
    }

    match controller.save().await? {
        SaveOutcome::NothingToSave => info!("Nothing to save"),
        SaveOutcome::Completed(report) if report.is_success() => {
            info!(saved = report.applied.len(), "Attendance saved")
        }
        SaveOutcome::Completed(report) => {
            warn!(
                saved = report.applied.len(),
                failed = report.failed.len(),
                "Some records were not saved"
            )
        }
    }

    let view = SheetView::capture(&controller, "");
    print!("{}", render::sheet_text(&view));
    Ok(())
}

fn calendar_command(date: Option<NaiveDate>, months: i32) {
    let selected = date.unwrap_or_else(calendar::today);
    let mut reference = selected;
    for _ in 0..months.unsigned_abs() {
        reference = if months < 0 {
            calendar::previous_month(reference)
        } else {
            calendar::next_month(reference)
        };
    }

    let grid = calendar::MonthGrid::new(reference);
    print!("{}", render::grid_text(&grid, selected));
}

async fn render_command(args: SheetArgs, edit: bool, output: PathBuf) -> Result<()> {
    let mut controller = open_sheet(args).await?;
    if edit {
        controller.begin_edit()?;
    }

    let view = SheetView::capture(&controller, "");
    html::generate_html(&view, &output)?;
    info!(path = %output.display(), "HTML saved");
    Ok(())
}
