use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod edit;
mod export;
mod grid;
mod inputter;
mod loader;
mod model;
mod schema;
mod table;
mod ui;

use controller::Controller;
use domain::{TVConfig, TVError};
use export::CsvExport;
use model::{Model, Status};
use schema::DEFAULT_READ_ONLY_COLUMNS;
use ui::TableUI;

/// View, sort, filter and edit the rows of a CSV, Parquet or Arrow file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// File to open
    path: String,

    /// Column that may not be edited (repeatable, replaces the defaults)
    #[arg(long = "read-only", value_name = "COLUMN")]
    read_only: Vec<String>,

    /// Where the export action writes its CSV
    #[arg(long, value_name = "PATH")]
    export: Option<String>,

    /// Maximum width of a grid column
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Log file, the terminal belongs to the UI
    #[arg(long, default_value = "tve.log")]
    log: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            ratatui::restore();
            error!("Exiting with error: {:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn expand_path(path: &str) -> Result<PathBuf, TVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| TVError::InvalidArgument(format!("{path}: {e}")))
}

fn init_logging(path: &Path) -> Result<(), TVError> {
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn default_export_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table");
    source.with_file_name(format!("{stem}.export.csv"))
}

fn build_config(args: &Args) -> Result<TVConfig, TVError> {
    let source = expand_path(&args.path)?;
    let export_path = match &args.export {
        Some(p) => expand_path(p)?,
        None => default_export_path(&source),
    };
    let read_only_columns = if args.read_only.is_empty() {
        DEFAULT_READ_ONLY_COLUMNS.map(String::from).to_vec()
    } else {
        args.read_only.clone()
    };
    if args.max_column_width < 3 {
        return Err(TVError::InvalidArgument(
            "--max-column-width must be at least 3".into(),
        ));
    }

    Ok(TVConfig::default()
        .with_event_poll_time(args.poll_ms)
        .with_max_column_width(args.max_column_width)
        .with_read_only_columns(read_only_columns)
        .with_export_path(export_path)
        .with_source(source))
}

fn run(args: Args) -> Result<(), TVError> {
    init_logging(&expand_path(&args.log)?)?;
    let config = build_config(&args)?;
    info!("Starting tv with {:?}", config);

    let source = config.source.clone().unwrap_or_default();
    let data = loader::load_data_file(&source, &config.read_only_policy())?;
    let exporter = Box::new(CsvExport::new(config.export_path.clone()));

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(
        &config,
        data,
        exporter,
        size.width as usize,
        size.height as usize,
    );
    let mut ui = TableUI::new(&config);
    let controller = Controller::new(&config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message);
    }

    info!("Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tve").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = build_config(&parse(&["/data/placements.csv"])).unwrap();
        assert_eq!(config.source, Some(PathBuf::from("/data/placements.csv")));
        assert_eq!(
            config.export_path,
            PathBuf::from("/data/placements.export.csv")
        );
        assert_eq!(config.max_column_width, 40);
        assert!(config.read_only_policy().is_read_only("Buy Model"));
    }

    #[test]
    fn test_read_only_override() {
        let args = parse(&[
            "data.csv",
            "--read-only",
            "Notes",
            "--read-only",
            "Owner",
            "--export",
            "/tmp/out.csv",
        ]);
        let config = build_config(&args).unwrap();
        let policy = config.read_only_policy();
        assert!(policy.is_read_only("Notes"));
        assert!(policy.is_read_only("Owner"));
        assert!(!policy.is_read_only("Buy Model"));
        assert_eq!(config.export_path, PathBuf::from("/tmp/out.csv"));
    }

    #[test]
    fn test_too_narrow_columns_rejected() {
        let args = parse(&["data.csv", "--max-column-width", "1"]);
        assert!(matches!(
            build_config(&args),
            Err(TVError::InvalidArgument(_))
        ));
    }
}
