use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use crate::schema::{DEFAULT_READ_ONLY_COLUMNS, ReadOnlyPolicy};

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    InvalidArgument(String),
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "io error: {e}"),
            TVError::PolarsError(e) => write!(f, "could not read data: {e}"),
            TVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            TVError::FileNotFound => write!(f, "file not found"),
            TVError::PermissionDenied => write!(f, "permission denied"),
            TVError::UnknownFileType => write!(f, "unknown file type"),
            TVError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for TVError {}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<PolarsError> for TVError {
    fn from(err: PolarsError) -> Self {
        TVError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub read_only_columns: Vec<String>,
    pub export_path: PathBuf,
    #[setters(strip_option)]
    pub source: Option<PathBuf>,
}

impl Default for TVConfig {
    fn default() -> Self {
        TVConfig {
            event_poll_time: 100,
            max_column_width: 40,
            read_only_columns: DEFAULT_READ_ONLY_COLUMNS.map(String::from).to_vec(),
            export_path: PathBuf::from("export.csv"),
            source: None,
        }
    }
}

impl TVConfig {
    pub fn read_only_policy(&self) -> ReadOnlyPolicy {
        ReadOnlyPolicy::new(self.read_only_columns.iter().cloned())
    }
}

/// What the command line input is currently collecting.
#[derive(Debug, Clone, PartialEq)]
pub enum CMDMode {
    EditField(String),
    FilterColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveToFirstColumn,
    MoveToLastColumn,
    Enter,
    Exit,
    Commit,
    SortCycle,
    SortCycleAdd,
    HideColumn,
    ShowAllColumns,
    Filter,
    ClearFilters,
    ResetView,
    Reload,
    Export,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Table
  arrows / hjkl    move            PgUp / PgDn   page
  g / G            first / last    0 / $         first / last column
  Enter            edit row        s / S         sort (cycle / add key)
  c / C            hide column / show all
  /                filter column   F             clear filters
  R                reset view      r             reload file
  e                export          y / Y         copy cell / row
  q                quit

Edit form
  up / down        select field    Enter         edit field
  w / Ctrl-s       save            Esc           close without saving

Esc closes this help.";
