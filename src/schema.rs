use std::collections::HashSet;
use tracing::trace;

use crate::table::Row;

/// Shown in the grid for an empty cell.
pub const EMPTY_CELL: &str = "—";
/// Shown in the detail line and edit form for an empty cell.
pub const EMPTY_DETAIL: &str = "(empty)";
const TRUNCATION_MARK: char = '…';
const NEWLINE_MARK: &str = " ↵ ";

pub const DEFAULT_READ_ONLY_COLUMNS: [&str; 3] =
    ["Radia/Prisma Package Name", "Placement Name", "Buy Model"];

/// Decides which columns get locked in the edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyPolicy {
    columns: HashSet<String>,
}

impl ReadOnlyPolicy {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReadOnlyPolicy {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_read_only(&self, column: &str) -> bool {
        self.columns.contains(column)
    }
}

impl Default for ReadOnlyPolicy {
    fn default() -> Self {
        ReadOnlyPolicy::new(DEFAULT_READ_ONLY_COLUMNS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    read_only: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, read_only: bool) -> Self {
        Column {
            name: name.into(),
            read_only,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Single line grid rendering, at most `width` characters wide.
    pub fn render_cell(&self, value: &str, width: usize) -> String {
        if value.is_empty() {
            return EMPTY_CELL.chars().take(width).collect();
        }
        let line = value.replace("\r\n", NEWLINE_MARK).replace('\n', NEWLINE_MARK);
        truncate(&line, width)
    }

    /// Full value for the detail line and the edit form.
    pub fn render_detail(&self, value: &str) -> String {
        if value.is_empty() {
            EMPTY_DETAIL.to_string()
        } else {
            value.to_string()
        }
    }
}

/// Cuts `s` down to `width` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(width - 1).collect();
    out.push(TRUNCATION_MARK);
    out
}

/// Ordered column descriptors of one data set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Takes the key order of the first row. No rows, no columns.
    pub fn derive(rows: &[Row], policy: &ReadOnlyPolicy) -> Self {
        let columns: Vec<Column> = rows
            .first()
            .map(|first| {
                first
                    .keys()
                    .map(|name| Column::new(name, policy.is_read_only(name)))
                    .collect()
            })
            .unwrap_or_default();
        trace!("Derived schema with {} columns", columns.len());
        Schema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
