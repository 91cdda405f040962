use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::edit::UpdateSink;
use crate::schema::{ReadOnlyPolicy, Schema};

/// Position of a row inside its `DataSet`.
pub type RowId = usize;

/// A single record: column name to cell value.
///
/// Fields keep their insertion order so the schema can follow the first row's
/// key order, but equality ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: IndexMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Row {
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Adds a field, or replaces the value of an existing one in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Replaces the value of an existing field. Unknown keys are left alone.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        match self.fields.get_mut(key) {
            Some(v) => {
                *v = value.into();
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// The loaded row collection together with the schema derived from it.
#[derive(Debug)]
pub struct DataSet {
    name: String,
    rows: Vec<Row>,
    schema: Arc<Schema>,
    generation: u64,
}

impl DataSet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>, policy: &ReadOnlyPolicy) -> Self {
        let schema = Arc::new(Schema::derive(&rows, policy));
        let name = name.into();
        debug!(
            "Data set \"{}\": {} rows, {} columns",
            name,
            rows.len(),
            schema.len()
        );
        DataSet {
            name,
            rows,
            schema,
            generation: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Bumped every time the row collection is swapped out.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Swaps in a new row collection and derives its schema.
    ///
    /// Returns `true` if the schema changed. An unchanged schema keeps the
    /// previous `Arc` so holders of it stay valid.
    pub fn replace_rows(&mut self, rows: Vec<Row>, policy: &ReadOnlyPolicy) -> bool {
        let schema = Schema::derive(&rows, policy);
        self.rows = rows;
        self.generation += 1;
        if *self.schema == schema {
            trace!("Replaced rows of \"{}\", schema unchanged", self.name);
            false
        } else {
            info!(
                "Replaced rows of \"{}\", new schema with {} columns",
                self.name,
                schema.len()
            );
            self.schema = Arc::new(schema);
            true
        }
    }
}

impl UpdateSink for DataSet {
    fn apply(&mut self, id: RowId, updated: Row, original: Row) {
        match self.rows.get_mut(id) {
            Some(current) if *current == original => {
                info!("Updated row {} of \"{}\"", id, self.name);
                *current = updated;
            }
            Some(_) => warn!("Row {} changed since it was opened, update dropped", id),
            None => warn!("Row {} no longer exists, update dropped", id),
        }
    }
}
