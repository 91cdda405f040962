use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::schema::Schema;
use crate::table::{Row, RowId};

/// Receives committed drafts. Whatever it does with them is its own business:
/// the session neither waits for nor inspects the outcome.
pub trait UpdateSink {
    fn apply(&mut self, id: RowId, updated: Row, original: Row);
}

impl<F: FnMut(RowId, Row, Row)> UpdateSink for F {
    fn apply(&mut self, id: RowId, updated: Row, original: Row) {
        self(id, updated, original)
    }
}

#[derive(Debug, Clone)]
pub struct Draft {
    id: RowId,
    original: Row,
    fields: Row,
    schema: Arc<Schema>,
}

#[derive(Debug, Clone, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing(Draft),
}

/// Holds at most one row open for editing, together with its draft.
#[derive(Debug, Default)]
pub struct EditSession {
    state: EditState,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditState::Editing(_))
    }

    /// Opens `row` for editing. Any draft already open is discarded.
    pub fn open_row(&mut self, id: RowId, row: &Row, schema: Arc<Schema>) {
        if let EditState::Editing(current) = &self.state {
            debug!("Discarding draft of row {} to open row {}", current.id, id);
        }
        trace!("Opening row {} for editing", id);
        self.state = EditState::Editing(Draft {
            id,
            original: row.clone(),
            fields: row.clone(),
            schema,
        });
    }

    /// Replaces one draft value. Read-only and unknown fields are left
    /// untouched and `false` is returned.
    pub fn edit_field(&mut self, key: &str, value: impl Into<String>) -> bool {
        let EditState::Editing(draft) = &mut self.state else {
            trace!("No open row, ignoring edit of \"{}\"", key);
            return false;
        };
        match draft.schema.column(key) {
            Some(column) if column.is_read_only() => {
                trace!("Field \"{}\" is read-only", key);
                false
            }
            Some(_) => draft.fields.set(key, value),
            None => {
                trace!("Unknown field \"{}\"", key);
                false
            }
        }
    }

    /// Hands draft and original to `sink` and closes the session. Does
    /// nothing while idle.
    pub fn commit(&mut self, sink: &mut impl UpdateSink) -> bool {
        match std::mem::take(&mut self.state) {
            EditState::Editing(draft) => {
                info!("Committing row {}", draft.id);
                sink.apply(draft.id, draft.fields, draft.original);
                true
            }
            EditState::Idle => {
                trace!("Nothing to commit");
                false
            }
        }
    }

    /// Drops the draft without telling anyone.
    pub fn cancel(&mut self) {
        if let EditState::Editing(draft) = std::mem::take(&mut self.state) {
            debug!("Closed row {} without saving", draft.id);
        }
    }

    pub fn close(&mut self) {
        self.cancel()
    }

    pub fn selected_id(&self) -> Option<RowId> {
        match &self.state {
            EditState::Editing(d) => Some(d.id),
            EditState::Idle => None,
        }
    }

    pub fn original(&self) -> Option<&Row> {
        match &self.state {
            EditState::Editing(d) => Some(&d.original),
            EditState::Idle => None,
        }
    }

    pub fn draft(&self) -> Option<&Row> {
        match &self.state {
            EditState::Editing(d) => Some(&d.fields),
            EditState::Idle => None,
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match &self.state {
            EditState::Editing(d) => Some(&d.schema),
            EditState::Idle => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        match &self.state {
            EditState::Editing(d) => d.fields != d.original,
            EditState::Idle => false,
        }
    }

    pub fn is_field_dirty(&self, key: &str) -> bool {
        match &self.state {
            EditState::Editing(d) => d.fields.get(key) != d.original.get(key),
            EditState::Idle => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReadOnlyPolicy;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|&(k, v)| (k, v)).collect()
    }

    fn schema_for(r: &Row) -> Arc<Schema> {
        Arc::new(Schema::derive(std::slice::from_ref(r), &ReadOnlyPolicy::default()))
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(RowId, Row, Row)>,
    }

    impl UpdateSink for Recorder {
        fn apply(&mut self, id: RowId, updated: Row, original: Row) {
            self.calls.push((id, updated, original));
        }
    }

    #[test]
    fn test_edit_and_commit() {
        let original = row(&[("Placement Name", "P1"), ("Notes", "old")]);
        let mut session = EditSession::new();
        let mut sink = Recorder::default();

        session.open_row(4, &original, schema_for(&original));
        assert!(session.is_editing());

        assert!(!session.edit_field("Placement Name", "P2"));
        assert_eq!(session.draft().unwrap().get("Placement Name"), Some("P1"));

        assert!(session.edit_field("Notes", "new"));
        assert_eq!(session.draft().unwrap().get("Notes"), Some("new"));
        assert_eq!(session.original().unwrap().get("Notes"), Some("old"));
        assert!(session.is_dirty());
        assert!(session.is_field_dirty("Notes"));
        assert!(!session.is_field_dirty("Placement Name"));

        assert!(session.commit(&mut sink));
        assert!(!session.is_editing());
        assert!(session.draft().is_none());
        assert_eq!(
            sink.calls,
            vec![(
                4,
                row(&[("Placement Name", "P1"), ("Notes", "new")]),
                row(&[("Placement Name", "P1"), ("Notes", "old")]),
            )]
        );
    }

    #[test]
    fn test_read_only_fields_never_change() {
        let original = row(&[
            ("Radia/Prisma Package Name", "pkg"),
            ("Placement Name", "P1"),
            ("Buy Model", "CPM"),
            ("Notes", ""),
        ]);
        let mut session = EditSession::new();
        session.open_row(0, &original, schema_for(&original));

        for value in ["", "x", "P1 ", "CPC"] {
            for key in ["Radia/Prisma Package Name", "Placement Name", "Buy Model"] {
                session.edit_field(key, value);
                session.edit_field("Notes", value);
            }
        }
        let draft = session.draft().unwrap();
        for key in ["Radia/Prisma Package Name", "Placement Name", "Buy Model"] {
            assert_eq!(draft.get(key), original.get(key));
        }
        assert_eq!(draft.get("Notes"), Some("CPC"));
    }

    #[test]
    fn test_unknown_field_is_ignored() {
        let original = row(&[("Notes", "old")]);
        let mut session = EditSession::new();
        session.open_row(0, &original, schema_for(&original));
        assert!(!session.edit_field("Other", "x"));
        assert_eq!(session.draft(), Some(&original));
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_open_replaces_previous_draft() {
        let a = row(&[("Notes", "a")]);
        let b = row(&[("Notes", "b")]);
        let mut session = EditSession::new();

        session.open_row(0, &a, schema_for(&a));
        session.edit_field("Notes", "edited");
        session.open_row(1, &b, schema_for(&b));

        assert_eq!(session.selected_id(), Some(1));
        assert_eq!(session.original(), Some(&b));
        assert_eq!(session.draft(), Some(&b));
    }

    #[test]
    fn test_commit_while_idle_does_nothing() {
        let mut session = EditSession::new();
        let mut calls = 0;
        let mut sink = |_: RowId, _: Row, _: Row| calls += 1;
        assert!(!session.commit(&mut sink));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_cancel_discards_draft() {
        let original = row(&[("Notes", "old")]);
        let mut session = EditSession::new();
        let mut sink = Recorder::default();

        session.open_row(2, &original, schema_for(&original));
        session.edit_field("Notes", "new");
        session.cancel();
        assert!(!session.is_editing());
        assert!(session.draft().is_none());
        assert!(session.selected_id().is_none());

        assert!(!session.commit(&mut sink));
        assert!(sink.calls.is_empty());

        // Closing an idle session is harmless.
        session.close();
        assert!(!session.is_editing());
    }

    #[test]
    fn test_edit_while_idle_does_nothing() {
        let mut session = EditSession::new();
        assert!(!session.edit_field("Notes", "x"));
        assert!(session.draft().is_none());
    }
}
