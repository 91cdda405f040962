use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

use crate::schema::{Column, Schema};
use crate::table::{DataSet, Row, RowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

/// One displayed row: its id and the raw values of the visible columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub id: RowId,
    pub cells: Vec<String>,
}

/// Sort, visibility and filter state of the grid.
///
/// The state only refers to columns by name, so it survives a reload of the
/// data set. Operations on names the schema does not know are ignored.
#[derive(Debug, Clone, Default)]
pub struct GridState {
    sort: Vec<SortKey>,
    visibility: HashMap<String, bool>,
    filters: Vec<(String, String)>,
}

impl GridState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn sort_direction(&self, column: &str) -> Option<SortDirection> {
        self.sort
            .iter()
            .find(|k| k.column == column)
            .map(|k| k.direction)
    }

    /// Sets the direction of `column` in the sort sequence, keeping its
    /// position if already present. `None` removes it.
    pub fn set_sort(&mut self, schema: &Schema, column: &str, direction: Option<SortDirection>) {
        if !schema.contains(column) {
            trace!("Ignoring sort on unknown column \"{}\"", column);
            return;
        }
        let existing = self.sort.iter().position(|k| k.column == column);
        match (existing, direction) {
            (Some(idx), Some(direction)) => self.sort[idx].direction = direction,
            (None, Some(direction)) => self.sort.push(SortKey {
                column: column.to_string(),
                direction,
            }),
            (Some(idx), None) => {
                self.sort.remove(idx);
            }
            (None, None) => {}
        }
        trace!("Sort is now {:?}", self.sort);
    }

    /// Ascending, then descending, then unsorted. An exclusive cycle drops
    /// every other sort key.
    pub fn cycle_sort(&mut self, schema: &Schema, column: &str, exclusive: bool) {
        if !schema.contains(column) {
            trace!("Ignoring sort on unknown column \"{}\"", column);
            return;
        }
        let next = match self.sort_direction(column) {
            None => Some(SortDirection::Ascending),
            Some(SortDirection::Ascending) => Some(SortDirection::Descending),
            Some(SortDirection::Descending) => None,
        };
        if exclusive {
            self.sort.retain(|k| k.column == column);
        }
        self.set_sort(schema, column, next);
    }

    pub fn clear_sort(&mut self) {
        self.sort.clear();
    }

    pub fn is_visible(&self, column: &str) -> bool {
        self.visibility.get(column).copied().unwrap_or(true)
    }

    pub fn toggle_visibility(&mut self, schema: &Schema, column: &str, visible: bool) {
        if !schema.contains(column) {
            trace!("Ignoring visibility of unknown column \"{}\"", column);
            return;
        }
        self.visibility.insert(column.to_string(), visible);
    }

    pub fn show_all(&mut self) {
        self.visibility.clear();
    }

    pub fn visible_columns<'a>(&self, schema: &'a Schema) -> Vec<&'a Column> {
        schema
            .columns()
            .iter()
            .filter(|c| self.is_visible(c.name()))
            .collect()
    }

    pub fn filter(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, t)| t.as_str())
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Keeps only rows whose `column` value contains `term`. An empty term
    /// removes the filter.
    pub fn set_filter(&mut self, schema: &Schema, column: &str, term: &str) {
        if !schema.contains(column) {
            trace!("Ignoring filter on unknown column \"{}\"", column);
            return;
        }
        self.filters.retain(|(c, _)| c != column);
        if !term.is_empty() {
            self.filters.push((column.to_string(), term.to_string()));
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn reset(&mut self) {
        self.clear_sort();
        self.show_all();
        self.clear_filters();
    }

    fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, term)| row.get(column).unwrap_or("").contains(term.as_str()))
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for key in self.sort.iter() {
            let av = a.get(&key.column).unwrap_or("");
            let bv = b.get(&key.column).unwrap_or("");
            let ord = match key.direction {
                SortDirection::Ascending => av.cmp(bv),
                SortDirection::Descending => bv.cmp(av),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Row ids after filtering and sorting, in display order.
    pub fn ordered_ids(&self, data: &DataSet) -> Vec<RowId> {
        let rows = data.rows();
        let mut ids: Vec<RowId> = (0..rows.len()).filter(|&i| self.matches(&rows[i])).collect();
        // `sort_by` is stable, equal keys keep input order.
        if !self.sort.is_empty() {
            ids.sort_by(|&a, &b| self.compare(&rows[a], &rows[b]));
        }
        ids
    }

    /// Filtered, sorted rows reduced to their visible cells in schema order.
    pub fn visible_ordered_rows(&self, data: &DataSet) -> Vec<GridRow> {
        let columns = self.visible_columns(data.schema());
        self.ordered_ids(data)
            .into_iter()
            .map(|id| {
                let row = &data.rows()[id];
                GridRow {
                    id,
                    cells: columns
                        .iter()
                        .map(|c| row.get(c.name()).unwrap_or("").to_string())
                        .collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReadOnlyPolicy;

    fn make_data(rows: &[&[(&str, &str)]]) -> DataSet {
        let rows: Vec<Row> = rows
            .iter()
            .map(|r| r.iter().map(|&(k, v)| (k, v)).collect())
            .collect();
        DataSet::new("test", rows, &ReadOnlyPolicy::default())
    }

    fn qty_data() -> DataSet {
        make_data(&[&[("name", "x"), ("qty", "5")], &[("name", "y"), ("qty", "3")]])
    }

    fn ids(grid: &GridState, data: &DataSet) -> Vec<RowId> {
        grid.visible_ordered_rows(data).iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_natural_order_without_sort() {
        let data = qty_data();
        let grid = GridState::new();
        let rows = grid.visible_ordered_rows(&data);
        assert_eq!(rows[0].cells, vec!["x", "5"]);
        assert_eq!(rows[1].cells, vec!["y", "3"]);
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let data = qty_data();
        let mut grid = GridState::new();

        grid.set_sort(data.schema(), "qty", Some(SortDirection::Ascending));
        assert_eq!(ids(&grid, &data), vec![1, 0]);

        grid.set_sort(data.schema(), "qty", Some(SortDirection::Descending));
        assert_eq!(ids(&grid, &data), vec![0, 1]);
        assert_eq!(grid.sort_keys().len(), 1);
    }

    #[test]
    fn test_sort_is_plain_string_ordering() {
        let data = make_data(&[&[("qty", "10")], &[("qty", "9")], &[("qty", "100")]]);
        let mut grid = GridState::new();
        grid.set_sort(data.schema(), "qty", Some(SortDirection::Ascending));
        assert_eq!(ids(&grid, &data), vec![0, 2, 1]);
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let data = make_data(&[
            &[("k", "b"), ("n", "1")],
            &[("k", "a"), ("n", "2")],
            &[("k", "b"), ("n", "3")],
            &[("k", "a"), ("n", "4")],
        ]);
        let mut grid = GridState::new();
        grid.set_sort(data.schema(), "k", Some(SortDirection::Ascending));
        let once = grid.visible_ordered_rows(&data);
        assert_eq!(once.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3, 0, 2]);

        grid.set_sort(data.schema(), "k", Some(SortDirection::Ascending));
        assert_eq!(grid.visible_ordered_rows(&data), once);
    }

    #[test]
    fn test_composite_sort() {
        let data = make_data(&[
            &[("k", "b"), ("n", "1")],
            &[("k", "a"), ("n", "2")],
            &[("k", "b"), ("n", "3")],
            &[("k", "a"), ("n", "4")],
        ]);
        let mut grid = GridState::new();
        grid.set_sort(data.schema(), "k", Some(SortDirection::Ascending));
        grid.set_sort(data.schema(), "n", Some(SortDirection::Descending));
        assert_eq!(ids(&grid, &data), vec![3, 1, 2, 0]);

        // Changing the first key keeps the second one.
        grid.set_sort(data.schema(), "k", Some(SortDirection::Descending));
        assert_eq!(ids(&grid, &data), vec![2, 0, 3, 1]);

        grid.set_sort(data.schema(), "k", None);
        assert_eq!(ids(&grid, &data), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_cycle_sort() {
        let data = qty_data();
        let schema = data.schema();
        let mut grid = GridState::new();

        grid.cycle_sort(schema, "qty", true);
        assert_eq!(grid.sort_direction("qty"), Some(SortDirection::Ascending));
        grid.cycle_sort(schema, "qty", true);
        assert_eq!(grid.sort_direction("qty"), Some(SortDirection::Descending));
        grid.cycle_sort(schema, "qty", true);
        assert_eq!(grid.sort_direction("qty"), None);

        grid.cycle_sort(schema, "qty", false);
        grid.cycle_sort(schema, "name", false);
        assert_eq!(grid.sort_keys().len(), 2);
        grid.cycle_sort(schema, "name", true);
        assert_eq!(grid.sort_keys().len(), 1);
        assert_eq!(grid.sort_direction("name"), Some(SortDirection::Descending));
    }

    #[test]
    fn test_hidden_column_still_sorts() {
        let data = qty_data();
        let mut grid = GridState::new();
        grid.toggle_visibility(data.schema(), "qty", false);

        let rows = grid.visible_ordered_rows(&data);
        assert!(rows.iter().all(|r| r.cells.len() == 1));
        assert_eq!(rows[0].cells, vec!["x"]);

        grid.set_sort(data.schema(), "qty", Some(SortDirection::Ascending));
        let rows = grid.visible_ordered_rows(&data);
        assert_eq!(rows[0].cells, vec!["y"]);
        assert_eq!(rows[1].cells, vec!["x"]);

        grid.toggle_visibility(data.schema(), "qty", true);
        assert_eq!(grid.visible_ordered_rows(&data)[0].cells, vec!["y", "3"]);
    }

    #[test]
    fn test_unknown_column_is_ignored() {
        let data = qty_data();
        let mut grid = GridState::new();
        grid.set_sort(data.schema(), "price", Some(SortDirection::Ascending));
        grid.cycle_sort(data.schema(), "price", true);
        grid.toggle_visibility(data.schema(), "price", false);
        grid.set_filter(data.schema(), "price", "1");
        assert!(grid.sort_keys().is_empty());
        assert!(grid.is_visible("price"));
        assert!(!grid.has_filters());
        assert_eq!(ids(&grid, &data), vec![0, 1]);
    }

    #[test]
    fn test_filters() {
        let data = make_data(&[
            &[("name", "apple"), ("kind", "fruit")],
            &[("name", "carrot"), ("kind", "veg")],
            &[("name", "pineapple"), ("kind", "fruit")],
        ]);
        let mut grid = GridState::new();
        grid.set_filter(data.schema(), "name", "apple");
        assert_eq!(ids(&grid, &data), vec![0, 2]);

        grid.toggle_visibility(data.schema(), "kind", false);
        grid.set_filter(data.schema(), "kind", "veg");
        assert!(ids(&grid, &data).is_empty());

        grid.set_filter(data.schema(), "name", "");
        assert_eq!(ids(&grid, &data), vec![1]);
        assert_eq!(grid.filter("kind"), Some("veg"));

        grid.reset();
        assert_eq!(ids(&grid, &data), vec![0, 1, 2]);
        assert!(grid.is_visible("kind"));
    }

    #[test]
    fn test_empty_data_set() {
        let data = make_data(&[]);
        let mut grid = GridState::new();
        grid.cycle_sort(data.schema(), "qty", true);
        assert!(grid.visible_ordered_rows(&data).is_empty());
        assert!(grid.visible_columns(data.schema()).is_empty());
    }
}
