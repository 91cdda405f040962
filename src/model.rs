use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, TVConfig};
use crate::edit::EditSession;
use crate::export::{ExportTrigger, csv_line};
use crate::grid::{GridRow, GridState, SortDirection};
use crate::inputter::{InputResult, Inputter};
use crate::loader;
use crate::schema::{Column, ReadOnlyPolicy};
use crate::table::DataSet;
use crate::ui::{COLUMN_WIDTH_MARGIN, STATUSLINE_HEIGHT, TABLE_BORDER, TABLE_HEADER_HEIGHT};

const FILTER_MARK: &str = "⊆";

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    EDIT,
    POPUP,
    CMDINPUT,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_width = ui_width.saturating_sub(TABLE_BORDER);
        let table_height = ui_height
            .saturating_sub(STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT + TABLE_BORDER)
            .max(1);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// One line of the edit form.
pub struct FormField<'a> {
    pub column: &'a Column,
    pub value: &'a str,
    pub dirty: bool,
}

pub struct Model {
    config: TVConfig,
    policy: ReadOnlyPolicy,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    data: DataSet,
    grid: GridState,
    view: Vec<GridRow>, // Filtered and sorted rows, visible cells only
    column_widths: Vec<usize>,
    curser_row: usize,    // Index into view
    curser_column: usize, // Index into visible columns
    offset_row: usize,
    offset_column: usize,
    session: EditSession,
    form_row: usize,
    form_offset: usize,
    uilayout: UILayout,
    exporter: Box<dyn ExportTrigger>,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        data: DataSet,
        exporter: Box<dyn ExportTrigger>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            policy: config.read_only_policy(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            data,
            grid: GridState::new(),
            view: Vec::new(),
            column_widths: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            session: EditSession::new(),
            form_row: 0,
            form_offset: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            exporter,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.refresh_view();
        let message = if model.data.is_empty() {
            format!("No rows in {}", model.data.name())
        } else {
            format!(
                "Loaded {} rows, {} columns. Press ? for help.",
                model.data.len(),
                model.data.schema().len()
            )
        };
        model.set_status_message(message);
        model
    }

    // -------------------- Accessors for the UI ---------------------- //

    pub fn table_name(&self) -> &str {
        self.data.name()
    }

    pub fn data(&self) -> &DataSet {
        &self.data
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn popup_message(&self) -> &str {
        HELP_TEXT
    }

    /// True if the edit form should be drawn instead of the grid.
    pub fn show_form(&self) -> bool {
        self.session.is_editing()
    }

    pub fn view(&self) -> &[GridRow] {
        &self.view
    }

    pub fn layout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn visible_columns(&self) -> Vec<&Column> {
        self.grid.visible_columns(self.data.schema())
    }

    pub fn column_widths(&self) -> &[usize] {
        &self.column_widths
    }

    pub fn curser(&self) -> (usize, usize) {
        (self.curser_row, self.curser_column)
    }

    /// Rows of the view that fit on screen.
    pub fn visible_rows(&self) -> Range<usize> {
        let end = std::cmp::min(self.offset_row + self.uilayout.table_height, self.view.len());
        self.offset_row.min(end)..end
    }

    /// Visible columns that fit on screen, starting at the column offset.
    pub fn fitted_columns(&self) -> Range<usize> {
        let mut used = 0;
        let mut end = self.offset_column;
        for width in self.column_widths.iter().skip(self.offset_column) {
            if end > self.offset_column && used + width + 1 > self.uilayout.table_width {
                break;
            }
            used += width + 1;
            end += 1;
        }
        self.offset_column.min(end)..end
    }

    /// Header text for a column including sort and filter markers.
    pub fn column_title(&self, column: &Column) -> String {
        let mut title = column.name().to_string();
        let keys = self.grid.sort_keys();
        if let Some(pos) = keys.iter().position(|k| k.column == column.name()) {
            title.push(' ');
            title.push(match keys[pos].direction {
                SortDirection::Ascending => '▲',
                SortDirection::Descending => '▼',
            });
            if keys.len() > 1 {
                title.push_str(&(pos + 1).to_string());
            }
        }
        if self.grid.filter(column.name()).is_some() {
            title.push(' ');
            title.push_str(FILTER_MARK);
        }
        title
    }

    /// Untruncated value of the selected cell or form field.
    pub fn detail_line(&self) -> String {
        if self.session.is_editing() {
            let Some(field) = self.form_fields().into_iter().nth(self.form_row) else {
                return String::new();
            };
            let mut line = format!(
                "{}: {}",
                field.column.name(),
                field.column.render_detail(field.value)
            );
            if field.dirty
                && let Some(was) = self.session.original().and_then(|r| r.get(field.column.name()))
            {
                line.push_str(&format!("  (was {})", field.column.render_detail(was)));
            }
            return line;
        }
        let columns = self.visible_columns();
        match (self.view.get(self.curser_row), columns.get(self.curser_column)) {
            (Some(row), Some(column)) => format!(
                "{}: {}",
                column.name(),
                column.render_detail(&row.cells[self.curser_column])
            ),
            _ => String::new(),
        }
    }

    pub fn form_fields(&self) -> Vec<FormField<'_>> {
        match (self.session.schema(), self.session.draft()) {
            (Some(schema), Some(draft)) => schema
                .columns()
                .iter()
                .map(|column| FormField {
                    column,
                    value: draft.get(column.name()).unwrap_or(""),
                    dirty: self.session.is_field_dirty(column.name()),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn form_curser(&self) -> (usize, usize) {
        (self.form_row, self.form_offset)
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }

    pub fn cmdinput(&self) -> Option<(&CMDMode, &InputResult)> {
        if self.active_cmdinput {
            self.cmd_mode.as_ref().map(|mode| (mode, &self.last_input))
        } else {
            None
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // -------------------- Update ---------------------- //

    pub fn update(&mut self, message: Option<Message>) {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => self.select_row(self.view.len().saturating_sub(1)),
                    Message::MoveToFirstColumn => self.select_column(0),
                    Message::MoveToLastColumn => {
                        self.select_column(self.column_widths.len().saturating_sub(1))
                    }
                    Message::Enter => self.open_selected_row(),
                    Message::Exit => self.exit(),
                    Message::SortCycle => self.sort_current_column(true),
                    Message::SortCycleAdd => self.sort_current_column(false),
                    Message::HideColumn => self.hide_current_column(),
                    Message::ShowAllColumns => {
                        self.grid.show_all();
                        self.refresh_view();
                    }
                    Message::Filter => self.start_filter(),
                    Message::ClearFilters => self.clear_filters(),
                    Message::ResetView => {
                        self.grid.reset();
                        self.refresh_view();
                        self.set_status_message("Reset sort, filters and hidden columns");
                    }
                    Message::Reload => self.reload(),
                    Message::Export => self.export(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::EDIT => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_form_selection(1),
                    Message::MoveUp => self.move_form_selection(-1),
                    Message::MovePageDown => {
                        self.move_form_selection(self.uilayout.table_height as isize)
                    }
                    Message::MovePageUp => {
                        self.move_form_selection(-(self.uilayout.table_height as isize))
                    }
                    Message::MoveLeft => self.open_neighbour_row(-1),
                    Message::MoveRight => self.open_neighbour_row(1),
                    Message::Enter => self.start_field_edit(),
                    Message::Commit => self.commit(),
                    Message::Exit => self.exit(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.scroll_into_view();
        self.scroll_form_into_view();
    }

    fn current_column(&self) -> Option<String> {
        self.visible_columns()
            .get(self.curser_column)
            .map(|c| c.name().to_string())
    }

    /// Rebuilds the view from the grid state. The curser stays on the same
    /// row if it is still part of the view.
    fn refresh_view(&mut self) {
        let selected = self.view.get(self.curser_row).map(|r| r.id);
        self.view = self.grid.visible_ordered_rows(&self.data);

        let columns = self.grid.visible_columns(self.data.schema());
        self.column_widths = columns
            .iter()
            .enumerate()
            .map(|(cidx, column)| {
                let content = self
                    .view
                    .iter()
                    .map(|r| r.cells[cidx].chars().count().max(1))
                    .max()
                    .unwrap_or(0);
                let header = self.column_title(column).chars().count();
                std::cmp::min(
                    std::cmp::max(header, content) + COLUMN_WIDTH_MARGIN,
                    self.config.max_column_width,
                )
                .max(1)
            })
            .collect();

        if let Some(id) = selected
            && let Some(pos) = self.view.iter().position(|r| r.id == id)
        {
            self.curser_row = pos;
        }
        self.curser_row = std::cmp::min(self.curser_row, self.view.len().saturating_sub(1));
        self.curser_column =
            std::cmp::min(self.curser_column, self.column_widths.len().saturating_sub(1));
        self.scroll_into_view();
        trace!(
            "View of generation {}: {} rows, {} columns, Cr {}, Cc {}",
            self.data.generation(),
            self.view.len(),
            self.column_widths.len(),
            self.curser_row,
            self.curser_column
        );
    }

    fn scroll_into_view(&mut self) {
        let height = self.uilayout.table_height.max(1);
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }
        self.offset_row = std::cmp::min(self.offset_row, self.view.len().saturating_sub(1));

        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        while self.offset_column < self.curser_column
            && !self.fitted_columns().contains(&self.curser_column)
        {
            self.offset_column += 1;
        }
    }

    fn select_row(&mut self, row: usize) {
        self.curser_row = std::cmp::min(row, self.view.len().saturating_sub(1));
        self.scroll_into_view();
    }

    fn select_column(&mut self, column: usize) {
        self.curser_column = std::cmp::min(column, self.column_widths.len().saturating_sub(1));
        self.scroll_into_view();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        self.select_row(self.curser_row.saturating_sub(size));
    }

    fn move_table_selection_down(&mut self, size: usize) {
        self.select_row(self.curser_row + size);
    }

    fn move_table_selection_left(&mut self) {
        self.select_column(self.curser_column.saturating_sub(1));
    }

    fn move_table_selection_right(&mut self) {
        self.select_column(self.curser_column + 1);
    }

    fn sort_current_column(&mut self, exclusive: bool) {
        if let Some(column) = self.current_column() {
            self.grid.cycle_sort(self.data.schema(), &column, exclusive);
            self.refresh_view();
            let message = match self.grid.sort_direction(&column) {
                Some(SortDirection::Ascending) => format!("Sorted by {column} ascending"),
                Some(SortDirection::Descending) => format!("Sorted by {column} descending"),
                None => format!("Removed sort on {column}"),
            };
            self.set_status_message(message);
        }
    }

    fn hide_current_column(&mut self) {
        if let Some(column) = self.current_column() {
            self.grid
                .toggle_visibility(self.data.schema(), &column, false);
            self.refresh_view();
            self.set_status_message(format!("Hid column {column}, C shows all"));
        }
    }

    fn start_filter(&mut self) {
        if let Some(column) = self.current_column() {
            let term = self.grid.filter(&column).unwrap_or("").to_string();
            self.enter_cmd_mode(CMDMode::FilterColumn(column), &term);
        }
    }

    fn clear_filters(&mut self) {
        if self.grid.has_filters() {
            self.grid.clear_filters();
            self.refresh_view();
            self.set_status_message("Cleared filters");
        }
    }

    fn reload(&mut self) {
        let Some(path) = self.config.source.clone() else {
            self.set_status_message("Nothing to reload");
            return;
        };
        match loader::load_rows(&path) {
            Ok(rows) => {
                let schema_changed = self.data.replace_rows(rows, &self.policy);
                if schema_changed {
                    // Column references of an open draft would be stale.
                    self.session.close();
                }
                self.refresh_view();
                let message = if schema_changed {
                    format!("Reloaded {} rows with new columns", self.data.len())
                } else {
                    format!("Reloaded {} rows", self.data.len())
                };
                self.set_status_message(message);
            }
            Err(e) => {
                error!("Reload of {:?} failed: {}", path, e);
                self.set_status_message(format!("Reload failed: {e}"));
            }
        }
    }

    fn export(&mut self) {
        let columns = self.grid.visible_columns(self.data.schema());
        info!(
            "Export of {} rows x {} columns requested",
            self.view.len(),
            columns.len()
        );
        self.exporter.export(&columns, &self.view);
        self.set_status_message(format!("Export of {} rows requested", self.view.len()));
    }

    fn open_selected_row(&mut self) {
        if let Some(id) = self.view.get(self.curser_row).map(|r| r.id) {
            self.open_row(id);
        }
    }

    fn open_row(&mut self, id: usize) {
        let Some(row) = self.data.row(id) else {
            warn!("Row {} vanished before it could be opened", id);
            return;
        };
        self.session
            .open_row(id, row, Arc::clone(self.data.schema()));
        self.modus = Modus::EDIT;
        self.previous_modus = Modus::TABLE;
        self.form_row = std::cmp::min(self.form_row, self.data.schema().len().saturating_sub(1));
        self.scroll_form_into_view();
        self.set_status_message(format!("Editing row {}", id + 1));
    }

    /// Opens the previous or next row of the view, dropping the current draft.
    fn open_neighbour_row(&mut self, step: isize) {
        let Some(pos) = self.curser_row.checked_add_signed(step) else {
            return;
        };
        if pos >= self.view.len() {
            return;
        }
        let dirty = self.session.is_dirty();
        self.select_row(pos);
        self.open_row(self.view[pos].id);
        if dirty {
            self.set_status_message(format!(
                "Editing row {}, unsaved changes discarded",
                self.view[pos].id + 1
            ));
        }
    }

    fn move_form_selection(&mut self, step: isize) {
        let nfields = self.data.schema().len();
        if nfields == 0 {
            return;
        }
        self.form_row = self
            .form_row
            .saturating_add_signed(step)
            .min(nfields - 1);
        self.scroll_form_into_view();
    }

    fn scroll_form_into_view(&mut self) {
        let height = self.uilayout.table_height.max(1);
        if self.form_row < self.form_offset {
            self.form_offset = self.form_row;
        } else if self.form_row >= self.form_offset + height {
            self.form_offset = self.form_row + 1 - height;
        }
    }

    fn start_field_edit(&mut self) {
        let Some((name, read_only, value)) = self
            .form_fields()
            .get(self.form_row)
            .map(|f| (f.column.name().to_string(), f.column.is_read_only(), f.value.to_string()))
        else {
            return;
        };
        if read_only {
            self.set_status_message(format!("{name} is read-only"));
            return;
        }
        self.enter_cmd_mode(CMDMode::EditField(name), &value);
    }

    fn commit(&mut self) {
        let id = self.session.selected_id();
        let dirty = self.session.is_dirty();
        if self.session.commit(&mut self.data) {
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::EDIT;
            self.refresh_view();
            if let Some(id) = id {
                let message = if dirty {
                    format!("Saved row {}", id + 1)
                } else {
                    format!("Saved row {} (no changes)", id + 1)
                };
                self.set_status_message(message);
            }
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => self.clear_filters(),
            Modus::EDIT => {
                let dirty = self.session.is_dirty();
                self.session.close();
                self.previous_modus = Modus::EDIT;
                self.modus = Modus::TABLE;
                if dirty {
                    self.set_status_message("Closed without saving");
                }
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, initial: &str) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.set(initial);
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            debug!("Input canceled");
            return;
        }
        let input = self.last_input.input.clone();
        match mode {
            Some(CMDMode::EditField(key)) => {
                if self.session.edit_field(&key, input) {
                    self.set_status_message(format!("Changed {key}, w saves"));
                }
            }
            Some(CMDMode::FilterColumn(column)) => {
                self.grid.set_filter(self.data.schema(), &column, &input);
                self.curser_row = 0;
                self.refresh_view();
                let message = if input.is_empty() {
                    format!("Removed filter on {column}")
                } else {
                    format!("{} rows match {column} ⊇ \"{input}\"", self.view.len())
                };
                self.set_status_message(message);
            }
            None => info!("Cmd mode is none!"),
        }
    }

    fn clipboard(&mut self) -> Option<&mut Clipboard> {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => warn!("Clipboard not available: {:?}", e),
            }
        }
        self.clipboard.as_mut()
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        trace!("Copy content: {}", content);
        match self.clipboard().map(|c| c.set_text(content)) {
            Some(Ok(_)) => self.set_status_message(format!("Copied {what} to clipboard")),
            Some(Err(e)) => {
                warn!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Copy failed");
            }
            None => self.set_status_message("No clipboard available"),
        }
    }

    fn copy_table_cell(&mut self) {
        if let Some(cell) = self
            .view
            .get(self.curser_row)
            .and_then(|r| r.cells.get(self.curser_column))
            .cloned()
        {
            self.copy_to_clipboard(cell, "cell");
        }
    }

    fn copy_table_row(&mut self) {
        if let Some(row) = self.view.get(self.curser_row) {
            match csv_line(row.cells.iter().map(String::as_str)) {
                Ok(content) => self.copy_to_clipboard(content, "row"),
                Err(e) => warn!("Could not format row for clipboard: {}", e),
            }
        }
    }
}
