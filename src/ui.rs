use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row as UiRow, Table, TableState},
};

use crate::domain::{CMDMode, TVConfig};
use crate::model::{Model, Modus};
use crate::schema::truncate;

pub const STATUSLINE_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER: usize = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(8);
const FORM_MARKER_WIDTH: usize = 6;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [main, status] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        if model.show_form() {
            self.draw_form(model, frame, main);
        } else {
            self.draw_table(model, frame, main);
        }
        self.draw_statusline(model, frame, status);

        if model.modus() == Modus::POPUP {
            self.draw_popup(model, frame);
        }
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let columns = model.visible_columns();
        let widths = model.column_widths();
        let fitted = model.fitted_columns();
        let rows = model.visible_rows();
        let (curser_row, curser_column) = model.curser();

        let header = UiRow::new(
            fitted
                .clone()
                .map(|c| Cell::from(truncate(&model.column_title(columns[c]), widths[c]))),
        )
        .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));

        let body = model.view()[rows.clone()].iter().map(|row| {
            UiRow::new(
                fitted
                    .clone()
                    .map(|c| Cell::from(columns[c].render_cell(&row.cells[c], widths[c]))),
            )
        });

        let title = Line::from(Span::from(format!(" {} ", model.table_name())).bold());
        let position = if model.view().is_empty() {
            " no rows ".to_string()
        } else {
            format!(
                " {}/{} of {} ",
                curser_row + 1,
                model.view().len(),
                model.data().len()
            )
        };
        let position = if model.data().schema().is_empty() {
            " empty data set ".to_string()
        } else {
            position
        };
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(Line::from(position).right_aligned());

        let table = Table::new(body, fitted.clone().map(|c| Constraint::Length(widths[c] as u16)))
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .cell_highlight_style(Style::default().fg(Color::Black).bg(Color::Yellow));

        let mut state = TableState::default()
            .with_selected(curser_row.checked_sub(rows.start).filter(|_| !rows.is_empty()))
            .with_selected_column(curser_column.checked_sub(fitted.start));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_form(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let fields = model.form_fields();
        let (form_row, form_offset) = model.form_curser();
        let height = model.layout().table_height;

        let name_width = fields
            .iter()
            .map(|f| f.column.name().chars().count())
            .max()
            .unwrap_or(0)
            .min(self.max_column_width)
            + FORM_MARKER_WIDTH;
        let value_width = (area.width as usize).saturating_sub(name_width + TABLE_BORDER + 1);

        let end = std::cmp::min(form_offset + height, fields.len());
        let body = fields[form_offset.min(end)..end].iter().map(|f| {
            let marker = if f.column.is_read_only() {
                " [ro]"
            } else if f.dirty {
                " *"
            } else {
                ""
            };
            let name = Span::raw(format!(
                "{}{}",
                truncate(f.column.name(), name_width - FORM_MARKER_WIDTH),
                marker
            ));
            let value = Span::raw(f.column.render_cell(f.value, value_width));
            let style = if f.column.is_read_only() {
                Style::default().fg(Color::DarkGray)
            } else if f.dirty {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            UiRow::new(vec![Cell::from(name), Cell::from(value)]).style(style)
        });

        let id = model.session().selected_id().map(|id| id + 1).unwrap_or(0);
        let title = Line::from(Span::from(format!(" Edit row {} of {} ", id, model.table_name())).bold());
        let instructions = Line::from(vec![
            " Edit ".into(),
            "<Enter>".blue().bold(),
            " Save ".into(),
            "<W>".blue().bold(),
            " Close ".into(),
            "<Esc> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered());

        let header = UiRow::new(vec!["Field", "Value"])
            .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        let table = Table::new(
            body,
            [
                Constraint::Length(name_width as u16),
                Constraint::Min(1),
            ],
        )
        .header(header)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let selected = form_row.checked_sub(form_offset).filter(|_| !fields.is_empty());
        let mut state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let [detail_area, message_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

        let detail = truncate(&model.detail_line(), area.width as usize);
        frame.render_widget(Paragraph::new(detail).cyan(), detail_area);

        if let Some((mode, input)) = model.cmdinput() {
            let prompt = match mode {
                CMDMode::EditField(key) => format!("{key} = "),
                CMDMode::FilterColumn(column) => format!("filter {column} ⊇ "),
            };
            let line = Line::from(vec![
                Span::from(prompt.clone()).yellow().bold(),
                Span::from(input.input.clone()),
            ]);
            frame.render_widget(Paragraph::new(line), message_area);

            let x = message_area.x as usize + prompt.chars().count() + input.curser_pos;
            let x = x.min((message_area.x + message_area.width.saturating_sub(1)) as usize);
            frame.set_cursor_position((x as u16, message_area.y));
        } else {
            let message = if model.last_status_message_update().elapsed() < STATUS_MESSAGE_TIMEOUT {
                model.status_message().to_string()
            } else {
                "? help  q quit".to_string()
            };
            frame.render_widget(Paragraph::new(message), message_area);
        }
    }

    fn draw_popup(&self, model: &Model, frame: &mut Frame) {
        let text = model.popup_message();
        let height = text.lines().count() as u16 + 2;
        let width = text.lines().map(|l| l.chars().count()).max().unwrap_or(0) as u16 + 4;
        let area = popup_area(frame.area(), width, height);

        let block = Block::bordered().title(Line::from(" Help ".bold()).centered());
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(text).block(block), area);
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    area
}
