use csv::{Terminator, WriterBuilder};
use std::io;
use std::path::PathBuf;
use tracing::{error, info};

use crate::grid::GridRow;
use crate::schema::Column;

/// Invoked when the user asks for an export of the current view.
///
/// Fire and forget: implementations report their own outcome.
pub trait ExportTrigger {
    fn export(&mut self, columns: &[&Column], rows: &[GridRow]);
}

/// Writes the visible, ordered grid to a CSV file.
#[derive(Debug)]
pub struct CsvExport {
    path: PathBuf,
}

impl CsvExport {
    pub fn new(path: PathBuf) -> Self {
        CsvExport { path }
    }

    fn write(&self, columns: &[&Column], rows: &[GridRow]) -> csv::Result<()> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_path(&self.path)?;
        // A record without fields is not valid CSV, an empty view gives an empty file.
        if !columns.is_empty() {
            writer.write_record(columns.iter().map(|c| c.name()))?;
            for row in rows {
                writer.write_record(&row.cells)?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

impl ExportTrigger for CsvExport {
    fn export(&mut self, columns: &[&Column], rows: &[GridRow]) {
        match self.write(columns, rows) {
            Ok(_) => info!("Exported {} rows to {:?}", rows.len(), self.path),
            Err(e) => error!("Export to {:?} failed: {}", self.path, e),
        }
    }
}

/// One CSV record without line terminator, quoted where needed.
pub fn csv_line<'a>(cells: impl IntoIterator<Item = &'a str>) -> io::Result<String> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(cells)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let line = String::from_utf8_lossy(&bytes);
    Ok(line.trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_csv_line_quoting() {
        assert_eq!(csv_line(["a", "b"]).unwrap(), "a,b");
        assert_eq!(csv_line(["a b", "c,d"]).unwrap(), "a b,\"c,d\"");
        assert_eq!(csv_line(["say \"hi\""]).unwrap(), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_line(["", "x"]).unwrap(), ",x");
        assert_eq!(csv_line(["two\nlines"]).unwrap(), "\"two\nlines\"");
    }

    #[test]
    fn test_export_writes_visible_view() {
        let path = std::env::temp_dir().join(format!("tve-export-{}.csv", std::process::id()));
        let name = Column::new("name", false);
        let notes = Column::new("Notes", false);
        let rows = vec![
            GridRow {
                id: 1,
                cells: vec!["y".into(), "weekly, sponsored".into()],
            },
            GridRow {
                id: 0,
                cells: vec!["x".into(), "".into()],
            },
        ];

        let mut export = CsvExport::new(path.clone());
        export.export(&[&name, &notes], &rows);

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "name,Notes\ny,\"weekly, sponsored\"\nx,\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_export_without_columns_writes_empty_file() {
        let path =
            std::env::temp_dir().join(format!("tve-export-empty-{}.csv", std::process::id()));
        let mut export = CsvExport::new(path.clone());
        export.export(&[], &[]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_export_failure_is_swallowed() {
        let mut export = CsvExport::new(PathBuf::from("/nonexistent-dir/out.csv"));
        export.export(&[], &[]);
    }
}
