use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, instrument};
use tracing_error::SpanTrace;

use crate::domain::TVError;
use crate::schema::ReadOnlyPolicy;
use crate::table::{DataSet, Row};

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A column of the source file with every value rendered as a string.
struct StringColumn {
    name: String,
    data: Vec<String>,
}

/// Reads a CSV, Parquet or Arrow file into a `DataSet`.
#[instrument(skip(policy))]
pub fn load_data_file(path: &Path, policy: &ReadOnlyPolicy) -> Result<DataSet, TVError> {
    let rows = load_rows(path)?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    Ok(DataSet::new(name, rows, policy))
}

/// Reads the rows of a file, keys in column order.
#[instrument]
pub fn load_rows(path: &Path) -> Result<Vec<Row>, TVError> {
    let file_info = get_file_info(path)?;
    debug!(
        "Loading {:?} ({:?}, {} bytes)",
        file_info.path, file_info.file_type, file_info.file_size
    );
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path),
        FileType::PARQUET => load_parquet(&file_info.path),
        FileType::ARROW => load_arrow(&file_info.path),
    }
    .map_err(loading_failed)?;

    let start_time = Instant::now();
    let df = frame.collect().map_err(loading_failed)?;

    // Each column is converted in its own thread.
    let columns = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name.as_str()))
        .collect::<Result<Vec<StringColumn>, PolarsError>>()
        .map_err(loading_failed)?;

    let rows = columns_to_rows(&columns);
    info!(
        "Loading {} rows x {} columns took {}ms",
        rows.len(),
        columns.len(),
        start_time.elapsed().as_millis()
    );
    Ok(rows)
}

fn loading_failed(err: PolarsError) -> TVError {
    error!("Loading failed: {}\n{}", err, SpanTrace::capture());
    TVError::PolarsError(err)
}

fn columns_to_rows(columns: &[StringColumn]) -> Vec<Row> {
    let nrows = columns.first().map(|c| c.data.len()).unwrap_or(0);
    (0..nrows)
        .into_par_iter()
        .map(|ridx| {
            columns
                .iter()
                .map(|c| (c.name.as_str(), c.data[ridx].as_str()))
                .collect::<Row>()
        })
        .collect()
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<StringColumn, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(str::to_string).unwrap_or_default())
        .collect();
    Ok(StringColumn {
        name: col_name.to_string(),
        data,
    })
}

fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TVError::UnknownFileType),
    }
}

fn get_file_info(path: &Path) -> Result<FileInfo, TVError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TVError::FileNotFound,
        ErrorKind::PermissionDenied => TVError::PermissionDenied,
        _ => TVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TVError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
        file_type: detect_file_type(path)?,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    // No type inference: every column stays text exactly as written.
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridState, SortDirection};

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_load_csv_fixture() {
        let data = load_data_file(&fixture("placements.csv"), &ReadOnlyPolicy::default()).unwrap();
        assert_eq!(data.name(), "placements.csv");
        assert_eq!(data.len(), 4);

        let names: Vec<&str> = data.schema().columns().iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec!["Placement Name", "Buy Model", "Impressions", "Notes"]
        );
        assert!(data.schema().column("Placement Name").unwrap().is_read_only());
        assert!(!data.schema().column("Notes").unwrap().is_read_only());

        let first = data.row(0).unwrap();
        assert_eq!(first.get("Placement Name"), Some("Homepage Banner"));
        assert_eq!(first.get("Impressions"), Some("12000"));
    }

    #[test]
    fn test_missing_values_become_empty() {
        let rows = load_rows(&fixture("placements.csv")).unwrap();
        assert_eq!(rows[1].get("Notes"), Some(""));
    }

    #[test]
    fn test_csv_values_keep_their_text() {
        let rows = load_rows(&fixture("codes.csv")).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Code"), Some("007"));
        assert_eq!(rows[0].get("Rate"), Some("1.50"));
        assert_eq!(rows[1].get("Code"), Some("010"));
        assert_eq!(rows[1].get("Rate"), Some("2.00"));
        assert_eq!(rows[2].get("Date"), Some("2024-03-01"));
    }

    #[test]
    fn test_loaded_codes_sort_as_text() {
        let data = load_data_file(&fixture("codes.csv"), &ReadOnlyPolicy::default()).unwrap();
        let mut grid = GridState::new();
        grid.set_sort(data.schema(), "Code", Some(SortDirection::Descending));
        let codes: Vec<String> = grid
            .visible_ordered_rows(&data)
            .into_iter()
            .map(|r| r.cells[0].clone())
            .collect();
        assert_eq!(codes, vec!["7", "010", "007"]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_rows(&fixture("does_not_exist.csv")).unwrap_err();
        assert!(matches!(err, TVError::FileNotFound));
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            detect_file_type(Path::new("data.txt")),
            Err(TVError::UnknownFileType)
        ));
        assert!(matches!(
            detect_file_type(Path::new("data.PQ")),
            Ok(FileType::PARQUET)
        ));
    }
}
