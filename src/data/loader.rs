//! Data loading utilities

use super::config::{DataConfig, DEFAULT_SHEET};
use crate::error::{Result, ScopeError};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma separated values
    Csv,
    /// Excel / OpenDocument workbook
    Spreadsheet,
}

impl FileFormat {
    /// Detect file format from extension
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Ok(FileFormat::Spreadsheet),
            _ => Err(ScopeError::DataError(format!(
                "Unsupported file format: '{}' ({})",
                ext,
                path.display()
            ))),
        }
    }
}

/// Data loader for spreadsheets and CSV files
pub struct DataLoader {
    /// Sheet to read from workbooks
    sheet_name: String,
    /// Rows above the header
    header_row: usize,
    /// Rows used for CSV schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET.to_string(),
            header_row: 0,
            infer_schema_length: 1000,
        }
    }

    /// Create a loader matching a data configuration
    pub fn from_config(config: &DataConfig) -> Self {
        Self::new()
            .with_sheet_name(config.sheet_name.clone())
            .with_header_row(config.header_row)
    }

    /// Set the sheet name
    pub fn with_sheet_name(mut self, sheet: impl Into<String>) -> Self {
        self.sheet_name = sheet.into();
        self
    }

    /// Set the number of rows above the header, counted from the top of the
    /// sheet (or file) even when leading rows are blank
    pub fn with_header_row(mut self, row: usize) -> Self {
        self.header_row = row;
        self
    }

    /// Detect file format from extension and load
    pub fn load(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(ScopeError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        let df = match FileFormat::detect(path)? {
            FileFormat::Csv => self.load_csv(path)?,
            FileFormat::Spreadsheet => self.load_spreadsheet(path)?,
        };

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded observation table"
        );
        Ok(df)
    }

    /// Load a CSV file, skipping rows above the header
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_skip_rows(self.header_row)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        validate_header(&names)?;
        Ok(df)
    }

    /// Load one sheet of a workbook
    pub fn load_spreadsheet(&self, path: &Path) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto(path)?;

        let sheets = workbook.sheet_names();
        if !sheets.iter().any(|s| s == &self.sheet_name) {
            return Err(ScopeError::DataError(format!(
                "Sheet '{}' not found in {} (available: {})",
                self.sheet_name,
                path.display(),
                sheets.join(", ")
            )));
        }

        let range = workbook.worksheet_range(&self.sheet_name)?;

        // The range begins at the first non-empty row, header_row counts from the sheet top
        let first_row = range.start().map_or(0, |(row, _)| row as usize);
        if first_row > self.header_row {
            return Err(ScopeError::DataError(format!(
                "Sheet '{}' has no header at row {}: its first non-empty row is {}",
                self.sheet_name, self.header_row, first_row
            )));
        }
        let mut rows = range.rows().skip(self.header_row - first_row);

        let header = rows.next().ok_or_else(|| {
            ScopeError::DataError(format!(
                "Sheet '{}' has no header at row {}",
                self.sheet_name, self.header_row
            ))
        })?;
        let names: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();
        validate_header(&names)?;

        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
        let mut skipped = 0usize;
        for row in rows {
            if row.iter().all(|c| matches!(c, Data::Empty)) {
                skipped += 1;
                continue;
            }
            for (j, column) in columns.iter_mut().enumerate() {
                column.push(row.get(j).and_then(cell_to_f64));
            }
        }
        if skipped > 0 {
            debug!(skipped, "Skipped empty spreadsheet rows");
        }

        let columns: Vec<Column> = names
            .iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name.as_str().into(), values))
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    /// Get table information without further processing
    pub fn get_file_info(&self, path: &Path) -> Result<FileInfo> {
        let file_size = std::fs::metadata(path)?.len();
        let df = self.load(path)?;

        let columns: Vec<ColumnInfo> = df
            .get_columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                dtype: c.dtype().to_string(),
                null_count: c.null_count(),
            })
            .collect();

        Ok(FileInfo {
            path: path.display().to_string(),
            file_size,
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        })
    }
}

fn validate_header(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(ScopeError::DataError("Header row is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for (idx, name) in names.iter().enumerate() {
        if name.is_empty() {
            return Err(ScopeError::DataError(format!("Header cell {} is empty", idx)));
        }
        if !seen.insert(name.as_str()) {
            return Err(ScopeError::DataError(format!("Duplicate column name: {}", name)));
        }
    }
    Ok(())
}

fn cell_to_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(v) => Some(*v as f64),
        Data::Float(v) => Some(*v),
        Data::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        Data::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Column information
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub file_size: u64,
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnInfo>,
}
