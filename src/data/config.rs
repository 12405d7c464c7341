//! Data source configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default sheet of the UCI credit card clients workbook
pub const DEFAULT_SHEET: &str = "Data";

/// Default label column of the UCI credit card clients workbook
pub const DEFAULT_TARGET: &str = "default payment next month";

/// A column rename applied after loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
}

impl ColumnRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Where the observation table comes from and how it is shaped
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Input file (spreadsheet or CSV)
    pub path: Option<PathBuf>,

    /// Sheet to read from spreadsheet workbooks
    pub sheet_name: String,

    /// Number of rows above the header row
    pub header_row: usize,

    /// Label column name
    pub target_column: String,

    /// Identifier columns removed after shuffling
    pub drop_columns: Vec<String>,

    /// Renames applied before feature engineering
    pub renames: Vec<ColumnRename>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            sheet_name: DEFAULT_SHEET.to_string(),
            header_row: 1,
            target_column: DEFAULT_TARGET.to_string(),
            drop_columns: vec!["ID".to_string()],
            renames: vec![ColumnRename::new("PAY_0", "PAY_1")],
        }
    }
}

impl DataConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the input file
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builder method to set the sheet name
    pub fn with_sheet_name(mut self, sheet: impl Into<String>) -> Self {
        self.sheet_name = sheet.into();
        self
    }

    /// Builder method to set the header row offset
    pub fn with_header_row(mut self, row: usize) -> Self {
        self.header_row = row;
        self
    }

    /// Builder method to set the label column
    pub fn with_target_column(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    /// Builder method to set the identifier columns
    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    /// Builder method to set the renames
    pub fn with_renames(mut self, renames: Vec<ColumnRename>) -> Self {
        self.renames = renames;
        self
    }
}
