//! Data loading and the in-memory observation table
//!
//! - [`DataLoader`] reads a workbook sheet (calamine) or a CSV file (polars)
//!   into a `DataFrame`
//! - [`Dataset`] separates the label column and carries the shuffling,
//!   column and splitting operations used by the pipeline

mod config;
pub mod dataset;
pub mod loader;

pub use config::{ColumnRename, DataConfig, DEFAULT_SHEET, DEFAULT_TARGET};
pub use dataset::{midpoint, permutation, Dataset};
pub use loader::{ColumnInfo, DataLoader, FileFormat, FileInfo};
