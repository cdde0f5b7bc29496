// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for table encoding and column access.

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("column '{column}' not found in table")]
    MissingColumn { column: String },

    #[error("column '{column}' row {row}: expected {expected}")]
    InvalidCell {
        column: String,
        row: usize,
        expected: &'static str,
    },

    #[error("arrow encoding failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet encoding failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported parquet column type {data_type} for '{column}'")]
    UnsupportedType { column: String, data_type: String },
}
