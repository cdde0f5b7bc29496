// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading of the root input table.
//!
//! Every storage key matching the input pattern is one source file. Text
//! files become one document each; CSV files contribute one document per
//! record. Document ids are the SHA-256 of the document text, and named
//! groups captured from the key become extra columns.

use crate::config::{InputConfig, InputFileType};
use crate::errors::{ExecutionError, TableError, ValidationError};
use crate::observability::messages::pipeline::InputLoaded;
use crate::observability::messages::StructuredLog;
use crate::storage::{CapturedGroups, FindOptions, PipelineStorage};
use crate::table::{csv, Row, Table};
use crate::workflow::verbs::content_id;
use futures::TryStreamExt;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::time::Instant;

/// Reads every matching file from `storage` into one documents table with
/// `id`, `text` and `title` columns.
pub async fn load_input(
    config: &InputConfig,
    storage: &dyn PipelineStorage,
) -> Result<Table, ExecutionError> {
    let started = Instant::now();
    let pattern = Regex::new(config.pattern()).map_err(|e| ValidationError::InvalidValue {
        field: "input.file_pattern".to_string(),
        reason: e.to_string(),
    })?;
    let options = FindOptions {
        base_dir: config.base_dir.clone(),
        ..FindOptions::default()
    };
    let mut files: Vec<(String, CapturedGroups)> = storage.find(&pattern, options).try_collect().await?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Table::with_columns(["id", "text", "title"]);
    for (key, groups) in files {
        let Some(content) = storage.get_text(&key, config.encoding.as_deref()).await? else {
            continue;
        };
        match config.file_type {
            InputFileType::Text => documents.push(text_document(&key, content, &groups)),
            InputFileType::Csv => {
                for row in csv_documents(config, &key, &content, &groups)? {
                    documents.push(row);
                }
            }
        }
    }

    InputLoaded {
        source: &storage.describe(),
        documents: documents.len(),
        elapsed: started.elapsed(),
    }
    .log();
    Ok(documents)
}

fn with_groups(mut row: Row, groups: &CapturedGroups) -> Row {
    let mut names: Vec<&String> = groups.keys().collect();
    names.sort();
    for name in names {
        row.entry(name.clone())
            .or_insert_with(|| json!(groups[name]));
    }
    row
}

fn text_document(key: &str, text: String, groups: &CapturedGroups) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), json!(content_id(&text)));
    row.insert("text".into(), Value::String(text));
    row.insert("title".into(), json!(key));
    with_groups(row, groups)
}

fn csv_documents(
    config: &InputConfig,
    key: &str,
    content: &str,
    groups: &CapturedGroups,
) -> Result<Vec<Row>, TableError> {
    let table = csv::decode(content.as_bytes())?;
    table.require_column(&config.text_column)?;
    if let Some(title) = &config.title_column {
        table.require_column(title)?;
    }
    for column in &config.document_attribute_columns {
        table.require_column(column)?;
    }

    let mut rows = Vec::with_capacity(table.len());
    for index in 0..table.len() {
        let text = table.str_at(index, &config.text_column)?.to_string();
        let title = match &config.title_column {
            Some(column) => table.str_at(index, column)?.to_string(),
            None => key.to_string(),
        };
        let mut row = Row::new();
        row.insert("id".into(), json!(content_id(&text)));
        row.insert("text".into(), Value::String(text));
        row.insert("title".into(), Value::String(title));
        if !config.document_attribute_columns.is_empty() {
            let attributes: Map<String, Value> = config
                .document_attribute_columns
                .iter()
                .map(|c| (c.clone(), table.rows()[index].get(c).cloned().unwrap_or(Value::Null)))
                .collect();
            row.insert("attributes".into(), Value::Object(attributes));
        }
        rows.push(with_groups(row, groups));
    }
    Ok(rows)
}
