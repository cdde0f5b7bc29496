// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ExecutionError;
use crate::llm::estimate_tokens;
use crate::table::{Row, Table};
use crate::workflow::verbs::VerbContext;
use crate::workflow::ChunkArgs;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use text_splitter::{ChunkConfig, TextSplitter};

/// Chunk sizes are configured in tokens; the splitter measures characters.
const CHARS_PER_TOKEN: usize = 4;

pub(crate) fn content_id(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub(super) fn chunk(
    ctx: &VerbContext<'_>,
    input: &Table,
    args: &ChunkArgs,
) -> Result<Table, ExecutionError> {
    let size = args.size.unwrap_or(ctx.config.chunks.size).max(1);
    let overlap = args.overlap.unwrap_or(ctx.config.chunks.overlap);
    let config = ChunkConfig::new(size * CHARS_PER_TOKEN)
        .with_overlap(overlap * CHARS_PER_TOKEN)
        .map_err(|e| ExecutionError::step_failed(ctx.workflow, "chunk", e.to_string()))?;
    let splitter = TextSplitter::new(config);

    let mut table = Table::with_columns(["id", "text", "document_ids", "n_tokens"]);
    let mut rows: Vec<Row> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for index in 0..input.len() {
        let text = input.str_at(index, &args.column)?;
        let document = input.str_at(index, &args.id_column)?;
        for piece in splitter.chunks(text) {
            let id = content_id(piece);
            if let Some(&position) = positions.get(&id) {
                if let Some(Value::Array(documents)) = rows[position].get_mut("document_ids") {
                    if !documents.iter().any(|d| d == document) {
                        documents.push(json!(document));
                    }
                }
                continue;
            }
            let mut row = Row::new();
            row.insert("id".into(), json!(id));
            row.insert("text".into(), json!(piece));
            row.insert("document_ids".into(), json!([document]));
            row.insert("n_tokens".into(), json!(estimate_tokens(piece)));
            positions.insert(id, rows.len());
            rows.push(row);
        }
    }
    for row in rows {
        table.push(row);
    }
    Ok(table)
}
