// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ExecutionError;
use crate::graph::{Claim, ClaimExtractor};
use crate::table::{Row, Table};
use crate::workflow::verbs::{snippet, VerbContext};
use crate::workflow::ExtractClaimsArgs;
use serde_json::{json, Value};
use uuid::Uuid;

const CLAIM_COLUMNS: [&str; 13] = [
    "id",
    "human_readable_id",
    "covariate_type",
    "subject_id",
    "object_id",
    "type",
    "status",
    "start_date",
    "end_date",
    "description",
    "source_text",
    "text_unit_id",
    "document_ids",
];

/// One row per claim found in any chunk.
///
/// Subjects default to the configured entity types; failed chunks are
/// reported and contribute nothing.
pub(super) async fn extract_claims(
    ctx: &VerbContext<'_>,
    input: &Table,
    args: &ExtractClaimsArgs,
) -> Result<Table, ExecutionError> {
    let settings = &ctx.config.claim_extraction;
    let entity_specs = args
        .entity_specs
        .clone()
        .unwrap_or_else(|| ctx.config.entity_extraction.entity_types.clone());
    let mut extractor = ClaimExtractor::new(
        ctx.llm()?,
        entity_specs,
        args.description.clone().unwrap_or_else(|| settings.description.clone()),
        args.max_gleanings.unwrap_or(settings.max_gleanings),
    );
    if let Some(prompt) = args.prompt.as_ref().or(settings.prompt.as_ref()) {
        extractor = extractor.with_prompt(prompt.clone());
    }

    let mut items = Vec::with_capacity(input.len());
    for index in 0..input.len() {
        let text = input.str_at(index, &args.text_column)?;
        let id = input.str_at(index, &args.id_column)?;
        items.push((snippet(text), (index, id.to_string(), text.to_string())));
    }

    let extractor = &extractor;
    let found = ctx
        .fan_out("extract_claims", items, |(index, id, text)| async move {
            let claims = extractor.extract(&id, &text).await?;
            Ok::<_, ExecutionError>((index, claims))
        })
        .await?;

    let mut out = Table::with_columns(CLAIM_COLUMNS);
    let mut position = 0;
    for (index, claims) in found {
        let documents = input.rows()[index]
            .get("document_ids")
            .cloned()
            .unwrap_or(Value::Null);
        for claim in claims {
            out.push(claim_row(&claim, position, documents.clone()));
            position += 1;
        }
    }
    Ok(out)
}

fn claim_row(claim: &Claim, position: usize, documents: Value) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), json!(Uuid::new_v4().to_string()));
    row.insert("human_readable_id".into(), json!(position));
    row.insert("covariate_type".into(), json!("claim"));
    row.insert("subject_id".into(), json!(claim.subject_id));
    row.insert("object_id".into(), json!(claim.object_id));
    row.insert("type".into(), json!(claim.claim_type));
    row.insert("status".into(), json!(claim.status));
    row.insert("start_date".into(), json!(claim.start_date));
    row.insert("end_date".into(), json!(claim.end_date));
    row.insert("description".into(), json!(claim.description));
    row.insert("source_text".into(), json!(claim.source_text));
    row.insert("text_unit_id".into(), json!(claim.text_unit_id));
    row.insert("document_ids".into(), documents);
    row
}
