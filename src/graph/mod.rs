// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Knowledge graph construction: extraction from text, merging, description
//! summarization, hierarchical clustering, claims and community reports.

mod claims;
mod cluster;
mod extract;
mod model;
pub mod prompts;
mod records;
mod reports;
mod summarize;

pub use claims::{parse_claims, Claim, ClaimExtractor};
pub use cluster::{annotate_levels, cluster_graph, Clustering, Community};
pub use extract::GraphExtractor;
pub use model::{clean_text, normalize_id, DescriptionMerge, EdgeData, ExtractedGraph, NodeData};
pub use records::{parse_graph, RecordDelimiters};
pub use reports::{build_context, report_validator, CommunityReport, CommunityReporter, Finding};
pub use summarize::{DescriptionSummarizer, SummaryFailure};
