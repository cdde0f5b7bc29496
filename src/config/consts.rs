// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default chunk size in tokens
pub const DEFAULT_CHUNK_SIZE: usize = 1200;
/// Default overlap between consecutive chunks in tokens
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
/// Default number of concurrent row tasks per step
pub const DEFAULT_NUM_THREADS: usize = 4;
/// Default continuation rounds for graph and claim extraction
pub const DEFAULT_MAX_GLEANINGS: u32 = 1;
/// Descriptions longer than this (in characters) are summarized
pub const DEFAULT_SUMMARY_MAX_LENGTH: usize = 500;
/// Token budget for a single summarization request
pub const DEFAULT_SUMMARY_MAX_INPUT_TOKENS: usize = 4000;
/// Largest community allowed before it is split into a deeper level
pub const DEFAULT_MAX_CLUSTER_SIZE: usize = 10;
/// Deepest hierarchy level produced by clustering
pub const DEFAULT_MAX_CLUSTER_LEVELS: usize = 4;
/// Seed for clustering and node ids
pub const DEFAULT_CLUSTER_SEED: u64 = 0xDEAD_BEEF;
/// Token budget for a community report context
pub const DEFAULT_REPORT_MAX_INPUT_TOKENS: usize = 8000;
/// Default entity types requested from the model
pub const DEFAULT_ENTITY_TYPES: [&str; 4] = ["organization", "person", "geo", "event"];
