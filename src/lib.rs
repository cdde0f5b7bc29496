// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cache;         // content-addressed model response cache
pub mod config;        // pipeline configuration + validation
pub mod errors;        // error handling
pub mod graph;         // extraction, clustering, summaries, reports
pub mod limiting;      // rate and concurrency limiters
pub mod llm;           // model client decorator stack
pub mod observability;
pub mod runtime;       // workflow runner, checkpoints, emitters
pub mod storage;       // memory, file and blob storage
pub mod table;         // tables and their codecs
pub mod workflow;      // verbs, workflows, dependency resolution
