// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Predicate deciding whether parsed JSON output is acceptable.
pub type JsonValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One model invocation as seen by the decorator stack.
#[derive(Clone)]
pub struct CompletionRequest {
    pub input: String,
    /// Operation tag; names the call in logs and namespaces its cache entries.
    pub name: String,
    pub json: bool,
    pub json_validator: Option<JsonValidator>,
    pub variables: HashMap<String, String>,
    pub history: Vec<ChatMessage>,
    /// Overrides merged over the client's default model parameters.
    pub model_parameters: Map<String, Value>,
    /// Skip the cache lookup (the fresh result is still written).
    pub bypass_cache: bool,
}

impl CompletionRequest {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            name: name.into(),
            json: false,
            json_validator: None,
            variables: HashMap::new(),
            history: Vec::new(),
            model_parameters: Map::new(),
            bypass_cache: false,
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_validator(mut self, validator: JsonValidator) -> Self {
        self.json = true;
        self.json_validator = Some(validator);
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.model_parameters.insert(name.into(), value);
        self
    }

    /// History followed by the new user input, as sent to the provider.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(self.input.clone()));
        messages
    }
}

impl fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("name", &self.name)
            .field("input_len", &self.input.len())
            .field("json", &self.json)
            .field("has_validator", &self.json_validator.is_some())
            .field("history_len", &self.history.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub output: String,
    /// Parsed output when JSON mode was requested.
    pub json: Option<Value>,
    /// Conversation including this exchange, for continuation calls.
    pub history: Vec<ChatMessage>,
    pub cache_hit: bool,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            json: None,
            history: Vec::new(),
            cache_hit: false,
            usage: TokenUsage::default(),
        }
    }
}

/// Telemetry for one call through the retry layer.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub name: String,
    pub attempts: u32,
    pub total_time: Duration,
    pub attempt_times: Vec<Duration>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub succeeded: bool,
}

pub type InvocationCallback = Arc<dyn Fn(&InvocationRecord) + Send + Sync>;
