// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ExecutionError;
use crate::table::Table;
use crate::workflow::VerbContext;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A user-supplied verb, registered by name before the run starts.
#[async_trait]
pub trait CustomVerb: Send + Sync {
    async fn execute(
        &self,
        ctx: &VerbContext<'_>,
        input: Table,
        others: Vec<Table>,
        args: &Value,
    ) -> Result<Table, ExecutionError>;
}

#[derive(Clone, Default)]
pub struct VerbRegistry {
    verbs: HashMap<String, Arc<dyn CustomVerb>>,
}

impl VerbRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `verb` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, verb: Arc<dyn CustomVerb>) {
        self.verbs.insert(name.into(), verb);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CustomVerb>> {
        self.verbs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.verbs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.verbs.keys()
    }
}

impl fmt::Debug for VerbRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.verbs.keys().collect();
        names.sort();
        f.debug_struct("VerbRegistry")
            .field("verb_count", &self.verbs.len())
            .field("verbs", &names)
            .finish()
    }
}
