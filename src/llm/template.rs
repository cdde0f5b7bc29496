// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::llm::{CompletionLlm, CompletionRequest, CompletionResponse, Role};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Replaces `{name}` placeholders whose name is in `variables`.
///
/// Unknown placeholders are left untouched, so literal JSON braces in prompts
/// survive.
///
/// ```rust
/// use graphrag_indexer::llm::substitute;
/// use std::collections::HashMap;
///
/// let vars = HashMap::from([("entity".to_string(), "ACME".to_string())]);
/// assert_eq!(substitute("About {entity}: {\"a\": 1}", &vars), "About ACME: {\"a\": 1}");
/// ```
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    if variables.is_empty() {
        return text.to_string();
    }
    let Some(pattern) = PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
    else {
        return text.to_string();
    };
    pattern
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Fills template variables in the input and in system-role history entries.
pub struct TemplateLlm {
    inner: Arc<dyn CompletionLlm>,
}

impl TemplateLlm {
    pub fn new(inner: Arc<dyn CompletionLlm>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CompletionLlm for TemplateLlm {
    async fn invoke(&self, mut request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if !request.variables.is_empty() {
            request.input = substitute(&request.input, &request.variables);
            for message in request.history.iter_mut().filter(|m| m.role == Role::System) {
                message.content = substitute(&message.content, &request.variables);
            }
        }
        self.inner.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::StaticLlm;
    use crate::llm::ChatMessage;

    #[test]
    fn test_substitute_cases() {
        let vars = HashMap::from([
            ("a".to_string(), "1".to_string()),
            ("text".to_string(), "{a}".to_string()),
        ]);
        let cases = vec![
            ("{a}+{a}", "1+1"),
            ("{missing}", "{missing}"),
            ("{ a }", "{ a }"),
            ("{text}", "{a}"),
        ];
        for (input, expected) in cases {
            assert_eq!(substitute(input, &vars), expected);
        }
    }

    #[tokio::test]
    async fn test_only_system_history_is_templated() {
        let provider = Arc::new(StaticLlm::from_fn(|request, _| {
            Ok(request
                .history
                .iter()
                .map(|m| m.content.clone())
                .chain(std::iter::once(request.input.clone()))
                .collect::<Vec<_>>()
                .join("|"))
        }));
        let llm = TemplateLlm::new(provider);
        let request = CompletionRequest::new("t", "input {x}")
            .with_history(vec![
                ChatMessage::system("system {x}"),
                ChatMessage::user("user {x}"),
            ])
            .with_variable("x", "X");

        let response = llm.invoke(request).await.unwrap();
        assert_eq!(response.output, "system X|user {x}|input X");
    }
}
