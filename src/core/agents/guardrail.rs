use std::sync::Arc;

use crate::core::realtime::GuardrailResult;

/// Verdict returned by an output guardrail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardrailOutput {
    /// Whether the guardrail wants the response stopped
    pub tripwire_triggered: bool,
    /// Optional detail for the client
    pub output_info: Option<serde_json::Value>,
}

/// Check run against each completed assistant transcript.
pub trait OutputGuardrail: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, agent: &str, text: &str) -> GuardrailOutput;
}

/// Run every guardrail and return the ones that tripped.
pub fn run_output_guardrails(
    guardrails: &[Arc<dyn OutputGuardrail>],
    agent: &str,
    text: &str,
) -> Vec<GuardrailResult> {
    guardrails
        .iter()
        .filter_map(|guardrail| {
            let output = guardrail.check(agent, text);
            output.tripwire_triggered.then(|| GuardrailResult {
                name: guardrail.name().to_string(),
                output_info: output.output_info,
            })
        })
        .collect()
}

/// Trips when the transcript contains any configured phrase (case-insensitive).
#[derive(Debug, Clone)]
pub struct BlockedPhraseGuardrail {
    phrases: Vec<String>,
}

impl BlockedPhraseGuardrail {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl OutputGuardrail for BlockedPhraseGuardrail {
    fn name(&self) -> &str {
        "blocked_phrase"
    }

    fn check(&self, _agent: &str, text: &str) -> GuardrailOutput {
        let lower = text.to_lowercase();
        match self.phrases.iter().find(|p| lower.contains(p.as_str())) {
            Some(phrase) => GuardrailOutput {
                tripwire_triggered: true,
                output_info: Some(serde_json::json!({ "phrase": phrase })),
            },
            None => GuardrailOutput::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_phrase_trips_case_insensitively() {
        let guardrail = BlockedPhraseGuardrail::new(["Secret Project", "  "]);
        assert!(!guardrail.is_empty());

        let output = guardrail.check("Assistant", "Let me tell you about the SECRET project");
        assert!(output.tripwire_triggered);
        assert_eq!(
            output.output_info,
            Some(serde_json::json!({ "phrase": "secret project" }))
        );

        assert!(!guardrail.check("Assistant", "nothing to see").tripwire_triggered);
    }

    #[test]
    fn test_run_output_guardrails_returns_only_tripped() {
        let guardrails: Vec<Arc<dyn OutputGuardrail>> = vec![
            Arc::new(BlockedPhraseGuardrail::new(["alpha"])),
            Arc::new(BlockedPhraseGuardrail::new(["beta"])),
        ];

        let results = run_output_guardrails(&guardrails, "Assistant", "alpha only");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "blocked_phrase");

        assert!(run_output_guardrails(&guardrails, "Assistant", "gamma").is_empty());
    }
}
