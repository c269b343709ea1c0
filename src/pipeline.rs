//! The decision pipeline reconciling untrusted generative output with the
//! trusted rule-based corrector.
//!
//! Per call: GENERATE -> GATE -> (accepted | rejected -> HEURISTIC) ->
//! legacy fixups (fix only). No state survives an invocation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::adapter::{GenerationResult, GenerativeAdapter};
use crate::gate::{QualityGate, QualityVerdict};
use crate::heuristics::HeuristicEngine;

pub const RULE_ID: &str = "ai-generative-improvement";

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(" {2,}").expect("valid regex"));

/// One reported improvement, shaped for the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub rule_id: String,
    pub severity: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub snippet: String,
    pub fix: IssueFix,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFix {
    pub fixed_code: String,
    pub description: String,
}

impl Issue {
    fn generative_improvement(original: &str, fixed: String) -> Self {
        // Content-hashed id: stable across repeated calls on identical input
        let digest = blake3::hash(fixed.as_bytes());
        let id = format!("ai-fix-{}", &digest.to_hex().as_str()[..16]);
        Self {
            id,
            rule_id: RULE_ID.to_string(),
            severity: "medium".to_string(),
            message: "Generative model suggests an accessibility improvement for this fragment"
                .to_string(),
            kind: "warning".to_string(),
            snippet: original.to_string(),
            fix: IssueFix {
                fixed_code: fixed,
                description: "Apply the AI-suggested accessibility correction".to_string(),
            },
        }
    }
}

pub struct CorrectionPipeline {
    adapter: GenerativeAdapter,
    gate: QualityGate,
    heuristics: HeuristicEngine,
}

impl CorrectionPipeline {
    pub fn new(adapter: GenerativeAdapter, gate: QualityGate, heuristics: HeuristicEngine) -> Self {
        Self {
            adapter,
            gate,
            heuristics,
        }
    }

    pub fn model_available(&self) -> bool {
        self.adapter.is_available()
    }

    /// Shared inner flow: generation, gating, heuristic fallback.
    ///
    /// When the gate rejects (or the generator is missing or errors) the
    /// heuristics run against the *original* fragment, never against the
    /// discarded candidate.
    async fn suggest(&self, fragment: &str) -> String {
        let working = match self.adapter.generate(fragment).await {
            GenerationResult::Candidate(candidate) => {
                match self.gate.evaluate(fragment, &candidate) {
                    QualityVerdict::Accepted(candidate) => candidate,
                    QualityVerdict::Rejected(reason) => {
                        debug!(?reason, "candidate rejected by quality gate");
                        fragment.to_string()
                    }
                }
            }
            GenerationResult::Unavailable | GenerationResult::Failed => fragment.to_string(),
        };

        if working == fragment {
            self.heuristics.apply(fragment)
        } else {
            working
        }
    }

    /// Produce a corrected fragment. The issue descriptor is accepted for
    /// forward compatibility and passed over uninterpreted.
    pub async fn fix(&self, fragment: &str, _issue: Option<&serde_json::Value>) -> String {
        let working = self.suggest(fragment).await;
        apply_legacy_fixups(&working)
    }

    /// Report structural improvements the pipeline is confident about.
    /// Primary violation detection belongs to an external analyzer, so a
    /// missing model yields an empty list rather than heuristic guesses.
    pub async fn analyze(
        &self,
        fragment: &str,
        _issue: Option<&serde_json::Value>,
    ) -> Vec<Issue> {
        if !self.adapter.is_available() {
            return Vec::new();
        }

        let suggested = self.suggest(fragment).await;
        if normalize_whitespace(fragment) != normalize_whitespace(&suggested) {
            vec![Issue::generative_improvement(fragment, suggested)]
        } else {
            Vec::new()
        }
    }
}

/// Cheap, local, idempotent point-fixups kept from earlier revisions of the
/// corrector. Each one is a no-op on input it does not recognize.
pub fn apply_legacy_fixups(fragment: &str) -> String {
    let mut out = fragment.to_string();

    // Redundant explicit role on a native button
    if out.contains("<button")
        && (out.contains("role=\"button\"") || out.contains("role='button'"))
    {
        out = out.replace("role=\"button\"", "").replace("role='button'", "");
        out = MULTI_SPACE.replace_all(&out, " ").into_owned();
        out = out.replace("<button >", "<button>");
    }

    // Triply-escaped empty alt attribute
    if out.contains("alt=\"\"\"") {
        out = out.replace("alt=\"\"\"", "alt=\"\"");
    }

    out
}

/// Collapse consecutive whitespace to single spaces so re-serialization
/// formatting alone never counts as a difference.
fn normalize_whitespace(fragment: &str) -> String {
    fragment.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_role_fixup() {
        assert_eq!(
            apply_legacy_fixups("<button role=\"button\">Go</button>"),
            "<button>Go</button>"
        );
        assert_eq!(
            apply_legacy_fixups("<button role='button' class=\"cta\">Go</button>"),
            "<button class=\"cta\">Go</button>"
        );
    }

    #[test]
    fn button_role_fixup_is_idempotent() {
        let once = apply_legacy_fixups("<button role=\"button\">Go</button>");
        assert_eq!(apply_legacy_fixups(&once), once);
    }

    #[test]
    fn role_outside_button_untouched() {
        let input = "<div role=\"button\">Go</div>";
        assert_eq!(apply_legacy_fixups(input), input);
    }

    #[test]
    fn empty_alt_fixup() {
        assert_eq!(apply_legacy_fixups("<img alt=\"\"\"\">"), "<img alt=\"\">");
        let fixed = apply_legacy_fixups("<img alt=\"\"\"\">");
        assert_eq!(apply_legacy_fixups(&fixed), fixed);
    }

    #[test]
    fn whitespace_normalization_collapses_runs() {
        assert_eq!(
            normalize_whitespace("<main>\n  Hi\n</main>"),
            normalize_whitespace("<main> Hi </main>")
        );
    }

    #[test]
    fn issue_id_is_content_derived() {
        let a = Issue::generative_improvement("<img>", "<img alt=\"x\">".to_string());
        let b = Issue::generative_improvement("<img>", "<img alt=\"x\">".to_string());
        let c = Issue::generative_improvement("<img>", "<img alt=\"y\">".to_string());
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert!(a.id.starts_with("ai-fix-"));
        assert_eq!(a.rule_id, RULE_ID);
        assert_eq!(a.severity, "medium");
        assert_eq!(a.kind, "warning");
    }
}
