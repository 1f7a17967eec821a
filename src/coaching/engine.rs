use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::mappings::ContentMapping;

/// Category of a coaching tip; drives presentation in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Objection,
    Closing,
    Competitive,
    Hint,
    Keyword,
    Suggestion,
    Analysis,
}

impl TipKind {
    pub fn label(&self) -> &'static str {
        match self {
            TipKind::Objection => "Objection Handling",
            TipKind::Closing => "Closing Opportunity",
            TipKind::Competitive => "Competitive Situation",
            TipKind::Hint => "Hint",
            TipKind::Keyword => "Keyword Match",
            TipKind::Suggestion => "Suggestion",
            TipKind::Analysis => "Analysis",
        }
    }
}

/// One fired annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingTip {
    /// Mapping or rule id; fires at most once per session
    pub id: String,
    pub title: String,
    pub content: String,
    /// The keyword that matched, for mapping-based tips
    pub keyword: Option<String>,
    pub kind: TipKind,
}

struct BuiltinRule {
    id: &'static str,
    title: &'static str,
    content: &'static str,
    keywords: &'static [&'static str],
    kind: TipKind,
}

/// Fallback rules evaluated when no configured mapping fires.
const BUILTIN_RULES: &[BuiltinRule] = &[
    BuiltinRule {
        id: "price",
        title: "Price Objection",
        content: "Focus on value and ROI. Ask about the cost of not solving the problem.",
        keywords: &["price", "cost"],
        kind: TipKind::Objection,
    },
    BuiltinRule {
        id: "closing",
        title: "Closing Opportunity",
        content: "Perfect timing to address concerns and move forward.",
        keywords: &["think about", "consider"],
        kind: TipKind::Closing,
    },
    BuiltinRule {
        id: "competitive",
        title: "Competitive Situation",
        content: "Highlight unique differentiators and proven results.",
        keywords: &["competitor", "compare"],
        kind: TipKind::Competitive,
    },
];

/// Multi-word domain phrases collapsed to canonical tokens before matching.
const NORMALIZATIONS: &[(&str, &str)] = &[
    ("elastic search", "elasticsearch"),
    ("service now", "servicenow"),
    ("splunk on-call", "splunk oncall"),
    ("splunk on call", "splunk oncall"),
    ("return on investment", "roi"),
    ("mean time to recovery", "mttr"),
    ("mean time to resolution", "mttr"),
    ("service level agreement", "sla"),
];

/// Keyword scanner with at-most-once-per-session semantics.
///
/// Aside from the triggered-id set, `scan` is a pure function of the text
/// and the mapping configuration.
#[derive(Debug, Default)]
pub struct CoachingEngine {
    mappings: Vec<ContentMapping>,
    triggered: HashSet<String>,
}

impl CoachingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(mappings: Vec<ContentMapping>) -> Self {
        Self {
            mappings,
            triggered: HashSet::new(),
        }
    }

    /// Lower-case and collapse known domain phrases to canonical tokens.
    pub fn normalize(text: &str) -> String {
        let mut normalized = text.to_lowercase();
        for (phrase, canonical) in NORMALIZATIONS {
            normalized = normalized.replace(phrase, canonical);
        }
        normalized
    }

    /// Scan newly processed text; at most one tip per call.
    ///
    /// Configured mappings are evaluated first in list order, then the
    /// built-in rules. A mapping or rule whose id has already fired this
    /// session never fires again until the session is cleared.
    pub fn scan(&mut self, text: &str) -> Option<CoachingTip> {
        let lowered = text.to_lowercase();
        let normalized = Self::normalize(text);

        for mapping in &self.mappings {
            if self.triggered.contains(&mapping.id) {
                continue;
            }
            for keyword in &mapping.keywords {
                let kw = keyword.trim().to_lowercase();
                if kw.is_empty() {
                    continue;
                }
                if lowered.contains(&kw) || normalized.contains(&kw) {
                    debug!(keyword = %keyword, mapping = %mapping.id, "content mapping triggered");
                    self.triggered.insert(mapping.id.clone());
                    return Some(CoachingTip {
                        id: mapping.id.clone(),
                        title: mapping.kind.label().to_string(),
                        content: mapping.content.clone(),
                        keyword: Some(keyword.clone()),
                        kind: mapping.kind,
                    });
                }
            }
        }

        for rule in BUILTIN_RULES {
            if self.triggered.contains(rule.id) {
                continue;
            }
            if rule.keywords.iter().any(|kw| lowered.contains(kw)) {
                debug!(rule = rule.id, "built-in rule triggered");
                self.triggered.insert(rule.id.to_string());
                return Some(CoachingTip {
                    id: rule.id.to_string(),
                    title: rule.title.to_string(),
                    content: rule.content.to_string(),
                    keyword: None,
                    kind: rule.kind,
                });
            }
        }

        None
    }

    /// Forget which tips have fired; they may fire again.
    pub fn reset_session(&mut self) {
        self.triggered.clear();
    }

    pub fn triggered_count(&self) -> usize {
        self.triggered.len()
    }

    pub fn triggered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.triggered.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn restore_triggered(&mut self, ids: impl IntoIterator<Item = String>) {
        self.triggered.extend(ids);
    }

    pub fn mappings(&self) -> &[ContentMapping] {
        &self.mappings
    }

    pub fn set_mappings(&mut self, mappings: Vec<ContentMapping>) {
        self.mappings = mappings;
    }

    pub fn add_mapping(&mut self, mapping: ContentMapping) {
        self.mappings.push(mapping);
    }

    /// Remove a mapping by id; returns whether one was removed.
    pub fn remove_mapping(&mut self, id: &str) -> bool {
        let before = self.mappings.len();
        self.mappings.retain(|m| m.id != id);
        self.mappings.len() < before
    }
}
