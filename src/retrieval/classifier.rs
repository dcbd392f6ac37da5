// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Query intent classification.
//!
//! Pure regex matching: a query maps to an intent, a confidence derived
//! from pattern specificity, and the retrieval hints that intent implies.
//! No match defaults to `Explanation`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What kind of answer the query is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Enumeration,
    Explanation,
    CodeSearch,
    Comparison,
    Factual,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enumeration => "enumeration",
            Self::Explanation => "explanation",
            Self::CodeSearch => "code_search",
            Self::Comparison => "comparison",
            Self::Factual => "factual",
        }
    }
}

/// Retrieval knobs implied by an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHints {
    /// Pull in all chunks sharing a matched chunk's `(file_path, section)`.
    pub expand_sections: bool,
    /// Merge contiguous chunks when assembling the answer.
    pub merge_contiguous: bool,
    /// Restrict retrieval to `content_type = code`.
    pub restrict_code: bool,
    /// Candidates per retrieval leg.
    pub top_k: usize,
    /// Order enumeration output by section then numeric prefix.
    pub order_by_numeric: bool,
    /// Comparison operands, one subquery each.
    pub operands: Option<(String, String)>,
}

impl RetrievalHints {
    fn for_intent(intent: QueryIntent, default_top_k: usize) -> Self {
        match intent {
            QueryIntent::Enumeration => Self {
                expand_sections: true,
                merge_contiguous: false,
                restrict_code: false,
                top_k: 30,
                order_by_numeric: true,
                operands: None,
            },
            QueryIntent::Explanation => Self {
                expand_sections: true,
                merge_contiguous: true,
                restrict_code: false,
                top_k: default_top_k,
                order_by_numeric: false,
                operands: None,
            },
            QueryIntent::CodeSearch => Self {
                expand_sections: false,
                merge_contiguous: false,
                restrict_code: true,
                top_k: default_top_k,
                order_by_numeric: false,
                operands: None,
            },
            QueryIntent::Comparison => Self {
                expand_sections: true,
                merge_contiguous: true,
                restrict_code: false,
                top_k: default_top_k,
                order_by_numeric: false,
                operands: None,
            },
            QueryIntent::Factual => Self {
                expand_sections: false,
                merge_contiguous: false,
                restrict_code: false,
                top_k: 5,
                order_by_numeric: false,
                operands: None,
            },
        }
    }
}

/// Classification result.
#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: QueryIntent,
    pub confidence: f32,
    pub hints: RetrievalHints,
}

static COMPARISON_BETWEEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdifference(?:s)?\s+between\s+(.+?)\s+and\s+(.+?)\s*\??$").unwrap()
});
static COMPARISON_VS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:compare\s+)?(.+?)\s+vs\.?\s+(.+?)\s*\??$").unwrap());
static CODE_SEARCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bfind\s+(?:the\s+)?(?:function|method|class)\b|\bshow\s+(?:me\s+)?(?:the\s+)?code\b|\bimplementation\s+of\b|\bwhere\s+is\s+\w+\s+(?:defined|implemented)\b",
    )
    .unwrap()
});
static BACKTICK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
static ENUMERATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blist\s+(?:all|the|every)\b|\bhow\s+many\b|\bwhat\s+are\s+the\s+\d+\b|\benumerate\b|\bname\s+all\b")
        .unwrap()
});
static FACTUAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bwhat\s+is\s+the\s+default\b|\bwhich\s+port\b|\bwhat\s+port\b|\bdefault\s+value\s+of\b|\bwhat\s+version\b")
        .unwrap()
});
static EXPLANATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhow\s+does\b|\bhow\s+do\b|\bexplain\b|\bwhy\b|\bwalk\s+me\s+through\b").unwrap());

/// Classify a query. Pure and side-effect free.
pub fn classify(query: &str, default_top_k: usize) -> Classification {
    let trimmed = query.trim();

    if let Some(caps) = COMPARISON_BETWEEN_RE.captures(trimmed) {
        let mut hints = RetrievalHints::for_intent(QueryIntent::Comparison, default_top_k);
        hints.operands = Some((caps[1].trim().to_string(), caps[2].trim().to_string()));
        return Classification {
            intent: QueryIntent::Comparison,
            confidence: 0.9,
            hints,
        };
    }
    if let Some(caps) = COMPARISON_VS_RE.captures(trimmed) {
        let mut hints = RetrievalHints::for_intent(QueryIntent::Comparison, default_top_k);
        hints.operands = Some((caps[1].trim().to_string(), caps[2].trim().to_string()));
        return Classification {
            intent: QueryIntent::Comparison,
            confidence: 0.8,
            hints,
        };
    }

    if CODE_SEARCH_RE.is_match(trimmed) || BACKTICK_RE.is_match(trimmed) {
        let confidence = if CODE_SEARCH_RE.is_match(trimmed) {
            0.85
        } else {
            0.7
        };
        return Classification {
            intent: QueryIntent::CodeSearch,
            confidence,
            hints: RetrievalHints::for_intent(QueryIntent::CodeSearch, default_top_k),
        };
    }

    if ENUMERATION_RE.is_match(trimmed) {
        return Classification {
            intent: QueryIntent::Enumeration,
            confidence: 0.85,
            hints: RetrievalHints::for_intent(QueryIntent::Enumeration, default_top_k),
        };
    }

    if FACTUAL_RE.is_match(trimmed) {
        return Classification {
            intent: QueryIntent::Factual,
            confidence: 0.8,
            hints: RetrievalHints::for_intent(QueryIntent::Factual, default_top_k),
        };
    }

    if EXPLANATION_RE.is_match(trimmed) {
        return Classification {
            intent: QueryIntent::Explanation,
            confidence: 0.7,
            hints: RetrievalHints::for_intent(QueryIntent::Explanation, default_top_k),
        };
    }

    Classification {
        intent: QueryIntent::Explanation,
        confidence: 0.3,
        hints: RetrievalHints::for_intent(QueryIntent::Explanation, default_top_k),
    }
}

/// Hints with the intent forced, as `explain` requires.
pub fn forced(intent: QueryIntent, default_top_k: usize) -> Classification {
    Classification {
        intent,
        confidence: 1.0,
        hints: RetrievalHints::for_intent(intent, default_top_k),
    }
}
