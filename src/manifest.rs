// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Three-tier tool manifest.
//!
//! Tier 1 is the brief list (`get_manifest`): name, a short description
//! within a token budget, category and a few use cases. Tier 2 is the full
//! input schema with examples (`get_tool_schema`). Tier 3 is execution
//! itself. The tiers keep a client's working context small until it commits
//! to a tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token budget for a tier-1 brief.
pub const BRIEF_TOKEN_BUDGET: usize = 50;

/// Tier 1: one tool's brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBrief {
    pub name: String,
    pub brief: String,
    pub category: String,
    pub use_cases: Vec<String>,
}

/// An example invocation shown in tier 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExample {
    pub description: String,
    pub arguments: Value,
}

/// Complete description of one tool; tiers are projections of this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub brief: String,
    pub category: String,
    pub use_cases: Vec<String>,
    pub input_schema: Value,
    pub examples: Vec<ToolExample>,
}

impl ToolSpec {
    pub fn tier1(&self) -> ToolBrief {
        ToolBrief {
            name: self.name.clone(),
            brief: self.brief.clone(),
            category: self.category.clone(),
            use_cases: self.use_cases.clone(),
        }
    }
}

/// The registry's manifest view.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    specs: Vec<ToolSpec>,
}

impl Manifest {
    pub fn new(specs: Vec<ToolSpec>) -> Self {
        Self { specs }
    }

    /// Tier 1: all briefs.
    pub fn briefs(&self) -> Vec<ToolBrief> {
        self.specs.iter().map(ToolSpec::tier1).collect()
    }

    /// Tier 2: full schema and examples for one tool.
    pub fn schema(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Validate brief budgets at startup. Over-budget briefs are logged as
    /// warnings, never rejected.
    pub fn validate_briefs(&self) {
        for spec in &self.specs {
            let tokens = token_estimate(&spec.brief);
            if tokens > BRIEF_TOKEN_BUDGET {
                tracing::warn!(
                    tool = %spec.name,
                    tokens,
                    budget = BRIEF_TOKEN_BUDGET,
                    "tool brief exceeds its token budget"
                );
            }
            if spec.use_cases.len() < 2 || spec.use_cases.len() > 3 {
                tracing::warn!(
                    tool = %spec.name,
                    use_cases = spec.use_cases.len(),
                    "tool should list 2..3 use cases"
                );
            }
        }
    }
}

/// Whitespace-word token approximation, good enough for budget checks.
pub fn token_estimate(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, brief: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            brief: brief.to_string(),
            category: "query".to_string(),
            use_cases: vec!["first".to_string(), "second".to_string()],
            input_schema: json!({"type": "object"}),
            examples: vec![ToolExample {
                description: "basic".to_string(),
                arguments: json!({}),
            }],
        }
    }

    #[test]
    fn test_tier1_projection() {
        let manifest = Manifest::new(vec![spec("search", "Find chunks"), spec("ask", "Answer")]);
        let briefs = manifest.briefs();
        assert_eq!(briefs.len(), 2);
        assert_eq!(briefs[0].name, "search");
        assert_eq!(briefs[0].use_cases.len(), 2);
    }

    #[test]
    fn test_tier2_lookup() {
        let manifest = Manifest::new(vec![spec("search", "Find chunks")]);
        assert!(manifest.schema("search").is_some());
        assert!(manifest.schema("unknown").is_none());
        assert_eq!(manifest.schema("search").unwrap().examples.len(), 1);
    }

    #[test]
    fn test_token_estimate() {
        assert_eq!(token_estimate("three word brief"), 3);
        assert_eq!(token_estimate(""), 0);
    }

    #[test]
    fn test_validate_briefs_never_rejects() {
        let long_brief = "word ".repeat(BRIEF_TOKEN_BUDGET + 10);
        let manifest = Manifest::new(vec![spec("noisy", &long_brief)]);
        // logs a warning; the manifest stays intact
        manifest.validate_briefs();
        assert_eq!(manifest.len(), 1);
    }
}
