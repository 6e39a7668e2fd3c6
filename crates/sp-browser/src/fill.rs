//! Field-fill matcher
//!
//! Maps semantic field names ("Name", "Email", ...) onto page inputs
//! through a static alias table with ordered selector strategies.
//! Best-effort by design: a key that matches nothing is reported as
//! unfilled, never an error.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::session::BrowserSession;

/// One alias-to-selectors mapping rule
pub struct FieldRule {
    /// Semantic key aliases, matched case-insensitively in both
    /// directions (rule alias contains key, or key contains alias)
    pub aliases: &'static [&'static str],
    /// Selector strategies, tried in declared order
    pub selectors: &'static [&'static str],
}

/// The static rule table, loaded once at startup.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        aliases: &["customer name", "full name", "name"],
        selectors: &[
            "input[name*=\"name\"]",
            "input[id*=\"name\"]",
            "input[placeholder*=\"name\"]",
            "input[type=\"text\"]",
        ],
    },
    FieldRule {
        aliases: &["email"],
        selectors: &[
            "input[name*=\"email\"]",
            "input[id*=\"email\"]",
            "input[type=\"email\"]",
            "input[placeholder*=\"email\"]",
        ],
    },
    FieldRule {
        aliases: &["phone"],
        selectors: &[
            "input[name*=\"phone\"]",
            "input[id*=\"phone\"]",
            "input[type=\"tel\"]",
            "input[placeholder*=\"phone\"]",
        ],
    },
    FieldRule {
        aliases: &["company"],
        selectors: &[
            "input[name*=\"company\"]",
            "input[id*=\"company\"]",
            "input[placeholder*=\"company\"]",
        ],
    },
    FieldRule {
        aliases: &["comment", "message"],
        selectors: &[
            "textarea",
            "input[name*=\"comment\"]",
            "input[name*=\"message\"]",
            "input[id*=\"comment\"]",
            "input[id*=\"message\"]",
        ],
    },
];

/// Find the rule for a semantic key, if any.
pub fn match_rule(key: &str) -> Option<&'static FieldRule> {
    let key = key.to_lowercase();
    FIELD_RULES.iter().find(|rule| {
        rule.aliases
            .iter()
            .any(|alias| alias.contains(&key) || key.contains(alias))
    })
}

/// Outcome of one form-fill operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct FillReport {
    pub filled: Vec<String>,
    pub unfilled: Vec<String>,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }

    /// One-line human summary of the outcome
    pub fn summary(&self) -> String {
        if self.filled.is_empty() && self.unfilled.is_empty() {
            return "No fields to fill.".to_string();
        }
        if self.is_complete() {
            return format!("Filled all {} fields: {}.", self.filled.len(), self.filled.join(", "));
        }
        if self.filled.is_empty() {
            return format!(
                "I couldn't find matching inputs for: {}.",
                self.unfilled.join(", ")
            );
        }
        format!(
            "Filled {} ({}), but couldn't find matching inputs for: {}.",
            self.filled.len(),
            self.filled.join(", "),
            self.unfilled.join(", ")
        )
    }
}

/// Fill the given semantic fields on the session's current page.
///
/// Keys are processed in sorted order; each key tries its rule's
/// selector strategies until one yields a visible, empty element.
/// Individual misses and engine hiccups only mark the key unfilled.
pub async fn fill_fields(
    session: &BrowserSession,
    fields: &BTreeMap<String, String>,
) -> FillReport {
    let mut report = FillReport::default();

    for (key, value) in fields {
        if value.is_empty() {
            continue;
        }

        let Some(rule) = match_rule(key) else {
            debug!(session = %session.id(), key = %key, "no mapping rule for field");
            report.unfilled.push(key.clone());
            continue;
        };

        let mut filled = false;
        for selector in rule.selectors {
            match session.fill_field(selector, value).await {
                Ok(true) => {
                    debug!(session = %session.id(), key = %key, selector = %selector, "field filled");
                    filled = true;
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    warn!(session = %session.id(), key = %key, selector = %selector,
                          "fill attempt failed: {}", e);
                    continue;
                }
            }
        }

        if filled {
            report.filled.push(key.clone());
        } else {
            report.unfilled.push(key.clone());
        }
    }

    // let dynamic pages react before the caller takes a screenshot
    tokio::time::sleep(session.config().form_settle).await;

    report
}
