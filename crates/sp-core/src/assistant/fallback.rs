//! Deterministic offline fallbacks
//!
//! Keyword-substring intent matching and canned replies, used whenever
//! the LLM collaborator is unconfigured or unreachable.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use super::{Intent, IntentKind};

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://)?(?:[a-z0-9][a-z0-9-]*\.)+[a-z]{2,}(?:/[^\s]*)?")
        .expect("url pattern is valid")
});

/// Pull the first URL-looking token out of a message.
pub fn extract_url(text: &str) -> Option<String> {
    URL_PATTERN
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', '!', '?']).to_string())
}

/// Keyword-substring intent classification.
pub fn classify(text: &str) -> Intent {
    let lower = text.to_lowercase();
    let url = extract_url(text);

    let contains_any =
        |needles: &[&str]| -> bool { needles.iter().any(|needle| lower.contains(needle)) };

    if contains_any(&["analyze", "analysis", "seo", "audit"]) {
        let extracted = match url {
            Some(u) => json!({ "url": u }),
            None => Value::Null,
        };
        return Intent {
            kind: IntentKind::Analyze,
            confidence: 0.75,
            extracted,
        };
    }

    if contains_any(&["fill", "form"]) {
        return Intent {
            kind: IntentKind::FormFill,
            confidence: 0.75,
            extracted: Value::Null,
        };
    }

    if contains_any(&["competitor", "research"]) {
        return Intent {
            kind: IntentKind::Research,
            confidence: 0.75,
            extracted: Value::Null,
        };
    }

    if contains_any(&["go to", "navigate", "visit", "open "]) || url.is_some() {
        let confidence = if url.is_some() { 0.9 } else { 0.6 };
        let extracted = match url {
            Some(u) => json!({ "url": u }),
            None => Value::Null,
        };
        return Intent {
            kind: IntentKind::Navigate,
            confidence,
            extracted,
        };
    }

    Intent::general()
}

/// Canned reply for a message, keyed off the same keyword matching.
pub fn reply(text: &str, current_url: Option<&str>) -> String {
    let lower = text.to_lowercase();

    if lower.contains("analyze") || lower.contains("seo") || lower.contains("audit") {
        let target = match current_url {
            Some(url) if url != "about:blank" => {
                format!("I can analyze the page that is open right now: {}.", url)
            }
            _ => "Navigate to a website first, or tell me its address, and I'll analyze it."
                .to_string(),
        };
        return format!(
            "I'll check the page for the SEO basics: the title and meta description, \
             the heading structure, image alt text and the links on the page. {}",
            target
        );
    }

    if lower.contains("fill") || lower.contains("form") {
        return "I can fill out forms for you - contact forms, directory listings and \
                similar. Open the page with the form, then give me the details to enter \
                (for example the name, email and phone number) and I'll match them to \
                the right fields."
            .to_string();
    }

    if lower.contains("competitor") || lower.contains("research") {
        return "I can help you research competitors: we can open their sites, look at \
                how their pages are set up and compare that with yours. Tell me which \
                competitor website to start with."
            .to_string();
    }

    if lower.contains("go to") || lower.contains("navigate") || lower.contains("visit") {
        return "I'll open that website in the browser and show you a screenshot of \
                what I find. From there we can analyze it or click around."
            .to_string();
    }

    format!(
        "I understand you want help with: \"{}\". I can open and analyze websites for \
         SEO, fill out forms, and research competitors - tell me which of those to do, \
         or give me a website address to start with.",
        text
    )
}

/// Deterministic analysis report rendered from the rule-derived findings.
pub fn report(issues: &[String], recommendations: &[String]) -> String {
    let mut out = String::from("SEO Analysis Report\n\n");

    if issues.is_empty() {
        out.push_str("No issues found - the SEO basics on this page look good.\n");
    } else {
        out.push_str("Issues found:\n");
        for issue in issues {
            out.push_str(&format!("- {}\n", issue));
        }
    }

    if !recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for rec in recommendations {
            out.push_str(&format!("- {}\n", rec));
        }
    }

    out.push_str("\nNext step: fix the highest-impact items first, then run the analysis again.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("go to example.com").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            extract_url("visit https://foo.bar/baz?q=1 please").as_deref(),
            Some("https://foo.bar/baz?q=1")
        );
        assert_eq!(extract_url("open shop.example.co.uk.").as_deref(), Some("shop.example.co.uk"));
        assert_eq!(extract_url("how do I improve rankings"), None);
    }

    #[test]
    fn test_classify_navigate_with_url() {
        let intent = classify("go to example.com");
        assert_eq!(intent.kind, IntentKind::Navigate);
        assert!(intent.confidence > 0.8);
        assert_eq!(intent.url().as_deref(), Some("example.com"));
    }

    #[test]
    fn test_classify_analyze_beats_navigate() {
        let intent = classify("analyze example.com for seo");
        assert_eq!(intent.kind, IntentKind::Analyze);
        assert_eq!(intent.url().as_deref(), Some("example.com"));
    }

    #[test]
    fn test_classify_form_fill() {
        assert_eq!(classify("fill out this form").kind, IntentKind::FormFill);
    }

    #[test]
    fn test_classify_research() {
        assert_eq!(
            classify("research my competitors").kind,
            IntentKind::Research
        );
    }

    #[test]
    fn test_classify_general() {
        let intent = classify("how do I improve my rankings?");
        assert_eq!(intent.kind, IntentKind::General);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let first = classify("go to example.com");
        let second = classify("go to example.com");
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.extracted, second.extracted);
    }

    #[test]
    fn test_report_with_findings() {
        let issues = vec!["Missing page title".to_string()];
        let recs = vec!["Add a descriptive page title (50-60 characters)".to_string()];
        let rendered = report(&issues, &recs);
        assert!(rendered.contains("Missing page title"));
        assert!(rendered.contains("Add a descriptive page title"));
    }

    #[test]
    fn test_report_clean_page() {
        let rendered = report(&[], &[]);
        assert!(rendered.contains("No issues found"));
    }
}
