//! Page analyzer
//!
//! Extracts structural SEO signals from the current page and derives an
//! issue/recommendation list. The derivation is a pure function of the
//! extracted structure: the same snapshot always yields the same
//! findings.

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::engine::{DomSnapshot, Heading, ImageRef};
use crate::error::Result;
use crate::session::BrowserSession;

/// A link with its resolved external flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub external: bool,
}

/// Structural SEO analysis of one page
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<Heading>,
    pub images: Vec<ImageRef>,
    pub links: Vec<Link>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Analyze the page the session is currently showing.
pub async fn analyze(session: &BrowserSession) -> Result<Analysis> {
    let snapshot = session.extract_document().await?;
    let url = session.current_url();

    debug!(session = %session.id(), url = %url, "analyzing page");

    Ok(build_analysis(snapshot, &url))
}

/// Assemble the analysis from an extracted snapshot and the page URL.
pub fn build_analysis(snapshot: DomSnapshot, page_url: &str) -> Analysis {
    let page_host = Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    let links = snapshot
        .links
        .into_iter()
        .map(|link| {
            let external = is_external(&link.href, page_host.as_deref());
            Link {
                href: link.href,
                text: link.text,
                external,
            }
        })
        .collect();

    let (issues, recommendations) = derive_findings(
        &snapshot.title,
        &snapshot.meta_description,
        &snapshot.headings,
        &snapshot.images,
    );

    Analysis {
        url: page_url.to_string(),
        title: snapshot.title,
        meta_description: snapshot.meta_description,
        headings: snapshot.headings,
        images: snapshot.images,
        links,
        issues,
        recommendations,
    }
}

/// A link is external iff it is an absolute http(s) URL whose host
/// differs from the page's host.
fn is_external(href: &str, page_host: Option<&str>) -> bool {
    let Ok(parsed) = Url::parse(href) else {
        // relative links stay on the page's host
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match (parsed.host_str(), page_host) {
        (Some(link_host), Some(page_host)) => !link_host.eq_ignore_ascii_case(page_host),
        (Some(_), None) => true,
        _ => false,
    }
}

/// Derive the fixed-rule issues and recommendations.
fn derive_findings(
    title: &str,
    meta_description: &str,
    headings: &[Heading],
    images: &[ImageRef],
) -> (Vec<String>, Vec<String>) {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if title.is_empty() {
        issues.push("Missing page title".to_string());
        recommendations.push("Add a descriptive page title (50-60 characters)".to_string());
    } else if title.chars().count() > 60 {
        issues.push("Page title too long".to_string());
        recommendations.push("Shorten page title to under 60 characters".to_string());
    }

    if meta_description.is_empty() {
        issues.push("Missing meta description".to_string());
        recommendations.push("Add a meta description (150-160 characters)".to_string());
    } else if meta_description.chars().count() > 160 {
        issues.push("Meta description too long".to_string());
        recommendations.push("Shorten meta description to under 160 characters".to_string());
    }

    let h1_count = headings.iter().filter(|h| h.level == 1).count();
    if h1_count == 0 {
        issues.push("Missing H1 heading".to_string());
        recommendations.push("Add an H1 heading to the page".to_string());
    } else if h1_count > 1 {
        issues.push("Multiple H1 headings".to_string());
        recommendations.push("Use only one H1 heading per page".to_string());
    }

    let images_without_alt = images.iter().filter(|img| img.alt.is_empty()).count();
    if images_without_alt > 0 {
        issues.push(format!("{} images missing alt text", images_without_alt));
        recommendations.push("Add descriptive alt text to all images".to_string());
    }

    (issues, recommendations)
}
