//! Nearest compatible target framework lookup.
//!
//! A manifest declares dependency groups per target framework. Only the
//! group whose framework is nearest to the consumer's target (plus groups
//! without a framework) are expanded. Two implementations exist:
//!
//! - [`FrameworkService`] asks the NuGet tools web service and scrapes its
//!   HTML answer.
//! - [`ExactFrameworkMatch`] matches framework names locally after folding
//!   short and long framework monikers to one spelling.

use async_trait::async_trait;
use nuget_core::{HttpCache, MemoCache};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Default endpoint of the nearest-framework web service.
pub const DEFAULT_FRAMEWORK_SERVICE_URL: &str =
    "https://nugettools.azurewebsites.net/6.0.0/get-nearest-framework";

/// Finds the candidate framework nearest to a target framework.
#[async_trait]
pub trait FrameworkCompatibility: Send + Sync {
    /// Returns the candidate (as spelled in `candidates`) nearest to
    /// `target`, or `None` when no candidate is compatible.
    ///
    /// Lookup failures also yield `None`.
    async fn nearest(&self, target: &str, candidates: &[String]) -> Option<String>;
}

/// Framework lookup backed by the NuGet tools web service.
pub struct FrameworkService {
    cache: Arc<HttpCache>,
    url: String,
    memo: MemoCache<String, Option<String>>,
}

impl FrameworkService {
    pub fn new(cache: Arc<HttpCache>, url: impl Into<String>) -> Self {
        Self {
            cache,
            url: url.into(),
            memo: MemoCache::new(),
        }
    }

    fn query_url(&self, target: &str, candidates: &[String]) -> String {
        format!(
            "{}?project={}&package={}",
            self.url,
            urlencoding::encode(target),
            urlencoding::encode(&candidates.join("\n"))
        )
    }

    async fn lookup(&self, target: &str, candidates: &[String]) -> Option<String> {
        let url = self.query_url(target, candidates);
        let body = match self.cache.get_cached(&url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("framework lookup for '{}' failed: {}", target, e);
                return None;
            }
        };

        let html = String::from_utf8_lossy(&body);
        let Some(found) = scrape_nearest(&html) else {
            tracing::debug!("no framework among {:?} is compatible with '{}'", candidates, target);
            return None;
        };

        let wanted = canonical_moniker(&found);
        let matched = candidates
            .iter()
            .find(|candidate| canonical_moniker(candidate) == wanted)
            .cloned();

        if matched.is_none() {
            tracing::debug!(
                "nearest framework '{}' for '{}' matches none of {:?}",
                found,
                target,
                candidates
            );
        }
        matched
    }
}

#[async_trait]
impl FrameworkCompatibility for FrameworkService {
    async fn nearest(&self, target: &str, candidates: &[String]) -> Option<String> {
        let key = format!("{}|{}", target, candidates.join("|"));
        self.memo
            .get_or_init(key, || self.lookup(target, candidates))
            .await
    }
}

/// Extracts the framework name from the service's result element.
///
/// The success alert reads e.g. `The nearest framework is netstandard2.0
/// (.NETStandard,Version=v2.0)`; an alert starting with `None` means no match.
fn scrape_nearest(html: &str) -> Option<String> {
    static RESULT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?s)<div[^>]*class="[^"]*alert-success[^"]*"[^>]*>(.*?)</div>"#)
            .expect("valid regex")
    });
    static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    static PARENTHESIZED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\(([^)]+)\)").expect("valid regex"));

    let inner = RESULT.captures(html)?.get(1)?.as_str();
    let text = TAG.replace_all(inner, " ");
    let text = text.trim();
    if text.starts_with("None") {
        return None;
    }

    PARENTHESIZED
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|framework| !framework.is_empty())
}

/// Folds `.NETStandard,Version=v2.0` and `.NETStandard2.0` to one key.
fn framework_key(framework: &str) -> String {
    framework
        .to_ascii_lowercase()
        .replace(",version=v", "")
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect()
}

/// Local framework matching without network access.
///
/// A candidate matches when it names the same framework as the target,
/// whether written as a short moniker (`net472`, `netstandard2.0`) or a long
/// one (`.NETFramework4.7.2`, `.NETStandard,Version=v2.0`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactFrameworkMatch;

#[async_trait]
impl FrameworkCompatibility for ExactFrameworkMatch {
    async fn nearest(&self, target: &str, candidates: &[String]) -> Option<String> {
        let wanted = canonical_moniker(target);
        candidates
            .iter()
            .find(|candidate| canonical_moniker(candidate) == wanted)
            .cloned()
    }
}

fn canonical_moniker(framework: &str) -> String {
    let key = framework_key(framework);
    let key = key.trim_start_matches('.');

    if let Some(version) = key.strip_prefix("netframework") {
        return format!("netframework{}", version);
    }
    if key.starts_with("netstandard") || key.starts_with("netcoreapp") {
        return key.to_string();
    }
    if let Some(version) = key.strip_prefix("net") {
        // net45, net472: compact .NET Framework versions
        if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
            let dotted: Vec<String> = version.chars().map(String::from).collect();
            return format!("netframework{}", dotted.join("."));
        }
        // net5.0 and later are .NET Core releases
        if let Some((major, _)) = version.split_once('.')
            && major.parse::<u32>().is_ok_and(|major| major >= 5)
        {
            return format!("netcoreapp{}", version);
        }
    }
    key.to_string()
}
