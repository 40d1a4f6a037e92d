//! Reusable listing support for managers backed by an OData/NuGet-style feed
//!
//! Search queries every configured source over HTTP, keeps the highest
//! version per package id per source and continues past sources that fail.

use crate::core::types::{Package, format_as_name, version_as_float};
use crate::error::Result;
use crate::managers::traits::ManagerContext;
use crate::process::LoggableTaskType;
use crate::process::logger::{SharedNativeLog, lock};
use crate::sources::ManagerSource;
use crate::utils::regex_cache::get_cached_regex;
use crate::utils::remote::{fetch_url, http_client};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;

const ENTRY_PATTERN: &str = r"<entry>([\s\S]*?)</entry>";
const ID_PATTERN: &str = r"Id='([^<>']+)'";
const VERSION_PATTERN: &str = r"Version='([^<>']+)'";

pub fn search_url(source_url: &str, query: &str) -> String {
    format!(
        "{}/Search()?searchTerm=%27{}%27&targetFramework=%27%27&includePrerelease=false",
        source_url.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

pub fn versions_url(source_url: &str, id: &str) -> String {
    format!(
        "{}/FindPackagesById()?id='{}'",
        source_url.trim_end_matches('/'),
        urlencoding::encode(id)
    )
}

/// `(id, version)` pairs from a search response, keeping the highest version
/// per id in order of first appearance. Entries without an id are skipped.
pub fn parse_search_entries(body: &str) -> Result<Vec<(String, String)>> {
    let entry_re = get_cached_regex(ENTRY_PATTERN)?;
    let id_re = get_cached_regex(ID_PATTERN)?;
    let version_re = get_cached_regex(VERSION_PATTERN)?;

    let mut found: Vec<(String, String, f64)> = Vec::new();
    for entry in entry_re.find_iter(body) {
        let text = entry.as_str();
        let Some(id) = id_re.captures(text).map(|c| c[1].to_string()) else {
            continue;
        };
        let version = version_re
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let float = version_as_float(&version);

        match found.iter_mut().find(|(existing, _, _)| *existing == id) {
            Some(slot) if slot.2 >= float => {}
            Some(slot) => {
                slot.1 = version;
                slot.2 = float;
            }
            None => found.push((id, version, float)),
        }
    }
    Ok(found.into_iter().map(|(id, v, _)| (id, v)).collect())
}

/// Distinct versions from a `FindPackagesById()` response, newest first
pub fn parse_versions(body: &str) -> Result<Vec<String>> {
    let version_re = get_cached_regex(VERSION_PATTERN)?;
    let mut seen = HashSet::new();
    let mut versions: Vec<String> = version_re
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .filter(|v| seen.insert(v.clone()))
        .collect();
    versions.sort_by(|a, b| version_components(b).cmp(&version_components(a)).then_with(|| b.cmp(a)));
    Ok(versions)
}

/// Numeric components of a version string, for ordering
fn version_components(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// True when `candidate` orders after `current` component by component
pub fn is_newer_version(candidate: &str, current: &str) -> bool {
    version_components(candidate) > version_components(current)
}

#[derive(Debug, Clone)]
pub struct FeedListingProvider {
    client: Client,
}

impl FeedListingProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }

    /// Sources to query: every real configured source when the manager
    /// supports custom sources, otherwise the default one
    fn search_sources(&self, ctx: &ManagerContext) -> Vec<Arc<ManagerSource>> {
        if ctx.capabilities.supports_custom_sources {
            let sources: Vec<_> = ctx
                .sources
                .list_all()
                .into_iter()
                .filter(|s| !s.is_placeholder())
                .collect();
            if !sources.is_empty() {
                return sources;
            }
        }
        vec![ctx.default_source()]
    }

    pub async fn search(&self, ctx: &ManagerContext, query: &str) -> Result<Vec<Package>> {
        let task_log = ctx.logger().create_native(LoggableTaskType::FindPackages);
        let mut packages = Vec::new();

        for source in self.search_sources(ctx) {
            let url = search_url(&source.url(), query);
            note(&task_log, format!("Begin package search with url={} on manager {}", url, ctx.name()));

            let body = match fetch_url(&self.client, &url).await {
                Ok(body) => body,
                Err(e) => {
                    note_error(&task_log, format!("Failed to fetch api at Url={}: {}", url, e));
                    continue;
                }
            };

            for (id, version) in parse_search_entries(&body)? {
                note(
                    &task_log,
                    format!("Found package {} version {} on source {}", id, version, source.name),
                );
                packages.push(Package::new(
                    format_as_name(&id),
                    id,
                    version,
                    source.name.clone(),
                    ctx.name(),
                ));
            }
        }

        let _ = lock(&task_log).close(0);
        Ok(packages)
    }

    pub async fn package_versions(&self, ctx: &ManagerContext, package: &Package) -> Result<Vec<String>> {
        let source = ctx.source_or_default(&package.source);
        let url = versions_url(&source.url(), &package.id);
        log::debug!("Begin package version search with url={} on manager {}", url, ctx.name());

        match fetch_url(&self.client, &url).await {
            Ok(body) => parse_versions(&body),
            Err(e) => {
                log::warn!("Failed to load versions of {}: {}", package.id, e);
                Ok(Vec::new())
            }
        }
    }
}

fn note(task_log: &SharedNativeLog, text: String) {
    let _ = lock(task_log).log(&text);
}

fn note_error(task_log: &SharedNativeLog, text: String) {
    let _ = lock(task_log).error(&text);
}
