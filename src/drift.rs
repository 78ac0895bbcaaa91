//! Desired vs. actual comparison.
//!
//! The engine only reads: desired state comes from already-loaded domains,
//! actual state from the live config files through a [`ConfigParser`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use serde::Serialize;

use crate::config::Settings;
use crate::constants::CONFIG_EXTENSIONS;
use crate::error::Error;
use crate::model::{DomainConfig, Tech, tech};
use crate::parser::{ConfigParser, ParsedConfig};
use crate::render::UpstreamResolver;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDiff {
    pub resource_id: String,
    pub field: String,
    pub desired: String,
    pub actual: String,
    pub severity: Severity,
}

impl StateDiff {
    pub fn new(
        resource_id: impl Into<String>,
        field: impl Into<String>,
        desired: impl Into<String>,
        actual: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            field: field.into(),
            desired: desired.into(),
            actual: actual.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLookup {
    Found(PathBuf),
    Missing,
    /// Several files matched the prefix fallback.
    Ambiguous(Vec<PathBuf>),
}

/// Live config file for `domain` across the configured directories.
///
/// Exact `<domain>.<ext>` names always win. A prefix match is only tried in
/// dev mode without `strict_file_match`, and only for dot-less names.
pub fn find_config_file(settings: &Settings, domain: &str) -> ConfigLookup {
    for dir in &settings.conf_dirs {
        for ext in CONFIG_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", domain, ext));
            if candidate.is_file() {
                return ConfigLookup::Found(candidate);
            }
        }
    }

    if !settings.allows_fuzzy_file_match() || domain.contains('.') {
        return ConfigLookup::Missing;
    }

    let mut matches = Vec::new();
    for dir in &settings.conf_dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()) {
            let known_ext = path
                .extension()
                .is_some_and(|ext| CONFIG_EXTENSIONS.iter().any(|known| ext == *known));
            let prefixed = path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().starts_with(domain));
            if path.is_file() && known_ext && prefixed {
                matches.push(path);
            }
        }
    }
    matches.sort();

    match matches.len() {
        0 => ConfigLookup::Missing,
        1 => {
            let found = matches.remove(0);
            warn!("{}: no exact config file, using prefix match {}", domain, found.display());
            ConfigLookup::Found(found)
        }
        _ => ConfigLookup::Ambiguous(matches),
    }
}

/// Field-by-field comparison of one domain against its parsed config.
pub fn compare(domain: &DomainConfig, desired_tech: Option<&Tech>, actual: &ParsedConfig) -> Vec<StateDiff> {
    let id = domain.domain();
    let mut diffs = Vec::new();

    let desired_server = domain.server_type();
    if actual.server_type != Some(desired_server) {
        let found = actual
            .server_type
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        diffs.push(StateDiff::new(id, "server_web", desired_server.as_str(), found, Severity::Error));
    }

    if actual.meta.is_empty() {
        diffs.push(StateDiff::new(id, "meta", "present", "missing", Severity::Info));
        return diffs;
    }

    let mut check = |field: &str, desired: Option<&str>, severity: Severity| {
        let (Some(desired), Some(found)) = (desired, actual.meta_field(field)) else {
            return;
        };
        if !desired.trim().eq_ignore_ascii_case(found.trim()) {
            diffs.push(StateDiff::new(id, field, desired.trim(), found.trim(), severity));
        }
    };

    let environment = domain.environment().to_string();
    check("environment", Some(environment.as_str()), Severity::Warning);
    check("provider", Some(domain.provider()), Severity::Warning);
    check("server_web_version", domain.server_web().version.as_deref(), Severity::Warning);

    if let Some(desired) = desired_tech.map(tech::normalize) {
        check("tech", Some(desired.language.as_str()), Severity::Error);
        check("tech_version", Some(desired.version.as_str()), Severity::Warning);
        check("tech_provider", desired.provider.as_deref(), Severity::Warning);
        check("tech_manager", desired.manager.as_deref(), Severity::Warning);
    }
    diffs
}

/// Drift of a single domain. Never fails: lookup, parse and resolution
/// problems become diffs.
pub fn detect_domain_drift(
    settings: &Settings,
    parser: &dyn ConfigParser,
    domain: &DomainConfig,
    resolver: Option<&dyn UpstreamResolver>,
) -> Vec<StateDiff> {
    let id = domain.domain();
    let path = match find_config_file(settings, id) {
        ConfigLookup::Found(path) => path,
        ConfigLookup::Missing => {
            return vec![StateDiff::new(id, "config_file", "exists", "missing", Severity::Error)];
        }
        ConfigLookup::Ambiguous(paths) => {
            let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            return vec![StateDiff::new(
                id,
                "config_file",
                "exists",
                format!("ambiguous: {}", names.join(", ")),
                Severity::Error,
            )];
        }
    };
    debug!("{}: comparing against {}", id, path.display());

    let Some(actual) = parser.parse(&path) else {
        let error = Error::DriftComparison {
            resource: id.to_string(),
            path,
        };
        warn!("{}", error);
        return vec![StateDiff::new(id, "config_file", "valid", "invalid", Severity::Error)];
    };

    let mut diffs = Vec::new();
    let mut desired_tech = None;
    if let Some(route) = domain.primary_route() {
        let resolved = match resolver {
            Some(resolver) => resolver.resolve(&route.upstream_ref),
            None => Err(Error::unresolved_upstream(id, &route.upstream_ref)),
        };
        match resolved {
            Ok(upstream) => desired_tech = upstream.primary_tech().cloned(),
            Err(e) => {
                debug!("{}: {}", id, e);
                diffs.push(StateDiff::new(
                    id,
                    "upstream",
                    route.upstream_ref.as_str(),
                    "unresolved",
                    Severity::Info,
                ));
            }
        }
    }
    diffs.extend(compare(domain, desired_tech.as_ref(), &actual));
    diffs
}

/// Drift for every domain, in name order. Per-domain failures never stop
/// the run.
pub fn detect_drift(
    store: &Store,
    parser: &dyn ConfigParser,
    domains: &BTreeMap<String, DomainConfig>,
) -> Vec<StateDiff> {
    let mut diffs = Vec::new();
    for domain in domains.values() {
        let resolver = match store.resolver_for(domain) {
            Ok(resolver) => Some(resolver),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        let resolver = resolver.as_ref().map(|r| r as &dyn UpstreamResolver);
        diffs.extend(detect_domain_drift(store.settings(), parser, domain, resolver));
    }
    diffs
}

/// Concatenates diff lists, keeping the first diff per (resource, field).
pub fn merge_diffs(lists: &[Vec<StateDiff>]) -> Vec<StateDiff> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for diff in lists.iter().flatten() {
        if seen.insert((diff.resource_id.clone(), diff.field.clone())) {
            merged.push(diff.clone());
        }
    }
    merged
}
