//! Provider catalog and the fixed directory convention.
//!
//! ```text
//! <root>/providers/<provider>/servers/<server>/<env>/sites/<domain>.yaml
//! <root>/providers/<provider>/servers/<server>/<env>/upstreams/<ref>.yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use crate::config::Settings;
use crate::constants::{DOCUMENT_EXT, PROVIDER_CATALOG, PROVIDERS_DIR, SERVERS_DIR, SITES_DIR, UPSTREAMS_DIR};
use crate::error::{Error, Result};
use crate::model::{DomainConfig, Environment, ServerType, ServiceType, normalize_slug};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// `*.<suffix>` domains belong to this provider.
    #[serde(default, alias = "domain")]
    pub domain_suffix: Option<String>,
    /// Internal short name (e.g. an org acronym) used in older metadata.
    #[serde(default, alias = "namespace")]
    pub internal_namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default, alias = "provider_list")]
    providers: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    /// Matched a catalog entry by domain suffix, id or namespace.
    Catalog,
    /// No catalog: second-level label of the domain.
    DomainLabel,
    /// Nothing matched: the alias, lowercased.
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderId {
    pub id: String,
    pub source: ProviderSource,
}

impl ProviderId {
    pub fn is_guess(&self) -> bool {
        self.source != ProviderSource::Catalog
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    entries: Vec<ProviderEntry>,
}

impl ProviderCatalog {
    pub fn from_entries(entries: Vec<ProviderEntry>) -> Self {
        Self { entries }
    }

    /// Loads `<root>/catalog/providers.yaml`. No file means an empty catalog.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PROVIDER_CATALOG);
        if !path.exists() {
            debug!("No provider catalog at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io("provider catalog", "read", &path, e))?;
        let file: CatalogFile = serde_yaml::from_str(&content).map_err(|source| Error::Document {
            path: path.clone(),
            source,
        })?;
        Ok(Self { entries: file.providers })
    }

    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-effort canonical provider id for an alias and optional domain.
    ///
    /// Never fails: the `source` of the result says whether the id came from
    /// the catalog or was guessed.
    pub fn resolve_provider_id(&self, alias: &str, domain: Option<&str>) -> ProviderId {
        let found = |id: &str| ProviderId {
            id: id.trim().to_string(),
            source: ProviderSource::Catalog,
        };

        if let Some(domain) = domain {
            let domain = domain.trim().to_lowercase();
            for entry in &self.entries {
                let Some(suffix) = entry.domain_suffix.as_deref() else {
                    continue;
                };
                let suffix = suffix.trim().to_lowercase();
                if !suffix.is_empty() && (domain == suffix || domain.ends_with(&format!(".{}", suffix))) {
                    return found(&entry.id);
                }
            }
        }

        let wanted = alias.trim().to_uppercase();
        for entry in &self.entries {
            let namespace = entry.internal_namespace.as_deref().unwrap_or("").trim().to_uppercase();
            if (!namespace.is_empty() && namespace == wanted) || entry.id.trim().to_uppercase() == wanted {
                return found(&entry.id);
            }
        }

        if self.entries.is_empty() {
            if let Some(label) = domain.and_then(second_level_label) {
                return ProviderId {
                    id: label,
                    source: ProviderSource::DomainLabel,
                };
            }
        }

        ProviderId {
            id: alias.trim().to_lowercase(),
            source: ProviderSource::Alias,
        }
    }
}

fn second_level_label(domain: &str) -> Option<String> {
    let parts: Vec<&str> = domain.trim().split('.').filter(|p| !p.is_empty()).collect();
    (parts.len() >= 2).then(|| parts[parts.len() - 2].to_lowercase())
}

/// Canonical provider id honouring the strictness of `settings`.
///
/// Outside dev mode a guessed id is only accepted when a provider tree with
/// that name already exists under the root.
pub fn resolve_provider(
    settings: &Settings,
    catalog: &ProviderCatalog,
    resource: &str,
    alias: &str,
    domain: Option<&str>,
) -> Result<String> {
    let resolved = catalog.resolve_provider_id(alias, domain);
    if !resolved.is_guess() {
        return Ok(resolved.id);
    }
    if resolved.id.is_empty() {
        return Err(Error::unresolved_provider(resource, alias));
    }
    if settings.dev_mode {
        warn!(
            "{}: provider `{}` not in catalog, guessed `{}` ({:?})",
            resource, alias, resolved.id, resolved.source
        );
        return Ok(resolved.id);
    }
    if settings.root.join(PROVIDERS_DIR).join(&resolved.id).is_dir() {
        return Ok(resolved.id);
    }
    Err(Error::unresolved_provider(resource, alias))
}

/// `{service_type}__{slug}`, slug lowercased with hyphens as underscores.
pub fn expected_upstream_ref(service_type: ServiceType, slug: &str) -> String {
    format!("{}__{}", service_type.as_str(), normalize_slug(slug))
}

/// A provider/server/environment triple: the unit documents are grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub provider: String,
    pub server: ServerType,
    pub environment: Environment,
}

impl Scope {
    pub fn new(provider: impl Into<String>, server: ServerType, environment: Environment) -> Self {
        Self {
            provider: provider.into().trim().to_lowercase(),
            server,
            environment,
        }
    }

    /// Scope of a site, with its provider already canonicalised.
    pub fn for_domain(domain: &DomainConfig, provider_id: &str) -> Self {
        Self::new(provider_id, domain.server_type(), domain.environment())
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(PROVIDERS_DIR)
            .join(&self.provider)
            .join(SERVERS_DIR)
            .join(self.server.as_str())
            .join(self.environment.as_str())
    }

    pub fn sites_dir(&self, root: &Path) -> PathBuf {
        self.dir(root).join(SITES_DIR)
    }

    pub fn upstreams_dir(&self, root: &Path) -> PathBuf {
        self.dir(root).join(UPSTREAMS_DIR)
    }

    pub fn site_path(&self, root: &Path, domain: &str) -> PathBuf {
        self.sites_dir(root).join(format!("{}.{}", domain, DOCUMENT_EXT))
    }

    pub fn upstream_path(&self, root: &Path, reference: &str) -> PathBuf {
        let reference = reference.trim();
        let reference = reference
            .strip_suffix(&format!(".{}", DOCUMENT_EXT))
            .unwrap_or(reference);
        self.upstreams_dir(root).join(format!("{}.{}", reference, DOCUMENT_EXT))
    }
}

/// Document stems in `dir` with the document extension, sorted.
pub(crate) fn document_stems(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir.display().to_string(), "list", dir, e))?;
    let mut stems: Vec<String> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == DOCUMENT_EXT))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    stems.sort();
    Ok(stems)
}

pub fn list_upstream_refs(root: &Path, scope: &Scope) -> Result<Vec<String>> {
    document_stems(&scope.upstreams_dir(root))
}

/// Every scope that exists on disk under `root`, sorted.
pub fn scopes(root: &Path) -> Vec<Scope> {
    let mut found = Vec::new();
    for provider in subdirs(&root.join(PROVIDERS_DIR)) {
        let provider_name = dir_name(&provider);
        for server in subdirs(&provider.join(SERVERS_DIR)) {
            let Ok(server_type) = dir_name(&server).parse::<ServerType>() else {
                debug!("Skipping unknown server directory {}", server.display());
                continue;
            };
            for env in subdirs(&server) {
                let Ok(environment) = dir_name(&env).parse::<Environment>() else {
                    debug!("Skipping unknown environment directory {}", env.display());
                    continue;
                };
                found.push(Scope::new(provider_name.clone(), server_type, environment));
            }
        }
    }
    found.sort();
    found
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn dir_name(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Locates `sites/<domain>.yaml` in any scope.
pub fn find_site(root: &Path, domain: &str) -> Option<(PathBuf, Scope)> {
    site_locations(root, domain).into_iter().next()
}

/// Every scope holding a document for `domain`. More than one means a stale
/// copy was left behind.
pub fn site_locations(root: &Path, domain: &str) -> Vec<(PathBuf, Scope)> {
    scopes(root)
        .into_iter()
        .filter_map(|scope| {
            let path = scope.site_path(root, domain);
            path.is_file().then_some((path, scope))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery<'a> {
    /// Provider id or alias.
    pub provider: &'a str,
    pub server: ServerType,
    pub environment: Environment,
    pub service_type: ServiceType,
    pub slug: &'a str,
    /// Domain the upstream is wanted for, used to resolve the provider.
    pub domain: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamMatch {
    /// A document with the conventional name exists.
    Exact { reference: String, path: PathBuf },
    /// No conventional name, but these upstreams exist in the same scope.
    Candidates(Vec<String>),
    NotFound { expected: String },
}

/// Finds the upstream a route should use by naming convention.
pub fn resolve_upstream_by_convention(
    settings: &Settings,
    catalog: &ProviderCatalog,
    query: &UpstreamQuery<'_>,
) -> Result<UpstreamMatch> {
    let resource = query.domain.unwrap_or(query.slug);
    let provider = resolve_provider(settings, catalog, resource, query.provider, query.domain)?;
    let scope = Scope::new(provider, query.server, query.environment);
    let expected = expected_upstream_ref(query.service_type, query.slug);

    let path = scope.upstream_path(&settings.root, &expected);
    if path.is_file() {
        return Ok(UpstreamMatch::Exact {
            reference: expected,
            path,
        });
    }

    let candidates = list_upstream_refs(&settings.root, &scope)?;
    if candidates.is_empty() {
        Ok(UpstreamMatch::NotFound { expected })
    } else {
        Ok(UpstreamMatch::Candidates(candidates))
    }
}
