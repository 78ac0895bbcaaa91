//! Loading and saving declarative documents at their convention paths.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::catalog::{self, ProviderCatalog, Scope};
use crate::config::Settings;
use crate::constants::{DOCUMENT_EXT, PROVIDERS_DIR, SITES_DIR};
use crate::error::{Error, Result, ValidationError};
use crate::migrate;
use crate::model::{DomainConfig, Environment, SiteDocument, UpstreamDef, UpstreamDocument};
use crate::render::UpstreamResolver;

/// A document that could not be loaded. The rest of the load still succeeds.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub domains: BTreeMap<String, DomainConfig>,
    pub failures: Vec<LoadFailure>,
}

pub struct Store {
    settings: Settings,
    catalog: ProviderCatalog,
}

impl Store {
    /// Opens the tree described by `settings`, reading the provider catalog.
    pub fn open(settings: Settings) -> Result<Self> {
        let catalog = ProviderCatalog::load(&settings.root)?;
        Ok(Self::with_catalog(settings, catalog))
    }

    pub fn with_catalog(settings: Settings, catalog: ProviderCatalog) -> Self {
        Self { settings, catalog }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    /// Reads every site document under the root. Malformed documents are
    /// logged and reported, never fatal.
    pub fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();
        let mut paths = Vec::new();
        collect_site_documents(&self.root().join(PROVIDERS_DIR), &mut paths);
        paths.sort();

        for path in paths {
            match read_site(&path) {
                Ok(domain) => {
                    if report.domains.contains_key(domain.domain()) {
                        let error = ValidationError::new(
                            domain.domain(),
                            "domain",
                            format!("declared more than once (again in {})", path.display()),
                        );
                        warn!("Skipping {}: {}", path.display(), error);
                        report.failures.push(LoadFailure {
                            path,
                            error: error.into(),
                        });
                        continue;
                    }
                    debug!("Loaded {}", path.display());
                    report.domains.insert(domain.domain().to_string(), domain);
                }
                Err(error) => {
                    warn!("Skipping {}: {}", path.display(), error);
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }
        report
    }

    pub fn get_domain(&self, name: &str) -> Result<DomainConfig> {
        let (path, _) = self.locate_domain(name)?;
        read_site(&path)
    }

    /// Path and scope of an existing site document.
    pub fn locate_domain(&self, name: &str) -> Result<(PathBuf, Scope)> {
        catalog::find_site(self.root(), name).ok_or_else(|| Error::Resolution {
            resource: name.to_string(),
            kind: "domain",
            reference: name.to_string(),
        })
    }

    /// Scope a domain's documents live in, with the provider canonicalised.
    pub fn scope_of(&self, domain: &DomainConfig) -> Result<Scope> {
        let provider = catalog::resolve_provider(
            &self.settings,
            &self.catalog,
            domain.domain(),
            domain.provider(),
            Some(domain.domain()),
        )?;
        Ok(Scope::for_domain(domain, &provider))
    }

    /// Writes the full site document (overwrite) at its canonical path.
    ///
    /// A copy in another scope (the domain moved environment, server type
    /// or provider) is removed once the new document is in place.
    pub fn save_domain(&self, domain: &DomainConfig) -> Result<PathBuf> {
        let scope = self.scope_of(domain)?;
        let path = scope.site_path(self.root(), domain.domain());
        write_document(&path, &domain.to_document(), domain.domain())?;
        info!("Saved {} to {}", domain.domain(), path.display());

        for (stale, _) in catalog::site_locations(self.root(), domain.domain()) {
            if stale == path {
                continue;
            }
            fs::remove_file(&stale).map_err(|e| Error::io(domain.domain(), "remove", &stale, e))?;
            info!("Removed previous copy of {} at {}", domain.domain(), stale.display());
        }
        Ok(path)
    }

    /// Load, fill what is missing from `incoming`, validate, save.
    pub fn patch_domain(&self, incoming: &SiteDocument) -> Result<DomainConfig> {
        let merged = match catalog::find_site(self.root(), incoming.domain.trim()) {
            Some((path, _)) => {
                let mut current = read_site_document(&path)?;
                current.merge_missing(incoming);
                current
            }
            None => incoming.clone(),
        };
        let domain = DomainConfig::try_from(merged)?;
        self.save_domain(&domain)?;
        Ok(domain)
    }

    pub fn load_upstream(&self, scope: &Scope, reference: &str) -> Result<UpstreamDef> {
        let path = scope.upstream_path(self.root(), reference);
        if !path.is_file() {
            return Err(Error::unresolved_upstream(reference, reference));
        }
        read_upstream(&path)
    }

    pub fn save_upstream(&self, upstream: &UpstreamDef, scope: &Scope) -> Result<PathBuf> {
        let path = scope.upstream_path(self.root(), upstream.name());
        write_document(&path, &upstream.to_document(), upstream.name())?;
        info!("Saved upstream {} to {}", upstream.name(), path.display());
        Ok(path)
    }

    /// Upstream referenced by one of `domain`'s routes, from the domain's scope.
    pub fn resolve_upstream(&self, domain: &DomainConfig, reference: &str) -> Result<UpstreamDef> {
        self.resolver_for(domain)?.resolve(reference)
    }

    pub fn resolver_for(&self, domain: &DomainConfig) -> Result<ScopedResolver<'_>> {
        Ok(ScopedResolver {
            store: self,
            scope: self.scope_of(domain)?,
            domain: domain.domain().to_string(),
        })
    }
}

/// Resolves upstream references inside one scope, reporting failures
/// against the domain that asked.
pub struct ScopedResolver<'a> {
    store: &'a Store,
    scope: Scope,
    domain: String,
}

impl ScopedResolver<'_> {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl UpstreamResolver for ScopedResolver<'_> {
    fn resolve(&self, reference: &str) -> Result<UpstreamDef> {
        let path = self.scope.upstream_path(self.store.root(), reference);
        if !path.is_file() {
            return Err(Error::unresolved_upstream(&self.domain, reference));
        }
        read_upstream(&path)
    }
}

fn collect_site_documents(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_site_documents(&path, out);
        } else if is_site_document(&path) {
            out.push(path);
        }
    }
}

fn is_site_document(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == DOCUMENT_EXT)
        && path
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|name| name == SITES_DIR)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), "read", path, e))
}

fn malformed(path: &Path) -> impl Fn(serde_yaml::Error) -> Error + '_ {
    move |source| Error::Document {
        path: path.to_path_buf(),
        source,
    }
}

/// Site document with legacy shapes normalised in memory. The file itself
/// is left untouched.
pub fn read_site_document(path: &Path) -> Result<SiteDocument> {
    let content = read_text(path)?;
    let mut value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(malformed(path))?;
    if migrate::migrate_routes_dict_to_list(&mut value) {
        debug!("{}: legacy routes map normalised on load", path.display());
    }
    fill_missing_environment(path, &mut value);
    serde_yaml::from_value(value).map_err(malformed(path))
}

/// A document without `environment` takes it from the scope directory it
/// sits in (`<env>/sites/<domain>.yaml`), falling back to dev.
fn fill_missing_environment(path: &Path, value: &mut serde_yaml::Value) {
    let Some(map) = value.as_mapping_mut() else {
        return;
    };
    if map.contains_key("environment") {
        return;
    }
    let from_dir = path
        .parent()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .and_then(|n| n.parse::<Environment>().ok());
    match from_dir {
        Some(env) => {
            warn!("{}: no environment declared, using {} from its directory", path.display(), env);
            map.insert(
                serde_yaml::Value::String("environment".to_string()),
                serde_yaml::Value::String(env.as_str().to_string()),
            );
        }
        None => warn!("{}: no environment declared, assuming {}", path.display(), Environment::default()),
    }
}

pub fn read_site(path: &Path) -> Result<DomainConfig> {
    Ok(DomainConfig::try_from(read_site_document(path)?)?)
}

/// Upstream document; the file stem must match `upstream.name`.
pub fn read_upstream(path: &Path) -> Result<UpstreamDef> {
    let content = read_text(path)?;
    let doc: UpstreamDocument = serde_yaml::from_str(&content).map_err(malformed(path))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if doc.upstream.name.trim() != stem {
        return Err(ValidationError::new(
            &stem,
            "upstream.name",
            format!("`{}` does not match the file name `{}`", doc.upstream.name, stem),
        )
        .into());
    }
    Ok(UpstreamDef::try_from(doc)?)
}

/// Serialises `value` and writes it with [`write_atomic`].
pub fn write_document<T: Serialize>(path: &Path, value: &T, resource: &str) -> Result<()> {
    let text = serde_yaml::to_string(value).map_err(malformed(path))?;
    write_atomic(path, &text, resource)
}

/// Writes to a temp file next to `path`, then renames over it, so readers
/// never see a half-written document.
pub fn write_atomic(path: &Path, contents: &str, resource: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(resource, "create", parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, std::process::id()));
    fs::write(&tmp, contents).map_err(|e| Error::io(resource, "write", &tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io(resource, "write", path, e));
    }
    Ok(())
}
