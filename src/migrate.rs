//! One-shot upgrades of older document shapes, and import of hand-written
//! server configs into declarative documents.
//!
//! Every transform is idempotent: running it on an already-current document
//! reports "unchanged" and touches nothing.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use crate::catalog::{self, Scope};
use crate::config::Settings;
use crate::constants::{BACKUP_TIMESTAMP_FORMAT, DOCUMENT_EXT, PROVIDERS_DIR, SITES_DIR, UPSTREAMS_DIR};
use crate::error::{Error, Result, ValidationError};
use crate::model::{
    DomainConfig, Environment, Route, RouteKind, Routing, ServerType, ServerWeb, ServiceType, SiteDocument, Tech,
    UpstreamDef, UpstreamDocument, UpstreamNode, UriStrategy, UriTransform, normalize_slug,
};
use crate::parser::ParsedConfig;
use crate::routing::{self, Strategy};
use crate::store::{self, Store};

const LEGACY_WEIGHTED: &str = "weighted";

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn get_str<'a>(map: &'a Mapping, name: &str) -> Option<&'a str> {
    map.get(name).and_then(Value::as_str)
}

/// Route name derived from a public path: `/` is `root`, `/api/v1/` is `api_v1`.
pub fn route_name_for_path(path: &str) -> String {
    let mut name = String::new();
    for c in path.trim().trim_matches('/').chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_matches('_').to_string();
    if name.is_empty() { "root".to_string() } else { name }
}

/// Converts a `routes` map keyed by public path into the route list.
///
/// Returns whether the document changed; a document already holding a list
/// is left alone.
pub fn migrate_routes_dict_to_list(doc: &mut Value) -> bool {
    let Some(routes) = doc.get("routes").and_then(Value::as_mapping) else {
        return false;
    };

    let mut list = Vec::new();
    let mut used: Vec<String> = Vec::new();
    for (path, entry) in routes {
        let Some(public) = path.as_str() else {
            continue;
        };
        let entry = match entry {
            Value::String(upstream_ref) => {
                let mut m = Mapping::new();
                m.insert(key("upstream_ref"), Value::String(upstream_ref.clone()));
                m
            }
            Value::Mapping(m) => m.clone(),
            _ => Mapping::new(),
        };

        let mut name = get_str(&entry, "name")
            .map(normalize_slug)
            .unwrap_or_else(|| route_name_for_path(public));
        let base = name.clone();
        let mut n = 2;
        while used.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        used.push(name.clone());

        // an explicit uri mapping wins; only absent keys are filled in
        let mut uri = entry.get("uri").and_then(Value::as_mapping).cloned().unwrap_or_default();
        if get_str(&uri, "public").is_none() {
            uri.insert(key("public"), key(public));
        }
        if get_str(&uri, "upstream").is_none() {
            uri.insert(key("upstream"), key(get_str(&entry, "upstream_path").unwrap_or("/")));
        }
        if get_str(&uri, "strategy").is_none() {
            let effective_public = get_str(&uri, "public").unwrap_or(public);
            let default_strategy = if effective_public == "/" { "passthrough" } else { "strip" };
            let strategy = get_str(&entry, "strategy").unwrap_or(default_strategy).to_string();
            uri.insert(key("strategy"), Value::String(strategy));
        }
        let upstream_ref = get_str(&entry, "upstream_ref")
            .or_else(|| get_str(&entry, "upstream"))
            .unwrap_or("");

        let mut route = Mapping::new();
        route.insert(key("name"), Value::String(name));
        route.insert(key("type"), key(get_str(&entry, "type").unwrap_or("proxy")));
        route.insert(key("upstream_ref"), key(upstream_ref));
        route.insert(key("uri"), Value::Mapping(uri));
        list.push(Value::Mapping(route));
    }

    if let Some(map) = doc.as_mapping_mut() {
        map.insert(key("routes"), Value::Sequence(list));
    }
    true
}

/// Brings an upstream document to the current shape: `nodes[]` instead of
/// flat `runtime`/`tech`, explicit algorithm, current spellings.
pub fn migrate_upstream_value(doc: &mut Value) -> bool {
    let Some(upstream) = doc.get_mut("upstream").and_then(Value::as_mapping_mut) else {
        return false;
    };
    let mut changed = false;

    let has_nodes = upstream
        .get("nodes")
        .and_then(Value::as_sequence)
        .is_some_and(|n| !n.is_empty());
    if !has_nodes {
        if let Some(runtime) = upstream.remove("runtime") {
            let name = get_str(upstream, "name").unwrap_or("upstream").trim().to_string();
            let mut node = Mapping::new();
            node.insert(key("name"), Value::String(format!("{}_default", name)));
            node.insert(key("weight"), Value::Number(100.into()));
            node.insert(key("runtime"), runtime);
            if let Some(tech) = upstream.remove("tech") {
                node.insert(key("tech"), tech);
            }
            upstream.insert(key("nodes"), Value::Sequence(vec![Value::Mapping(node)]));
            changed = true;
        }
    }

    if !upstream.contains_key("routing") {
        upstream.insert(key("routing"), Value::Mapping(Mapping::new()));
        changed = true;
    }
    let Some(routing) = upstream.get_mut("routing").and_then(Value::as_mapping_mut) else {
        return changed;
    };

    let strategy = get_str(routing, "strategy").map(|s| s.trim().to_lowercase());
    let strategy = match strategy.as_deref() {
        Some(LEGACY_WEIGHTED) => {
            routing.insert(key("strategy"), key(Strategy::Simple.as_str()));
            if !routing.contains_key("algorithm") {
                routing.insert(key("algorithm"), key(routing::Algorithm::Weighted.as_str()));
            }
            changed = true;
            Some(Strategy::Simple)
        }
        Some(raw) => raw.parse::<Strategy>().ok(),
        None => {
            routing.insert(key("strategy"), key(Strategy::Simple.as_str()));
            changed = true;
            Some(Strategy::Simple)
        }
    };

    if let (Some(strategy), false) = (strategy, routing.contains_key("algorithm")) {
        if let Some(algorithm) = routing::default_algorithm(strategy) {
            routing.insert(key("algorithm"), key(algorithm.as_str()));
            changed = true;
        }
    }

    if let Some(canary) = routing.get_mut("canary").and_then(Value::as_mapping_mut) {
        if get_str(canary, "mode").is_some_and(|m| m.trim().eq_ignore_ascii_case(LEGACY_WEIGHTED)) {
            canary.insert(key("mode"), key(crate::routing::CanaryMode::Percentage.as_str()));
            changed = true;
        }
    }
    changed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocumentKind {
    Site,
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Unchanged,
    /// Rewritten (or would be, on a dry run). `backup` is set when a copy
    /// of the original was kept.
    Migrated { backup: Option<PathBuf> },
}

/// Migrates one document in place, keeping a timestamped backup.
///
/// The migrated document must validate before anything is written.
pub fn migrate_file(path: &Path, kind: DocumentKind, dry_run: bool) -> Result<MigrationOutcome> {
    let resource = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| Error::io(&resource, "read", path, e))?;
    let malformed = |source| Error::Document {
        path: path.to_path_buf(),
        source,
    };
    let mut value: Value = serde_yaml::from_str(&content).map_err(malformed)?;

    let changed = match kind {
        DocumentKind::Site => migrate_routes_dict_to_list(&mut value),
        DocumentKind::Upstream => migrate_upstream_value(&mut value),
    };
    if !changed {
        debug!("{} already current", path.display());
        return Ok(MigrationOutcome::Unchanged);
    }

    match kind {
        DocumentKind::Site => {
            let doc: SiteDocument = serde_yaml::from_value(value.clone()).map_err(malformed)?;
            DomainConfig::try_from(doc)?;
        }
        DocumentKind::Upstream => {
            let doc: UpstreamDocument = serde_yaml::from_value(value.clone()).map_err(malformed)?;
            UpstreamDef::try_from(doc)?;
        }
    }

    if dry_run {
        info!("Would migrate {}", path.display());
        return Ok(MigrationOutcome::Migrated { backup: None });
    }

    let stamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = path.with_file_name(format!("{}.bak-{}", file_name, stamp));
    fs::copy(path, &backup).map_err(|e| Error::io(&resource, "back up", &backup, e))?;

    let text = serde_yaml::to_string(&value).map_err(malformed)?;
    store::write_atomic(path, &text, &resource)?;
    info!("Migrated {} (backup {})", path.display(), backup.display());
    Ok(MigrationOutcome::Migrated { backup: Some(backup) })
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub migrated: Vec<PathBuf>,
    pub unchanged: usize,
    pub failures: Vec<(PathBuf, Error)>,
}

/// Migrates every site and upstream document under the root.
pub fn migrate_tree(settings: &Settings, dry_run: bool) -> MigrationReport {
    let mut documents = Vec::new();
    collect_documents(&settings.root.join(PROVIDERS_DIR), &mut documents);
    documents.sort();

    let mut report = MigrationReport::default();
    for (path, kind) in documents {
        match migrate_file(&path, kind, dry_run) {
            Ok(MigrationOutcome::Unchanged) => report.unchanged += 1,
            Ok(MigrationOutcome::Migrated { .. }) => report.migrated.push(path),
            Err(e) => {
                warn!("Cannot migrate {}: {}", path.display(), e);
                report.failures.push((path, e));
            }
        }
    }
    report
}

fn collect_documents(dir: &Path, out: &mut Vec<(PathBuf, DocumentKind)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            collect_documents(&path, out);
            continue;
        }
        if !path.extension().is_some_and(|ext| ext == DOCUMENT_EXT) {
            continue;
        }
        let parent = path.parent().and_then(|p| p.file_name());
        if parent.is_some_and(|p| p == SITES_DIR) {
            out.push((path, DocumentKind::Site));
        } else if parent.is_some_and(|p| p == UPSTREAMS_DIR) {
            out.push((path, DocumentKind::Upstream));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Provider used when the config has no META provider.
    pub provider: Option<String>,
    /// Environment used when the config has no META environment.
    pub environment: Option<Environment>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A document already exists for the domain; nothing was touched.
    Skipped { domain: String },
    Imported {
        domain: DomainConfig,
        /// Upstream synthesised alongside, when none existed yet.
        upstream: Option<UpstreamDef>,
    },
}

/// Builds declarative documents from a parsed legacy config.
///
/// Never overwrites: a domain that already has a site document is skipped,
/// an upstream that already exists is reused as is.
pub fn import_parsed_config(store: &Store, parsed: &ParsedConfig, options: &ImportOptions) -> Result<ImportOutcome> {
    let Some(name) = parsed.server_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return Err(ValidationError::new("<unnamed config>", "server_name", "config declares no server name").into());
    };
    if catalog::find_site(store.root(), name).is_some() {
        info!("{} already has a site document, skipping", name);
        return Ok(ImportOutcome::Skipped {
            domain: name.to_string(),
        });
    }

    let server = parsed.server_type.unwrap_or(ServerType::Nginx);
    let environment = parsed
        .meta_field("environment")
        .and_then(|e| e.parse::<Environment>().ok())
        .or(options.environment)
        .unwrap_or_default();
    let provider = match parsed.meta_field("provider").map(String::from).or_else(|| options.provider.clone()) {
        Some(provider) => provider,
        None => {
            let found = store.catalog().resolve_provider_id(name, Some(name));
            if found.is_guess() {
                return Err(ValidationError::new(
                    name,
                    "provider",
                    "no META provider, none given and no catalog entry matches the domain",
                )
                .into());
            }
            debug!("{}: provider {} from the catalog", name, found.id);
            found.id
        }
    };

    let upstream_ref = parsed
        .proxy_pass
        .iter()
        .find(|target| parsed.upstream_blocks.contains_key(target.as_str()))
        .cloned()
        .unwrap_or_else(|| {
            let label = name.split('.').next().unwrap_or(name);
            catalog::expected_upstream_ref(ServiceType::Frontend, label)
        });

    let doc = SiteDocument {
        domain: name.to_string(),
        role: "frontend".to_string(),
        environment,
        provider,
        server_web: ServerWeb {
            kind: server,
            version: parsed.meta_field("server_web_version").map(String::from),
        },
        root: None,
        routes: vec![Route {
            name: "root".to_string(),
            kind: RouteKind::Proxy,
            upstream_ref: upstream_ref.clone(),
            uri: UriTransform {
                public: "/".to_string(),
                upstream: "/".to_string(),
                strategy: UriStrategy::Passthrough,
            },
        }],
    };
    let domain = DomainConfig::try_from(doc)?;
    let scope: Scope = store.scope_of(&domain)?;

    let upstream = if scope.upstream_path(store.root(), &upstream_ref).is_file() {
        None
    } else {
        synthesize_upstream(&upstream_ref, parsed)?
    };

    if options.dry_run {
        info!("Would import {}", name);
    } else {
        if let Some(upstream) = &upstream {
            store.save_upstream(upstream, &scope)?;
        }
        store.save_domain(&domain)?;
    }
    Ok(ImportOutcome::Imported { domain, upstream })
}

fn parse_address(raw: &str) -> Option<(String, u16)> {
    let (host, port) = raw.trim().rsplit_once(':')?;
    let port = port.parse::<u16>().ok().filter(|p| *p > 0)?;
    (!host.is_empty()).then(|| (host.to_string(), port))
}

/// Upstream built from the config's own upstream block, or from its proxy
/// targets / META port when it has none. `None` if no endpoint is known.
fn synthesize_upstream(reference: &str, parsed: &ParsedConfig) -> Result<Option<UpstreamDef>> {
    let mut addresses: Vec<(String, u16)> = parsed
        .upstream_blocks
        .get(reference)
        .map(|members| members.iter().filter_map(|m| parse_address(m)).collect())
        .unwrap_or_default();
    if addresses.is_empty() {
        addresses = parsed.proxy_pass.iter().filter_map(|t| parse_address(t)).collect();
    }
    if addresses.is_empty() {
        if let Some(port) = parsed.meta_field("port").and_then(|p| p.parse::<u16>().ok()) {
            addresses.push(("127.0.0.1".to_string(), port));
        }
    }
    if addresses.is_empty() {
        warn!("{}: no endpoint found, upstream not synthesised", reference);
        return Ok(None);
    }

    let count = addresses.len() as u32;
    let share = 100 / count;
    let tech = parsed.meta_field("tech").map(|language| Tech {
        language: language.to_string(),
        version: parsed.meta_field("tech_version").unwrap_or("").to_string(),
        provider: parsed.meta_field("tech_provider").map(String::from),
        manager: parsed.meta_field("tech_manager").map(String::from),
    });

    let nodes: Vec<UpstreamNode> = addresses
        .into_iter()
        .enumerate()
        .map(|(i, (host, port))| {
            let mut node = UpstreamNode::new(format!("{}_{}", reference, i + 1), host, port);
            node.weight = if i == 0 { share + 100 % count } else { share };
            if i == 0 {
                node.tech = tech.clone();
            }
            node
        })
        .collect();

    let service_type = reference
        .split_once("__")
        .and_then(|(st, _)| st.parse::<ServiceType>().ok())
        .unwrap_or_default();
    Ok(Some(UpstreamDef::new(reference, service_type, Routing::simple(), nodes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProviderCatalog;
    use crate::parser::parse_str;

    const LEGACY_SITE: &str = r#"domain: legacy.example.com
provider: example
server_web: { type: nginx }
routes:
  /:
    upstream_ref: frontend__legacy
  /api/v1/:
    upstream_ref: api__legacy
    strategy: strip
  /Docs:
    upstream: static__docs
"#;

    #[test]
    fn test_routes_dict_keeps_nested_uri() {
        let mut doc: Value = serde_yaml::from_str(
            r#"domain: nested.example.com
provider: example
server_web: { type: nginx }
routes:
  /api/:
    upstream_ref: api__nested
    uri: { public: /api/v2/, upstream: /v2/, strategy: passthrough }
  /admin/:
    upstream_ref: admin__nested
    uri: { upstream: /backoffice/ }
"#,
        )
        .unwrap();
        assert!(migrate_routes_dict_to_list(&mut doc));

        let site: SiteDocument = serde_yaml::from_value(doc).unwrap();
        assert_eq!(site.routes[0].uri.public, "/api/v2/");
        assert_eq!(site.routes[0].uri.upstream, "/v2/");
        assert_eq!(site.routes[0].uri.strategy, UriStrategy::Passthrough);
        assert_eq!(site.routes[1].uri.public, "/admin/");
        assert_eq!(site.routes[1].uri.upstream, "/backoffice/");
        assert_eq!(site.routes[1].uri.strategy, UriStrategy::Strip);
    }

    #[test]
    fn test_route_names() {
        assert_eq!(route_name_for_path("/"), "root");
        assert_eq!(route_name_for_path("/api/v1/"), "api_v1");
        assert_eq!(route_name_for_path("/My-App"), "my_app");
    }

    #[test]
    fn test_routes_dict_to_list() {
        let mut doc: Value = serde_yaml::from_str(LEGACY_SITE).unwrap();
        assert!(migrate_routes_dict_to_list(&mut doc));

        let site: SiteDocument = serde_yaml::from_value(doc.clone()).unwrap();
        assert_eq!(site.routes.len(), 3);
        assert_eq!(site.routes[0].name, "root");
        assert_eq!(site.routes[0].uri.strategy, UriStrategy::Passthrough);
        assert_eq!(site.routes[1].name, "api_v1");
        assert_eq!(site.routes[1].uri.strategy, UriStrategy::Strip);
        assert_eq!(site.routes[2].upstream_ref, "static__docs");
        assert!(DomainConfig::try_from(site).is_ok());

        let once = doc.clone();
        assert!(!migrate_routes_dict_to_list(&mut doc));
        assert_eq!(doc, once);
    }

    #[test]
    fn test_upstream_flat_to_nodes() {
        let mut doc: Value = serde_yaml::from_str(
            "upstream:\n  name: api__x\n  routing: { strategy: weighted }\n  runtime: { host: 127.0.0.1, port: 3000 }\n  tech: { language: node, version: '20' }\n",
        )
        .unwrap();
        assert!(migrate_upstream_value(&mut doc));
        let upstream = &doc["upstream"];
        assert!(upstream.get("runtime").is_none());
        assert_eq!(upstream["nodes"][0]["name"].as_str(), Some("api__x_default"));
        assert_eq!(upstream["nodes"][0]["tech"]["language"].as_str(), Some("node"));
        assert_eq!(upstream["routing"]["strategy"].as_str(), Some("simple"));
        assert_eq!(upstream["routing"]["algorithm"].as_str(), Some("weighted"));

        let once = doc.clone();
        assert!(!migrate_upstream_value(&mut doc));
        assert_eq!(doc, once);

        let def = UpstreamDef::try_from(serde_yaml::from_value::<UpstreamDocument>(doc).unwrap()).unwrap();
        assert_eq!(def.nodes().len(), 1);
    }

    #[test]
    fn test_legacy_canary_mode() {
        let mut doc: Value = serde_yaml::from_str(
            r#"upstream:
  name: api__x
  routing:
    strategy: canary
    canary: { mode: weighted, base_weight: 80, canary_weight: 20 }
  nodes:
    - { name: a, group: base, runtime: { host: 10.0.0.1, port: 3000 } }
    - { name: b, group: canary, runtime: { host: 10.0.0.2, port: 3000 } }
"#,
        )
        .unwrap();
        assert!(migrate_upstream_value(&mut doc));
        assert_eq!(doc["upstream"]["routing"]["canary"]["mode"].as_str(), Some("percentage"));
        assert_eq!(doc["upstream"]["routing"]["algorithm"].as_str(), Some("weighted"));
    }

    #[test]
    fn test_migrate_file_with_backup_and_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.example.com.yaml");
        fs::write(&path, LEGACY_SITE).unwrap();

        let outcome = migrate_file(&path, DocumentKind::Site, true).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated { backup: None });
        assert_eq!(fs::read_to_string(&path).unwrap(), LEGACY_SITE);

        let MigrationOutcome::Migrated { backup: Some(backup) } =
            migrate_file(&path, DocumentKind::Site, false).unwrap()
        else {
            panic!("expected a backup");
        };
        assert_eq!(fs::read_to_string(&backup).unwrap(), LEGACY_SITE);
        assert!(store::read_site(&path).is_ok());
        assert_eq!(
            migrate_file(&path, DocumentKind::Site, false).unwrap(),
            MigrationOutcome::Unchanged
        );
    }

    #[test]
    fn test_invalid_result_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.example.com.yaml");
        let text = "domain: bad.example.com\nprovider: example\nserver_web: { type: nginx }\nroutes:\n  /:\n    upstream_ref: a\n    strategy: strip\n";
        fs::write(&path, text).unwrap();
        assert!(matches!(
            migrate_file(&path, DocumentKind::Site, false),
            Err(Error::Validation(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_migrate_tree() {
        let dir = tempfile::tempdir().unwrap();
        let scope = Scope::new("example", ServerType::Nginx, Environment::Dev);
        fs::create_dir_all(scope.sites_dir(dir.path())).unwrap();
        fs::create_dir_all(scope.upstreams_dir(dir.path())).unwrap();
        fs::write(scope.site_path(dir.path(), "legacy.example.com"), LEGACY_SITE).unwrap();
        fs::write(
            scope.upstream_path(dir.path(), "api__legacy"),
            "upstream:\n  name: api__legacy\n  routing: { strategy: simple, algorithm: round_robin }\n  nodes:\n    - { name: a, runtime: { host: 10.0.0.1, port: 3000 } }\n",
        )
        .unwrap();

        let report = migrate_tree(&Settings::new(dir.path()), false);
        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.unchanged, 1);
        assert!(report.failures.is_empty());
    }

    fn store(root: &Path) -> Store {
        let mut settings = Settings::new(root);
        settings.dev_mode = true;
        Store::with_catalog(settings, ProviderCatalog::default())
    }

    const LEGACY_CONF: &str = "# --- VHOSTCTL META ---
# provider: example
# environment: qa
# tech: php
# tech_version: 7.4
# --- END META ---
upstream frontend__shop {
    server 10.0.0.1:8080;
    server 10.0.0.2:8080;
    server 10.0.0.3:8080;
}
server {
    server_name shop.example.com;
    location / {
        proxy_pass http://frontend__shop;
    }
}
";

    #[test]
    fn test_import_synthesises_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let parsed = parse_str(LEGACY_CONF).unwrap();

        let outcome = import_parsed_config(&store, &parsed, &ImportOptions::default()).unwrap();
        let ImportOutcome::Imported { domain, upstream } = outcome else {
            panic!("expected an import");
        };
        assert_eq!(domain.environment(), Environment::Qa);
        assert_eq!(domain.routes()[0].upstream_ref, "frontend__shop");
        let upstream = upstream.unwrap();
        assert_eq!(upstream.service_type(), ServiceType::Frontend);
        let weights: Vec<u32> = upstream.nodes().iter().map(|n| n.weight).collect();
        assert_eq!(weights, vec![34, 33, 33]);
        assert_eq!(upstream.primary_tech().unwrap().version, "7.4");

        assert_eq!(store.get_domain("shop.example.com").unwrap(), domain);
        let again = import_parsed_config(&store, &parsed, &ImportOptions::default()).unwrap();
        assert_eq!(
            again,
            ImportOutcome::Skipped {
                domain: "shop.example.com".to_string()
            }
        );
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let parsed = parse_str(LEGACY_CONF).unwrap();
        let options = ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        };
        assert!(matches!(
            import_parsed_config(&store, &parsed, &options).unwrap(),
            ImportOutcome::Imported { .. }
        ));
        assert!(!dir.path().join(PROVIDERS_DIR).exists());
    }

    #[test]
    fn test_import_provider_from_domain_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::with_catalog(
            Settings::new(dir.path()),
            ProviderCatalog::from_entries(vec![crate::catalog::ProviderEntry {
                id: "acme".to_string(),
                name: None,
                domain_suffix: Some("acme.io".to_string()),
                internal_namespace: None,
            }]),
        );
        let parsed = parse_str(
            "server {\n    server_name shop.acme.io;\n    location / {\n        proxy_pass http://127.0.0.1:8080;\n    }\n}\n",
        )
        .unwrap();

        let ImportOutcome::Imported { domain, .. } =
            import_parsed_config(&store, &parsed, &ImportOptions::default()).unwrap()
        else {
            panic!("expected an import");
        };
        assert_eq!(domain.provider(), "acme");
        assert!(store.get_domain("shop.acme.io").is_ok());
    }

    #[test]
    fn test_import_needs_provider() {
        let dir = tempfile::tempdir().unwrap();
        let parsed = parse_str("server {\n    server_name x.example.com;\n}\n").unwrap();
        let err = import_parsed_config(&store(dir.path()), &parsed, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.resource(), "x.example.com");
    }
}
