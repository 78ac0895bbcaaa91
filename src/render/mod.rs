//! Deterministic config generation for each supported web server.
//!
//! All upstream references are resolved before any text is produced, so a
//! missing upstream fails the whole render instead of yielding a partial
//! file. Output depends only on the inputs: upstream blocks are ordered by
//! name and routes keep their declared order.

mod apache;
mod caddy;
mod nginx;
mod traefik;

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::constants::{META_END, META_START};
use crate::error::{Error, Result};
use crate::model::{DomainConfig, ServerType, Tech, UpstreamDef, tech};

pub use apache::ApacheRenderer;
pub use caddy::CaddyRenderer;
pub use nginx::NginxRenderer;
pub use traefik::TraefikRenderer;

/// Looks up an upstream by reference.
pub trait UpstreamResolver {
    fn resolve(&self, reference: &str) -> Result<UpstreamDef>;
}

impl<F> UpstreamResolver for F
where
    F: Fn(&str) -> Result<UpstreamDef>,
{
    fn resolve(&self, reference: &str) -> Result<UpstreamDef> {
        self(reference)
    }
}

/// In-memory upstream catalog, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct UpstreamSet {
    upstreams: BTreeMap<String, UpstreamDef>,
}

impl UpstreamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, upstream: UpstreamDef) {
        self.upstreams.insert(upstream.name().to_string(), upstream);
    }
}

impl FromIterator<UpstreamDef> for UpstreamSet {
    fn from_iter<I: IntoIterator<Item = UpstreamDef>>(iter: I) -> Self {
        let mut set = Self::new();
        for upstream in iter {
            set.insert(upstream);
        }
        set
    }
}

impl UpstreamResolver for UpstreamSet {
    fn resolve(&self, reference: &str) -> Result<UpstreamDef> {
        self.upstreams
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::unresolved_upstream(reference, reference))
    }
}

/// A domain with every referenced upstream resolved.
#[derive(Debug, Clone)]
pub struct ResolvedSite<'a> {
    pub domain: &'a DomainConfig,
    pub upstreams: BTreeMap<String, UpstreamDef>,
}

impl ResolvedSite<'_> {
    pub fn upstream(&self, reference: &str) -> Option<&UpstreamDef> {
        self.upstreams.get(reference)
    }

    /// Tech of the upstream behind the primary route, normalised.
    pub fn primary_tech(&self) -> Option<Tech> {
        let route = self.domain.primary_route()?;
        self.upstream(&route.upstream_ref)?
            .primary_tech()
            .map(tech::normalize)
    }

    /// Key/value pairs embedded in the META header of every rendered file.
    pub fn meta(&self) -> Vec<(&'static str, String)> {
        let domain = self.domain;
        let mut fields = vec![
            ("provider", domain.provider().to_string()),
            ("environment", domain.environment().to_string()),
            ("server_web", domain.server_type().to_string()),
        ];
        if let Some(version) = &domain.server_web().version {
            fields.push(("server_web_version", version.clone()));
        }
        if let Some(tech) = self.primary_tech() {
            fields.push(("tech", tech.language));
            fields.push(("tech_version", tech.version));
            if let Some(provider) = tech.provider {
                fields.push(("tech_provider", provider));
            }
            if let Some(manager) = tech.manager {
                fields.push(("tech_manager", manager));
            }
        }
        fields
    }

    pub fn meta_block(&self) -> String {
        let mut out = format!("{}\n", META_START);
        for (key, value) in self.meta() {
            out.push_str(&format!("# {}: {}\n", key, value));
        }
        out.push_str(META_END);
        out.push('\n');
        out
    }
}

pub trait Renderer {
    fn render(&self, site: &ResolvedSite<'_>) -> Result<String>;
}

/// Resolves every upstream `domain` references. Fails on the first one
/// missing, reporting it against the domain.
pub fn resolve_site<'a>(domain: &'a DomainConfig, resolver: &dyn UpstreamResolver) -> Result<ResolvedSite<'a>> {
    let mut upstreams = BTreeMap::new();
    for reference in domain.upstream_refs() {
        let upstream = resolver.resolve(reference).map_err(|e| match e {
            Error::Resolution { kind, reference, .. } => Error::Resolution {
                resource: domain.domain().to_string(),
                kind,
                reference,
            },
            other => other,
        })?;
        upstreams.insert(reference.to_string(), upstream);
    }
    Ok(ResolvedSite { domain, upstreams })
}

/// Renders `domain` for its own server type.
pub fn generate(domain: &DomainConfig, resolver: &dyn UpstreamResolver) -> Result<String> {
    let site = resolve_site(domain, resolver)?;
    match domain.server_type() {
        ServerType::Nginx => NginxRenderer.render(&site),
        ServerType::Apache => ApacheRenderer.render(&site),
        ServerType::Caddy => CaddyRenderer.render(&site),
        ServerType::Traefik => TraefikRenderer.render(&site),
    }
}

/// File name of the rendered config for `domain`.
pub fn config_file_name(domain: &DomainConfig) -> String {
    format!("{}.{}", domain.domain(), domain.server_type().config_extension())
}

/// SHA-256 of rendered text, hex encoded.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{
        DomainConfig, Environment, NodeGroup, Route, RouteKind, Routing, ServerType, ServerWeb, ServiceType,
        SiteDocument, Tech, UpstreamDef, UpstreamNode, UriStrategy, UriTransform,
    };
    use crate::routing::Strategy;
    use crate::model::Canary;

    pub fn route(name: &str, public: &str, upstream_ref: &str, strategy: UriStrategy) -> Route {
        Route {
            name: name.to_string(),
            kind: RouteKind::Proxy,
            upstream_ref: upstream_ref.to_string(),
            uri: UriTransform {
                public: public.to_string(),
                upstream: "/".to_string(),
                strategy,
            },
        }
    }

    pub fn domain(server: ServerType, routes: Vec<Route>) -> DomainConfig {
        DomainConfig::try_from(SiteDocument {
            domain: "dev-identity.example.com".to_string(),
            role: "frontend".to_string(),
            environment: Environment::Dev,
            provider: "example".to_string(),
            server_web: ServerWeb {
                kind: server,
                version: Some("1.24".to_string()),
            },
            root: None,
            routes,
        })
        .unwrap()
    }

    pub fn single(name: &str, port: u16) -> UpstreamDef {
        let mut node = UpstreamNode::new("main", "127.0.0.1", port);
        node.tech = Some(Tech {
            language: "node".to_string(),
            version: "20".to_string(),
            provider: None,
            manager: None,
        });
        UpstreamDef::new(name, ServiceType::Api, Routing::simple(), vec![node]).unwrap()
    }

    pub fn canary(name: &str) -> UpstreamDef {
        let group = |mut n: UpstreamNode, g| {
            n.group = Some(g);
            n
        };
        let routing = Routing::new(Strategy::Canary, None, Some(Canary::default())).unwrap();
        UpstreamDef::new(
            name,
            ServiceType::Api,
            routing,
            vec![
                group(UpstreamNode::new("stable", "10.0.0.1", 3000), NodeGroup::Base),
                group(UpstreamNode::new("next", "10.0.0.2", 3000), NodeGroup::Canary),
            ],
        )
        .unwrap()
    }
}
