use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Environment, ServerType, is_slug};
use crate::error::ValidationError;

const FRONTEND_ROLE: &str = "frontend";

fn default_role() -> String {
    FRONTEND_ROLE.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriStrategy {
    /// Remove the public prefix before forwarding.
    #[default]
    Strip,
    /// Forward the request path untouched.
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    #[default]
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriTransform {
    pub public: String,
    pub upstream: String,
    #[serde(default)]
    pub strategy: UriStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: RouteKind,
    pub upstream_ref: String,
    pub uri: UriTransform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerWeb {
    #[serde(rename = "type")]
    pub kind: ServerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Filesystem ownership of the site's document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    pub path: String,
    pub owner: String,
    pub technical_user: String,
}

/// On-disk shape of a site document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDocument {
    pub domain: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub environment: Environment,
    pub provider: String,
    #[serde(alias = "backend")]
    pub server_web: ServerWeb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<RootConfig>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl SiteDocument {
    /// Patch semantics: keep everything already declared, fill what is absent
    /// from `other`, and append routes whose name is not present yet.
    pub fn merge_missing(&mut self, other: &SiteDocument) {
        if self.server_web.version.is_none() {
            self.server_web.version = other.server_web.version.clone();
        }
        if self.root.is_none() {
            self.root = other.root.clone();
        }
        if self.provider.trim().is_empty() {
            self.provider = other.provider.clone();
        }
        let known: HashSet<String> = self.routes.iter().map(|r| r.name.clone()).collect();
        for route in &other.routes {
            if !known.contains(&route.name) {
                self.routes.push(route.clone());
            }
        }
    }
}

/// A validated frontend site. Only obtainable through `TryFrom<SiteDocument>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    domain: String,
    environment: Environment,
    provider: String,
    server_web: ServerWeb,
    root: Option<RootConfig>,
    routes: Vec<Route>,
}

impl DomainConfig {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn server_web(&self) -> &ServerWeb {
        &self.server_web
    }

    pub fn server_type(&self) -> ServerType {
        self.server_web.kind
    }

    pub fn root(&self) -> Option<&RootConfig> {
        self.root.as_ref()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route serving `/`, falling back to the first declared route.
    pub fn primary_route(&self) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.uri.public == "/")
            .or_else(|| self.routes.first())
    }

    /// Upstream references in first-use order, without duplicates.
    pub fn upstream_refs(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .map(|r| r.upstream_ref.as_str())
            .filter(|r| seen.insert(*r))
            .collect()
    }

    pub fn to_document(&self) -> SiteDocument {
        SiteDocument {
            domain: self.domain.clone(),
            role: default_role(),
            environment: self.environment,
            provider: self.provider.clone(),
            server_web: self.server_web.clone(),
            root: self.root.clone(),
            routes: self.routes.clone(),
        }
    }
}

impl TryFrom<SiteDocument> for DomainConfig {
    type Error = ValidationError;

    fn try_from(doc: SiteDocument) -> Result<Self, Self::Error> {
        let domain = doc.domain.trim().to_string();
        validate_domain_name(&domain)?;
        let invalid = |field: &str, message: String| ValidationError::new(&domain, field, message);

        if doc.role != FRONTEND_ROLE {
            return Err(invalid(
                "role",
                format!("expected `{}`, got `{}`", FRONTEND_ROLE, doc.role),
            ));
        }
        if doc.provider.trim().is_empty() {
            return Err(invalid("provider", "must not be empty".into()));
        }

        if let Some(root) = &doc.root {
            if !root.path.starts_with('/') {
                return Err(invalid("root.path", format!("`{}` is not an absolute path", root.path)));
            }
            if root.owner.trim().is_empty() {
                return Err(invalid("root.owner", "must name a system group".into()));
            }
            if root.technical_user.trim().is_empty() {
                return Err(invalid("root.technical_user", "must name a system user".into()));
            }
        }

        let mut names = HashSet::new();
        let mut publics = HashSet::new();
        for (i, route) in doc.routes.iter().enumerate() {
            let field = |sub: &str| format!("routes[{}].{}", i, sub);
            if !is_slug(&route.name) {
                return Err(invalid(
                    &field("name"),
                    format!("`{}` is not a lowercase slug", route.name),
                ));
            }
            if !names.insert(route.name.as_str()) {
                return Err(invalid(
                    &field("name"),
                    format!("duplicate route name `{}`", route.name),
                ));
            }
            if route.upstream_ref.trim().is_empty() {
                return Err(invalid(&field("upstream_ref"), "must reference an upstream".into()));
            }
            if !route.uri.public.starts_with('/') {
                return Err(invalid(
                    &field("uri.public"),
                    format!("`{}` must start with `/`", route.uri.public),
                ));
            }
            if !route.uri.upstream.starts_with('/') {
                return Err(invalid(
                    &field("uri.upstream"),
                    format!("`{}` must start with `/`", route.uri.upstream),
                ));
            }
            if !publics.insert(route.uri.public.as_str()) {
                return Err(invalid(
                    &field("uri.public"),
                    format!("path `{}` is already routed", route.uri.public),
                ));
            }
            if route.uri.public == "/" && route.uri.strategy != UriStrategy::Passthrough {
                return Err(invalid(
                    &field("uri.strategy"),
                    "the `/` route must use passthrough".into(),
                ));
            }
        }

        Ok(DomainConfig {
            domain,
            environment: doc.environment,
            provider: doc.provider.trim().to_string(),
            server_web: doc.server_web,
            root: doc.root,
            routes: doc.routes,
        })
    }
}

fn validate_domain_name(domain: &str) -> Result<(), ValidationError> {
    let bad = |message: &str| Err(ValidationError::new(domain, "domain", message));
    if domain.is_empty() {
        return bad("must not be empty");
    }
    if domain != domain.to_lowercase() {
        return bad("must be lowercase");
    }
    let valid_chars = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
    if !valid_chars || domain.starts_with('.') || domain.contains("..") {
        return bad("is not a valid hostname");
    }
    Ok(())
}
