//! Declarative data model: sites (frontend domains) and the upstream pools
//! their routes proxy to.
//!
//! Each entity has a document shape (plain serde struct, what lives on disk)
//! and a validated shape that can only be obtained through a checking
//! constructor. Invalid combinations are rejected when the value is built,
//! never coerced.

mod domain;
pub mod tech;
mod upstream;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use domain::{DomainConfig, RootConfig, Route, RouteKind, ServerWeb, SiteDocument, UriStrategy, UriTransform};
pub use upstream::{
    Canary, CanarySpec, NodeGroup, Routing, RoutingSpec, Runtime, Tech, UpstreamDef, UpstreamDocument,
    UpstreamNode, UpstreamSpec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Qa,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Nginx,
    Apache,
    Traefik,
    Caddy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    #[default]
    Api,
    Frontend,
    Admin,
    Static,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Qa, Environment::Prod];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Qa => "qa",
            Environment::Prod => "prod",
        }
    }
}

impl ServerType {
    pub const ALL: [ServerType; 4] = [
        ServerType::Nginx,
        ServerType::Apache,
        ServerType::Traefik,
        ServerType::Caddy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServerType::Nginx => "nginx",
            ServerType::Apache => "apache",
            ServerType::Traefik => "traefik",
            ServerType::Caddy => "caddy",
        }
    }

    /// File extension of the rendered server configuration.
    pub fn config_extension(self) -> &'static str {
        match self {
            ServerType::Nginx | ServerType::Apache => "conf",
            ServerType::Caddy => "caddy",
            ServerType::Traefik => "yml",
        }
    }
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Api => "api",
            ServiceType::Frontend => "frontend",
            ServiceType::Admin => "admin",
            ServiceType::Static => "static",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Environment::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| format!("unknown environment `{}` (expected dev, qa or prod)", s))
    }
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ServerType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown server type `{}`", s))
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api" => Ok(ServiceType::Api),
            "frontend" => Ok(ServiceType::Frontend),
            "admin" => Ok(ServiceType::Admin),
            "static" => Ok(ServiceType::Static),
            other => Err(format!("unknown service type `{}`", other)),
        }
    }
}

/// Lowercase, hyphens to underscores. Used for upstream slugs and route names.
pub fn normalize_slug(raw: &str) -> String {
    raw.trim().to_lowercase().replace('-', "_")
}

pub(crate) fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enums() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert_eq!("caddy".parse::<ServerType>(), Ok(ServerType::Caddy));
        assert_eq!("static".parse::<ServiceType>(), Ok(ServiceType::Static));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug(" Identity-Service "), "identity_service");
        assert!(is_slug("api_identity"));
        assert!(!is_slug("Api Identity"));
        assert!(!is_slug(""));
    }

    #[test]
    fn test_config_extension() {
        assert_eq!(ServerType::Nginx.config_extension(), "conf");
        assert_eq!(ServerType::Traefik.config_extension(), "yml");
    }
}
