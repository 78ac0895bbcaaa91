//! Nginx server block with one `upstream` block per referenced pool.

use super::{Renderer, ResolvedSite};
use crate::error::Result;
use crate::model::{Route, UpstreamDef, UriStrategy};
use crate::routing::{Algorithm, Stickiness, Strategy};

const PROXY_HEADERS: &[&str] = &[
    "proxy_set_header Host $host;",
    "proxy_set_header X-Real-IP $remote_addr;",
    "proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;",
    "proxy_set_header X-Forwarded-Proto $scheme;",
];

pub struct NginxRenderer;

impl Renderer for NginxRenderer {
    fn render(&self, site: &ResolvedSite<'_>) -> Result<String> {
        let mut out = site.meta_block();

        for upstream in site.upstreams.values() {
            out.push('\n');
            out.push_str(&upstream_block(upstream));
        }

        out.push_str("\nserver {\n");
        out.push_str("    listen 80;\n");
        out.push_str(&format!("    server_name {};\n", site.domain.domain()));
        for route in site.domain.routes() {
            out.push('\n');
            out.push_str(&location_block(route));
        }
        out.push_str("}\n");
        Ok(out)
    }
}

fn upstream_block(upstream: &UpstreamDef) -> String {
    let mut out = format!("upstream {} {{\n", upstream.name());
    if let Some(line) = balancing_directive(upstream) {
        out.push_str(&format!("    {}\n", line));
    }

    let routing = upstream.routing();
    let multi = upstream.nodes().len() > 1;
    let weights = upstream.effective_weights();
    for (i, (node, weight)) in upstream.nodes().iter().zip(weights).enumerate() {
        let mut line = format!("    server {}", node.address());
        if multi && weight > 0 {
            line.push_str(&format!(" weight={}", weight));
        }
        let is_backup = node.backup || (routing.strategy() == Strategy::Failover && i > 0);
        if node.down || weight == 0 {
            line.push_str(" down");
        } else if is_backup {
            line.push_str(" backup");
        }
        line.push_str(";\n");
        out.push_str(&line);
    }
    out.push_str("}\n");
    out
}

/// Load-balancing line for the upstream, if it differs from round robin.
fn balancing_directive(upstream: &UpstreamDef) -> Option<String> {
    if let Some(canary) = upstream.routing().canary() {
        let key = canary.sticky_key.as_deref().unwrap_or("").trim();
        return match canary.stickiness? {
            Stickiness::Ip => Some("hash $remote_addr consistent;".to_string()),
            Stickiness::Cookie => Some(format!("hash $cookie_{} consistent;", variable_name(key))),
            Stickiness::Header => Some(format!("hash $http_{} consistent;", variable_name(key))),
            Stickiness::Request => Some("hash $request_id;".to_string()),
            Stickiness::None => None,
        };
    }
    match upstream.routing().algorithm()? {
        Algorithm::LeastConn => Some("least_conn;".to_string()),
        Algorithm::IpHash => Some("ip_hash;".to_string()),
        Algorithm::HashUri => Some("hash $request_uri consistent;".to_string()),
        Algorithm::RoundRobin | Algorithm::Weighted => None,
    }
}

/// Header and cookie names as nginx exposes them in variables.
fn variable_name(key: &str) -> String {
    key.to_lowercase().replace('-', "_")
}

fn location_block(route: &Route) -> String {
    let uri = &route.uri;
    let mut out = format!("    location {} {{\n", uri.public);
    if uri.strategy == UriStrategy::Strip {
        let prefix = uri.public.trim_end_matches('/');
        let target = uri.upstream.trim_end_matches('/');
        out.push_str(&format!(
            "        rewrite ^{}/?(.*)$ {}/$1 break;\n",
            escape_regex(prefix),
            target
        ));
    }
    out.push_str(&format!("        proxy_pass http://{};\n", route.upstream_ref));
    for header in PROXY_HEADERS {
        out.push_str(&format!("        {}\n", header));
    }
    out.push_str("    }\n");
    out
}

fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{UpstreamSet, generate};
    use super::*;
    use crate::model::{ServerType, ServiceType, UpstreamNode, Routing};

    #[test]
    fn test_single_node_site() {
        let domain = domain(
            ServerType::Nginx,
            vec![route("root", "/", "api__identity", UriStrategy::Passthrough)],
        );
        let set: UpstreamSet = [single("api__identity", 3000)].into_iter().collect();
        let text = generate(&domain, &set).unwrap();

        assert_eq!(text.matches("location / {").count(), 1);
        assert_eq!(text.matches("location ").count(), 1);
        assert!(text.contains("proxy_pass http://api__identity;"));
        assert!(text.contains("upstream api__identity {\n    server 127.0.0.1:3000;\n}\n"));
        assert_eq!(text.matches("upstream ").count(), 1);
        assert!(text.contains("server_name dev-identity.example.com;"));
    }

    #[test]
    fn test_canary_effective_weights() {
        let domain = domain(
            ServerType::Nginx,
            vec![route("root", "/", "api__identity", UriStrategy::Passthrough)],
        );
        let set: UpstreamSet = [canary("api__identity")].into_iter().collect();
        let text = generate(&domain, &set).unwrap();
        assert!(text.contains("    server 10.0.0.1:3000 weight=90;\n"));
        assert!(text.contains("    server 10.0.0.2:3000 weight=10;\n"));
    }

    #[test]
    fn test_strip_rewrites_prefix() {
        let route = route("api", "/api/identity/", "api__identity", UriStrategy::Strip);
        let block = location_block(&route);
        assert!(block.contains("location /api/identity/ {"));
        assert!(block.contains("rewrite ^/api/identity/?(.*)$ /$1 break;"));
        assert!(block.contains("proxy_pass http://api__identity;"));
    }

    #[test]
    fn test_failover_marks_backups() {
        let routing = Routing::new(Strategy::Failover, Some(Algorithm::LeastConn), None).unwrap();
        let mut primary = UpstreamNode::new("primary", "10.0.0.1", 3000);
        primary.weight = 50;
        let mut spare = UpstreamNode::new("spare", "10.0.0.2", 3000);
        spare.weight = 50;
        let upstream = UpstreamDef::new("api__x", ServiceType::Api, routing, vec![primary, spare]).unwrap();
        let block = upstream_block(&upstream);
        assert!(block.contains("least_conn;"));
        assert!(block.contains("server 10.0.0.1:3000 weight=50;"));
        assert!(block.contains("server 10.0.0.2:3000 weight=50 backup;"));
    }

    #[test]
    fn test_hash_uri_directive() {
        let routing = Routing::new(Strategy::Simple, Some(Algorithm::HashUri), None).unwrap();
        let upstream = UpstreamDef::new(
            "api__x",
            ServiceType::Api,
            routing,
            vec![UpstreamNode::new("a", "10.0.0.1", 3000)],
        )
        .unwrap();
        assert!(upstream_block(&upstream).contains("hash $request_uri consistent;"));
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("/v1.0/api"), "/v1\\.0/api");
    }
}
