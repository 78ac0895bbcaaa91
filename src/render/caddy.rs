//! Caddyfile site block.

use super::{Renderer, ResolvedSite};
use crate::error::Result;
use crate::model::{Route, UpstreamDef, UriStrategy};
use crate::routing::{Algorithm, Stickiness, Strategy};

pub struct CaddyRenderer;

impl Renderer for CaddyRenderer {
    fn render(&self, site: &ResolvedSite<'_>) -> Result<String> {
        let mut out = site.meta_block();
        out.push_str(&format!("\n{} {{\n", site.domain.domain()));

        // Caddy orders handle blocks by path specificity itself, but the
        // catch-all goes last so the file reads the same way.
        let (catch_all, prefixed): (Vec<&Route>, Vec<&Route>) =
            site.domain.routes().iter().partition(|r| r.uri.public == "/");
        for route in prefixed.into_iter().chain(catch_all) {
            if let Some(upstream) = site.upstream(&route.upstream_ref) {
                out.push_str(&handle_block(route, upstream));
            }
        }
        out.push_str("}\n");
        Ok(out)
    }
}

fn handle_block(route: &Route, upstream: &UpstreamDef) -> String {
    let uri = &route.uri;
    let prefix = uri.public.trim_end_matches('/');

    let mut out = match (uri.public.as_str(), uri.strategy) {
        ("/", _) => "    handle {\n".to_string(),
        (_, UriStrategy::Strip) => format!("    handle_path {}/* {{\n", prefix),
        (_, UriStrategy::Passthrough) => format!("    handle {}/* {{\n", prefix),
    };
    let upstream_prefix = uri.upstream.trim_end_matches('/');
    if uri.strategy == UriStrategy::Strip && !upstream_prefix.is_empty() {
        out.push_str(&format!("        rewrite * {}{{uri}}\n", upstream_prefix));
    }
    out.push_str(&reverse_proxy(upstream));
    out.push_str("    }\n");
    out
}

fn reverse_proxy(upstream: &UpstreamDef) -> String {
    let live: Vec<(String, u32)> = upstream
        .nodes()
        .iter()
        .zip(upstream.effective_weights())
        .filter(|(node, weight)| !node.down && *weight > 0)
        .map(|(node, weight)| (node.address(), weight))
        .collect();
    if live.is_empty() {
        return "        respond 503\n".to_string();
    }
    let addresses: Vec<&str> = live.iter().map(|(a, _)| a.as_str()).collect();

    let mut out = format!("        reverse_proxy {}", addresses.join(" "));
    match lb_policy(upstream, &live) {
        Some(policy) => out.push_str(&format!(" {{\n            lb_policy {}\n        }}\n", policy)),
        None => out.push('\n'),
    }
    out
}

fn lb_policy(upstream: &UpstreamDef, live: &[(String, u32)]) -> Option<String> {
    if live.len() < 2 {
        return None;
    }
    let routing = upstream.routing();
    if let Some(canary) = routing.canary() {
        let key = canary.sticky_key.as_deref().unwrap_or("").trim();
        return Some(match canary.stickiness {
            Some(Stickiness::Ip) => "ip_hash".to_string(),
            Some(Stickiness::Cookie) => format!("cookie {}", key),
            Some(Stickiness::Header) => format!("header {}", key),
            _ => weighted(live),
        });
    }
    if routing.strategy() == Strategy::Failover {
        return Some("first".to_string());
    }
    match routing.algorithm()? {
        Algorithm::RoundRobin => None,
        Algorithm::LeastConn => Some("least_conn".to_string()),
        Algorithm::IpHash => Some("ip_hash".to_string()),
        Algorithm::HashUri => Some("uri_hash".to_string()),
        Algorithm::Weighted => Some(weighted(live)),
    }
}

fn weighted(live: &[(String, u32)]) -> String {
    let weights: Vec<String> = live.iter().map(|(_, w)| w.to_string()).collect();
    format!("weighted_round_robin {}", weights.join(" "))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{UpstreamSet, generate};
    use super::*;
    use crate::model::{Routing, ServerType, ServiceType, UpstreamNode};

    #[test]
    fn test_site_block() {
        let domain = domain(
            ServerType::Caddy,
            vec![
                route("root", "/", "frontend__identity", UriStrategy::Passthrough),
                route("api", "/api/identity/", "api__identity", UriStrategy::Strip),
            ],
        );
        let set: UpstreamSet = [canary("api__identity"), single("frontend__identity", 8080)]
            .into_iter()
            .collect();
        let text = generate(&domain, &set).unwrap();

        assert!(text.contains("\ndev-identity.example.com {\n"));
        assert!(text.contains(
            "    handle_path /api/identity/* {\n        reverse_proxy 10.0.0.1:3000 10.0.0.2:3000 {\n            lb_policy weighted_round_robin 90 10\n        }\n    }\n"
        ));
        assert!(text.contains("    handle {\n        reverse_proxy 127.0.0.1:8080\n    }\n"));
        assert!(text.find("handle_path").unwrap() < text.find("    handle {").unwrap());
    }

    #[test]
    fn test_all_nodes_down_responds_unavailable() {
        let mut node = UpstreamNode::new("main", "127.0.0.1", 3000);
        node.down = true;
        let upstream = UpstreamDef::new("api__x", ServiceType::Api, Routing::simple(), vec![node]).unwrap();
        let r = route("api", "/api/", "api__x", UriStrategy::Strip);
        let block = handle_block(&r, &upstream);
        assert!(!block.contains("reverse_proxy"));
        assert!(block.contains("        respond 503\n"));
    }

    #[test]
    fn test_passthrough_prefix() {
        let r = route("docs", "/docs/", "static__docs", UriStrategy::Passthrough);
        let block = handle_block(&r, &single("static__docs", 9000));
        assert!(block.starts_with("    handle /docs/* {\n"));
        assert!(!block.contains("rewrite"));
    }
}
