//! Apache VirtualHost using mod_proxy_balancer.

use super::{Renderer, ResolvedSite};
use crate::error::Result;
use crate::model::{Route, UpstreamDef, UriStrategy};
use crate::routing::{Algorithm, Stickiness, Strategy};

pub struct ApacheRenderer;

impl Renderer for ApacheRenderer {
    fn render(&self, site: &ResolvedSite<'_>) -> Result<String> {
        let mut out = site.meta_block();
        out.push_str("\n<VirtualHost *:80>\n");
        out.push_str(&format!("    ServerName {}\n", site.domain.domain()));

        for upstream in site.upstreams.values() {
            out.push('\n');
            out.push_str(&balancer_block(upstream));
        }

        out.push_str("\n    ProxyPreserveHost On\n");
        // first match wins, so the longest public path goes first
        let mut routes: Vec<&Route> = site.domain.routes().iter().collect();
        routes.sort_by(|a, b| {
            b.uri
                .public
                .len()
                .cmp(&a.uri.public.len())
                .then_with(|| a.uri.public.cmp(&b.uri.public))
        });
        for route in routes {
            let (public, target) = proxy_pair(route);
            out.push_str(&format!("    ProxyPass \"{}\" \"{}\"\n", public, target));
            out.push_str(&format!("    ProxyPassReverse \"{}\" \"{}\"\n", public, target));
        }
        out.push_str("</VirtualHost>\n");
        Ok(out)
    }
}

fn balancer_block(upstream: &UpstreamDef) -> String {
    let mut out = format!("    <Proxy \"balancer://{}\">\n", upstream.name());
    let routing = upstream.routing();
    let weights = upstream.effective_weights();
    for (i, (node, weight)) in upstream.nodes().iter().zip(weights).enumerate() {
        let mut line = format!("        BalancerMember \"http://{}\"", node.address());
        if upstream.nodes().len() > 1 && weight > 0 {
            line.push_str(&format!(" loadfactor={}", weight.min(100)));
        }
        if node.down || weight == 0 {
            line.push_str(" status=+D");
        } else if node.backup || (routing.strategy() == Strategy::Failover && i > 0) {
            line.push_str(" status=+H");
        }
        out.push_str(&line);
        out.push('\n');
    }

    let mut settings = vec![format!("lbmethod={}", lbmethod(upstream))];
    if let Some(canary) = routing.canary() {
        if let (Some(Stickiness::Cookie), Some(key)) = (canary.stickiness, canary.sticky_key.as_deref()) {
            settings.push(format!("stickysession={}", key.trim()));
        }
    }
    out.push_str(&format!("        ProxySet {}\n", settings.join(" ")));
    out.push_str("    </Proxy>\n");
    out
}

fn lbmethod(upstream: &UpstreamDef) -> &'static str {
    match upstream.routing().algorithm() {
        Some(Algorithm::LeastConn) => "bybusyness",
        _ => "byrequests",
    }
}

fn proxy_pair(route: &Route) -> (String, String) {
    let uri = &route.uri;
    let target = match uri.strategy {
        UriStrategy::Strip => uri.upstream.clone(),
        UriStrategy::Passthrough => uri.public.clone(),
    };
    let public = uri.public.clone();
    let mut target = format!("balancer://{}{}", route.upstream_ref, target);
    // keep the trailing slash symmetric or Apache mangles the joined path
    if public.ends_with('/') && !target.ends_with('/') {
        target.push('/');
    } else if !public.ends_with('/') && target.ends_with('/') {
        target.pop();
    }
    (public, target)
}
