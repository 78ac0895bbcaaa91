//! Traefik file-provider dynamic configuration.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{Renderer, ResolvedSite};
use crate::error::{Error, Result};
use crate::model::{NodeGroup, UpstreamDef, UpstreamNode, UriStrategy};
use crate::routing::{Stickiness, Strategy};

const ENTRY_POINT: &str = "web";

#[derive(Serialize)]
struct Dynamic {
    http: Http,
}

#[derive(Serialize)]
struct Http {
    routers: BTreeMap<String, Router>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    middlewares: BTreeMap<String, Middleware>,
    services: BTreeMap<String, Service>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Router {
    rule: String,
    service: String,
    entry_points: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    middlewares: Vec<String>,
}

// Plain structs with optional members: serde_yaml writes enum variants as
// YAML tags, which Traefik does not read.
#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Middleware {
    #[serde(skip_serializing_if = "Option::is_none")]
    strip_prefix: Option<StripPrefix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    add_prefix: Option<AddPrefix>,
}

#[derive(Serialize)]
struct StripPrefix {
    prefixes: Vec<String>,
}

#[derive(Serialize)]
struct AddPrefix {
    prefix: String,
}

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancer: Option<LoadBalancer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weighted: Option<Weighted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failover: Option<Failover>,
}

#[derive(Serialize)]
struct LoadBalancer {
    servers: Vec<Server>,
}

#[derive(Serialize)]
struct Weighted {
    services: Vec<WeightedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sticky: Option<Sticky>,
}

#[derive(Serialize)]
struct Failover {
    service: String,
    fallback: String,
}

#[derive(Serialize)]
struct Server {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<u32>,
}

#[derive(Serialize)]
struct WeightedRef {
    name: String,
    weight: u32,
}

#[derive(Serialize)]
struct Sticky {
    cookie: StickyCookie,
}

#[derive(Serialize)]
struct StickyCookie {
    name: String,
}

pub struct TraefikRenderer;

impl Renderer for TraefikRenderer {
    fn render(&self, site: &ResolvedSite<'_>) -> Result<String> {
        let domain = site.domain;
        let host = domain.domain();
        let key_prefix = host.replace('.', "_");

        let mut routers = BTreeMap::new();
        let mut middlewares = BTreeMap::new();
        for route in domain.routes() {
            let key = format!("{}__{}", key_prefix, route.name);
            let uri = &route.uri;
            let rule = if uri.public == "/" {
                format!("Host(`{}`)", host)
            } else {
                format!("Host(`{}`) && PathPrefix(`{}`)", host, uri.public)
            };

            let mut chain = Vec::new();
            if uri.strategy == UriStrategy::Strip && uri.public != "/" {
                let strip = format!("{}-strip", key);
                middlewares.insert(
                    strip.clone(),
                    Middleware {
                        strip_prefix: Some(StripPrefix {
                            prefixes: vec![uri.public.trim_end_matches('/').to_string()],
                        }),
                        ..Middleware::default()
                    },
                );
                chain.push(strip);
                let upstream_prefix = uri.upstream.trim_end_matches('/');
                if !upstream_prefix.is_empty() {
                    let add = format!("{}-prefix", key);
                    middlewares.insert(
                        add.clone(),
                        Middleware {
                            add_prefix: Some(AddPrefix {
                                prefix: upstream_prefix.to_string(),
                            }),
                            ..Middleware::default()
                        },
                    );
                    chain.push(add);
                }
            }

            routers.insert(
                key,
                Router {
                    rule,
                    service: route.upstream_ref.clone(),
                    entry_points: vec![ENTRY_POINT.to_string()],
                    middlewares: chain,
                },
            );
        }

        let mut services = BTreeMap::new();
        for upstream in site.upstreams.values() {
            add_services(&mut services, upstream);
        }

        let dynamic = Dynamic {
            http: Http {
                routers,
                middlewares,
                services,
            },
        };
        let yaml = serde_yaml::to_string(&dynamic).map_err(|source| Error::Render {
            resource: host.to_string(),
            source,
        })?;
        Ok(format!("{}{}", site.meta_block(), yaml))
    }
}

fn load_balancer<'a>(nodes: impl Iterator<Item = (&'a UpstreamNode, u32)>) -> Service {
    let live: Vec<(&UpstreamNode, u32)> = nodes.filter(|(n, w)| !n.down && *w > 0).collect();
    let multi = live.len() > 1;
    Service {
        load_balancer: Some(LoadBalancer {
            servers: live
                .into_iter()
                .map(|(node, weight)| Server {
                    url: format!("http://{}", node.address()),
                    weight: multi.then_some(weight),
                })
                .collect(),
        }),
        ..Service::default()
    }
}

fn add_services(services: &mut BTreeMap<String, Service>, upstream: &UpstreamDef) {
    let name = upstream.name().to_string();
    let nodes: Vec<(&UpstreamNode, u32)> = upstream.nodes().iter().zip(upstream.effective_weights()).collect();
    let routing = upstream.routing();

    if let Some(canary) = routing.canary() {
        let mut refs = Vec::new();
        for (group, label) in [(NodeGroup::Base, "base"), (NodeGroup::Canary, "canary")] {
            let member = format!("{}__{}", name, label);
            let in_group = nodes.iter().copied().filter(|(n, _)| n.group == Some(group));
            // relative weights inside the group; the split lives on the parent
            services.insert(member.clone(), load_balancer(in_group.map(|(n, _)| (n, n.weight))));
            refs.push(WeightedRef {
                name: member,
                weight: canary.group_weight(group),
            });
        }
        let sticky = match (canary.stickiness, canary.sticky_key.as_deref()) {
            (Some(Stickiness::Cookie), Some(key)) => Some(Sticky {
                cookie: StickyCookie {
                    name: key.trim().to_string(),
                },
            }),
            _ => None,
        };
        let weighted = Weighted { services: refs, sticky };
        services.insert(
            name,
            Service {
                weighted: Some(weighted),
                ..Service::default()
            },
        );
        return;
    }

    if routing.strategy() == Strategy::Failover && nodes.len() > 1 {
        let primary = format!("{}__primary", name);
        let fallback = format!("{}__fallback", name);
        services.insert(primary.clone(), load_balancer(nodes.iter().copied().take(1)));
        services.insert(fallback.clone(), load_balancer(nodes.iter().copied().skip(1)));
        services.insert(
            name,
            Service {
                failover: Some(Failover {
                    service: primary,
                    fallback,
                }),
                ..Service::default()
            },
        );
        return;
    }

    services.insert(name, load_balancer(nodes.into_iter()));
}
