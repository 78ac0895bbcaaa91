use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{ServiceType, is_slug};
use crate::error::ValidationError;
use crate::routing::{self, Algorithm, CanaryMode, RoutingViolation, Stickiness, Strategy};

/// Strategy value older documents used for "simple + weighted".
const LEGACY_WEIGHTED_STRATEGY: &str = "weighted";

fn default_weight() -> u32 {
    100
}

fn default_strategy() -> String {
    Strategy::Simple.as_str().to_string()
}

fn default_base_weight() -> u32 {
    90
}

fn default_canary_weight() -> u32 {
    10
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    Base,
    Canary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tech {
    pub language: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
}

/// One backend endpoint of an upstream pool.
///
/// For canary upstreams `weight` is relative inside the node's group; for
/// every other strategy it is the direct share of traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamNode {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<NodeGroup>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub backup: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub down: bool,
    pub runtime: Runtime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<Tech>,
}

impl UpstreamNode {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            weight: default_weight(),
            group: None,
            backup: false,
            down: false,
            runtime: Runtime {
                host: host.into(),
                port,
            },
            tech: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.runtime.host, self.runtime.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanarySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<Stickiness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky_key: Option<String>,
    #[serde(default = "default_base_weight")]
    pub base_weight: u32,
    #[serde(default = "default_canary_weight")]
    pub canary_weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSpec {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanarySpec>,
}

/// On-disk shape of an upstream. A single-node pool may use the flat
/// `runtime`/`tech` fields instead of `nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSpec {
    pub name: String,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<UpstreamNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech: Option<Tech>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDocument {
    pub upstream: UpstreamSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canary {
    pub mode: CanaryMode,
    pub stickiness: Option<Stickiness>,
    pub sticky_key: Option<String>,
    pub base_weight: u32,
    pub canary_weight: u32,
}

impl Default for Canary {
    fn default() -> Self {
        Self {
            mode: CanaryMode::Percentage,
            stickiness: None,
            sticky_key: None,
            base_weight: default_base_weight(),
            canary_weight: default_canary_weight(),
        }
    }
}

impl Canary {
    pub fn group_weight(&self, group: NodeGroup) -> u32 {
        match group {
            NodeGroup::Base => self.base_weight,
            NodeGroup::Canary => self.canary_weight,
        }
    }
}

/// Validated strategy/algorithm pair. The algorithm is already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    strategy: Strategy,
    algorithm: Option<Algorithm>,
    canary: Option<Canary>,
}

impl Routing {
    pub fn new(
        strategy: Strategy,
        algorithm: Option<Algorithm>,
        canary: Option<Canary>,
    ) -> Result<Self, RoutingViolation> {
        let canary = match (strategy, canary) {
            (Strategy::Canary, c) => Some(c.unwrap_or_default()),
            (_, Some(_)) => return Err(RoutingViolation::CanaryConfigWithoutCanary(strategy)),
            (_, None) => None,
        };
        let algorithm =
            routing::validate_routing_combination(strategy, algorithm, canary.as_ref().map(|c| c.mode))?;

        if let Some(c) = &canary {
            if c.base_weight.checked_add(c.canary_weight) != Some(100) {
                return Err(RoutingViolation::CanarySplit {
                    base: c.base_weight,
                    canary: c.canary_weight,
                });
            }
            if let Some(stickiness) = c.stickiness {
                let has_key = c.sticky_key.as_deref().is_some_and(|k| !k.trim().is_empty());
                if stickiness.needs_key() && !has_key {
                    return Err(RoutingViolation::MissingStickyKey(stickiness));
                }
            }
        }

        Ok(Self {
            strategy,
            algorithm,
            canary,
        })
    }

    pub fn simple() -> Self {
        Self {
            strategy: Strategy::Simple,
            algorithm: Some(Algorithm::RoundRobin),
            canary: None,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn canary(&self) -> Option<&Canary> {
        self.canary.as_ref()
    }

    /// Whether requests are pinned to a node by hashing (ip or uri hashing,
    /// sticky canaries). Backup nodes cannot be combined with hashing.
    pub fn uses_hash_balancing(&self) -> bool {
        if let Some(canary) = &self.canary {
            return canary.stickiness.is_some_and(|s| s != Stickiness::None);
        }
        matches!(self.algorithm, Some(Algorithm::IpHash | Algorithm::HashUri))
    }
}

impl Default for Routing {
    fn default() -> Self {
        Self::simple()
    }
}

/// Either the flat single-node form or an explicit node list. Only exists
/// while reading a document; validated upstreams always hold `nodes`.
enum NodeLayout {
    Single { runtime: Runtime, tech: Option<Tech> },
    Multi(Vec<UpstreamNode>),
}

impl NodeLayout {
    fn from_spec(
        name: &str,
        nodes: Vec<UpstreamNode>,
        runtime: Option<Runtime>,
        tech: Option<Tech>,
    ) -> Result<Self, ValidationError> {
        match (nodes.is_empty(), runtime) {
            (false, None) if tech.is_none() => Ok(NodeLayout::Multi(nodes)),
            (false, None) => Err(ValidationError::new(
                name,
                "tech",
                "top-level tech only applies to the single-node `runtime` form; move it into nodes[]",
            )),
            (true, Some(runtime)) => Ok(NodeLayout::Single { runtime, tech }),
            (false, Some(_)) => Err(ValidationError::new(
                name,
                "nodes",
                "declare either `nodes` or the single-node `runtime`, not both",
            )),
            (true, None) => Err(ValidationError::new(
                name,
                "nodes",
                "declare `nodes` (multi-node) or `runtime` (single node)",
            )),
        }
    }

    fn into_nodes(self, upstream_name: &str) -> Vec<UpstreamNode> {
        match self {
            NodeLayout::Multi(nodes) => nodes,
            NodeLayout::Single { runtime, tech } => vec![UpstreamNode {
                name: format!("{}_default", upstream_name),
                weight: default_weight(),
                group: None,
                backup: false,
                down: false,
                runtime,
                tech,
            }],
        }
    }
}

/// A validated, named backend pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamDef {
    name: String,
    service_type: ServiceType,
    routing: Routing,
    nodes: Vec<UpstreamNode>,
}

impl UpstreamDef {
    pub fn new(
        name: impl Into<String>,
        service_type: ServiceType,
        routing: Routing,
        nodes: Vec<UpstreamNode>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let invalid = |field: String, message: String| ValidationError::new(&name, field, message);

        if !is_slug(&name) {
            return Err(invalid("name".into(), format!("`{}` is not a lowercase slug", name)));
        }
        if nodes.is_empty() {
            return Err(invalid("nodes".into(), "at least one node is required".into()));
        }

        let mut seen = HashSet::new();
        for (i, node) in nodes.iter().enumerate() {
            if node.name.trim().is_empty() {
                return Err(invalid(format!("nodes[{}].name", i), "must not be empty".into()));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(invalid(
                    format!("nodes[{}].name", i),
                    format!("duplicate node `{}`", node.name),
                ));
            }
            if node.runtime.host.trim().is_empty() {
                return Err(invalid(format!("nodes[{}].runtime.host", i), "must not be empty".into()));
            }
            if node.runtime.port == 0 {
                return Err(invalid(format!("nodes[{}].runtime.port", i), "must be 1-65535".into()));
            }
            if node.backup && routing.uses_hash_balancing() {
                return Err(invalid(
                    format!("nodes[{}].backup", i),
                    "backup nodes cannot be used with hash-based balancing".into(),
                ));
            }
            if routing.strategy != Strategy::Canary && node.group.is_some() {
                return Err(invalid(
                    format!("nodes[{}].group", i),
                    format!("groups only apply to canary upstreams (strategy is {})", routing.strategy),
                ));
            }
        }

        match routing.strategy {
            Strategy::Canary => validate_canary_groups(&name, &nodes)?,
            _ if nodes.len() > 1 => {
                let total: u64 = nodes.iter().map(|n| u64::from(n.weight)).sum();
                if total != 100 {
                    return Err(invalid(
                        "nodes".into(),
                        format!("node weights must sum to 100 (got {})", total),
                    ));
                }
            }
            _ => {}
        }

        if routing.strategy == Strategy::BlueGreen && nodes.len() > 1 {
            let live = nodes.iter().filter(|n| !n.down).count();
            if live != 1 {
                return Err(invalid(
                    "nodes".into(),
                    format!("blue_green needs exactly one live node, the rest marked down (got {})", live),
                ));
            }
        }

        Ok(Self {
            name,
            service_type,
            routing,
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn nodes(&self) -> &[UpstreamNode] {
        &self.nodes
    }

    /// Per-node share of traffic, parallel to `nodes()`.
    ///
    /// Canary nodes get `group_weight * node_weight / group_total`, rounded
    /// half up; other strategies use the declared weight as is.
    pub fn effective_weights(&self) -> Vec<u32> {
        let Some(canary) = self.routing.canary() else {
            return self.nodes.iter().map(|n| n.weight).collect();
        };
        self.nodes
            .iter()
            .map(|node| {
                let group = node.group.unwrap_or(NodeGroup::Base);
                let group_total: u64 = self
                    .nodes
                    .iter()
                    .filter(|n| n.group.unwrap_or(NodeGroup::Base) == group)
                    .map(|n| u64::from(n.weight))
                    .sum();
                if group_total == 0 {
                    return 0;
                }
                let scaled = u64::from(canary.group_weight(group)) * u64::from(node.weight);
                ((scaled * 2 + group_total) / (group_total * 2)) as u32
            })
            .collect()
    }

    /// Tech stack advertised by the pool: first base node that declares one.
    pub fn primary_tech(&self) -> Option<&Tech> {
        self.nodes
            .iter()
            .filter(|n| n.group != Some(NodeGroup::Canary))
            .find_map(|n| n.tech.as_ref())
            .or_else(|| self.nodes.iter().find_map(|n| n.tech.as_ref()))
    }

    pub fn to_document(&self) -> UpstreamDocument {
        let routing = &self.routing;
        UpstreamDocument {
            upstream: UpstreamSpec {
                name: self.name.clone(),
                service_type: self.service_type,
                routing: Some(RoutingSpec {
                    strategy: routing.strategy.as_str().to_string(),
                    algorithm: routing.algorithm.map(|a| a.as_str().to_string()),
                    canary: routing.canary.as_ref().map(|c| CanarySpec {
                        mode: Some(c.mode.as_str().to_string()),
                        stickiness: c.stickiness,
                        sticky_key: c.sticky_key.clone(),
                        base_weight: c.base_weight,
                        canary_weight: c.canary_weight,
                    }),
                }),
                nodes: self.nodes.clone(),
                runtime: None,
                tech: None,
            },
        }
    }
}

fn validate_canary_groups(name: &str, nodes: &[UpstreamNode]) -> Result<(), ValidationError> {
    for (i, node) in nodes.iter().enumerate() {
        if node.group.is_none() {
            return Err(ValidationError::new(
                name,
                format!("nodes[{}].group", i),
                "canary upstreams need every node in group `base` or `canary`",
            ));
        }
    }
    for group in [NodeGroup::Base, NodeGroup::Canary] {
        let members: Vec<&UpstreamNode> = nodes.iter().filter(|n| n.group == Some(group)).collect();
        let label = match group {
            NodeGroup::Base => "base",
            NodeGroup::Canary => "canary",
        };
        if members.is_empty() {
            return Err(ValidationError::new(
                name,
                "nodes",
                format!("canary upstreams need at least one `{}` node", label),
            ));
        }
        let total: u64 = members.iter().map(|n| u64::from(n.weight)).sum();
        if total != 100 {
            return Err(ValidationError::new(
                name,
                "nodes",
                format!("`{}` node weights must sum to 100 (got {})", label, total),
            ));
        }
    }
    Ok(())
}

impl TryFrom<UpstreamSpec> for UpstreamDef {
    type Error = ValidationError;

    fn try_from(spec: UpstreamSpec) -> Result<Self, Self::Error> {
        let name = spec.name.trim().to_string();
        let routing = parse_routing(&name, spec.routing)?;
        let nodes = NodeLayout::from_spec(&name, spec.nodes, spec.runtime, spec.tech)?.into_nodes(&name);
        UpstreamDef::new(name, spec.service_type, routing, nodes)
    }
}

impl TryFrom<UpstreamDocument> for UpstreamDef {
    type Error = ValidationError;

    fn try_from(doc: UpstreamDocument) -> Result<Self, Self::Error> {
        UpstreamDef::try_from(doc.upstream)
    }
}

fn parse_routing(name: &str, spec: Option<RoutingSpec>) -> Result<Routing, ValidationError> {
    let Some(spec) = spec else {
        return Ok(Routing::simple());
    };

    let (strategy, mut algorithm) = if spec.strategy.trim().eq_ignore_ascii_case(LEGACY_WEIGHTED_STRATEGY) {
        (Strategy::Simple, Some(Algorithm::Weighted))
    } else {
        let strategy = spec
            .strategy
            .parse::<Strategy>()
            .map_err(|e| ValidationError::new(name, "routing.strategy", e))?;
        (strategy, None)
    };
    if let Some(raw) = &spec.algorithm {
        algorithm = Some(
            raw.parse::<Algorithm>()
                .map_err(|e| ValidationError::new(name, "routing.algorithm", e))?,
        );
    }

    let canary = match spec.canary {
        Some(c) => {
            let mode = match &c.mode {
                Some(raw) => raw
                    .parse::<CanaryMode>()
                    .map_err(|e| ValidationError::new(name, "routing.canary.mode", e))?,
                None => CanaryMode::default(),
            };
            Some(Canary {
                mode,
                stickiness: c.stickiness,
                sticky_key: c.sticky_key,
                base_weight: c.base_weight,
                canary_weight: c.canary_weight,
            })
        }
        None => None,
    };

    Routing::new(strategy, algorithm, canary)
        .map_err(|v| ValidationError::new(name, v.field(), v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, port: u16, weight: u32, group: Option<NodeGroup>) -> UpstreamNode {
        UpstreamNode {
            weight,
            group,
            ..UpstreamNode::new(name, "10.0.0.5", port)
        }
    }

    fn canary_routing(base: u32, canary: u32) -> Routing {
        Routing::new(
            Strategy::Canary,
            None,
            Some(Canary {
                base_weight: base,
                canary_weight: canary,
                ..Canary::default()
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_weights_must_sum_to_100() {
        let nodes = vec![node("a", 3000, 60, None), node("b", 3001, 30, None)];
        let err = UpstreamDef::new("api__identity", ServiceType::Api, Routing::simple(), nodes).unwrap_err();
        assert_eq!(err.resource, "api__identity");
        assert_eq!(err.field, "nodes");
        assert!(err.message.contains("got 90"));

        let nodes = vec![node("a", 3000, 70, None), node("b", 3001, 30, None)];
        assert!(UpstreamDef::new("api__identity", ServiceType::Api, Routing::simple(), nodes).is_ok());
    }

    #[test]
    fn test_single_node_weight_is_free() {
        let nodes = vec![node("a", 3000, 7, None)];
        assert!(UpstreamDef::new("api__x", ServiceType::Api, Routing::simple(), nodes).is_ok());
    }

    #[test]
    fn test_canary_groups_sum_independently() {
        let nodes = vec![
            node("base_a", 3000, 50, Some(NodeGroup::Base)),
            node("base_b", 3001, 50, Some(NodeGroup::Base)),
            node("canary", 3002, 100, Some(NodeGroup::Canary)),
        ];
        let def = UpstreamDef::new("api__identity", ServiceType::Api, canary_routing(80, 20), nodes).unwrap();
        assert_eq!(def.effective_weights(), vec![40, 40, 20]);
        assert_eq!(def.routing().algorithm(), Some(Algorithm::Weighted));

        let nodes = vec![
            node("base_a", 3000, 50, Some(NodeGroup::Base)),
            node("canary", 3002, 100, Some(NodeGroup::Canary)),
        ];
        let err = UpstreamDef::new("api__identity", ServiceType::Api, canary_routing(80, 20), nodes).unwrap_err();
        assert!(err.message.contains("`base` node weights must sum to 100"));
    }

    #[test]
    fn test_canary_needs_both_groups() {
        let nodes = vec![node("base", 3000, 100, Some(NodeGroup::Base))];
        let err = UpstreamDef::new("api__x", ServiceType::Api, canary_routing(90, 10), nodes).unwrap_err();
        assert!(err.message.contains("`canary` node"));
    }

    #[test]
    fn test_canary_split_must_be_100() {
        let err = Routing::new(
            Strategy::Canary,
            None,
            Some(Canary {
                base_weight: 90,
                canary_weight: 20,
                ..Canary::default()
            }),
        )
        .unwrap_err();
        assert_eq!(err, RoutingViolation::CanarySplit { base: 90, canary: 20 });
    }

    #[test]
    fn test_backup_rejected_with_hash_balancing() {
        let routing = Routing::new(Strategy::Simple, Some(Algorithm::IpHash), None).unwrap();
        let mut spare = node("b", 3001, 50, None);
        spare.backup = true;
        let nodes = vec![node("a", 3000, 50, None), spare.clone()];
        let err = UpstreamDef::new("api__x", ServiceType::Api, routing, nodes).unwrap_err();
        assert_eq!(err.field, "nodes[1].backup");

        let sticky = Routing::new(
            Strategy::Canary,
            None,
            Some(Canary {
                stickiness: Some(Stickiness::Ip),
                ..Canary::default()
            }),
        )
        .unwrap();
        let mut canary_spare = node("canary", 3002, 100, Some(NodeGroup::Canary));
        canary_spare.backup = true;
        let nodes = vec![node("base", 3000, 100, Some(NodeGroup::Base)), canary_spare];
        let err = UpstreamDef::new("api__x", ServiceType::Api, sticky, nodes).unwrap_err();
        assert_eq!(err.field, "nodes[1].backup");

        let routing = Routing::new(Strategy::Simple, Some(Algorithm::LeastConn), None).unwrap();
        let nodes = vec![node("a", 3000, 50, None), spare];
        assert!(UpstreamDef::new("api__x", ServiceType::Api, routing, nodes).is_ok());
    }

    #[test]
    fn test_group_outside_canary_rejected() {
        let nodes = vec![node("a", 3000, 100, Some(NodeGroup::Base))];
        let err = UpstreamDef::new("api__x", ServiceType::Api, Routing::simple(), nodes).unwrap_err();
        assert_eq!(err.field, "nodes[0].group");
    }

    #[test]
    fn test_sticky_key_required() {
        let err = Routing::new(
            Strategy::Canary,
            None,
            Some(Canary {
                stickiness: Some(Stickiness::Cookie),
                ..Canary::default()
            }),
        )
        .unwrap_err();
        assert_eq!(err, RoutingViolation::MissingStickyKey(Stickiness::Cookie));
    }

    #[test]
    fn test_blue_green_with_algorithm_is_rejected() {
        let spec: UpstreamSpec = serde_yaml::from_str(
            r#"
name: api__identity
routing: { strategy: blue_green, algorithm: round_robin }
runtime: { host: 127.0.0.1, port: 3000 }
"#,
        )
        .unwrap();
        let err = UpstreamDef::try_from(spec).unwrap_err();
        assert_eq!(err.resource, "api__identity");
        assert_eq!(err.field, "routing.algorithm");
    }

    #[test]
    fn test_blue_green_needs_one_live_node() {
        let routing = Routing::new(Strategy::BlueGreen, None, None).unwrap();
        let mut green = node("green", 3001, 0, None);
        green.down = true;
        let nodes = vec![node("blue", 3000, 100, None), green];
        assert!(UpstreamDef::new("api__x", ServiceType::Api, routing.clone(), nodes).is_ok());

        let nodes = vec![node("blue", 3000, 50, None), node("green", 3001, 50, None)];
        assert!(UpstreamDef::new("api__x", ServiceType::Api, routing, nodes).is_err());
    }

    #[test]
    fn test_flat_runtime_normalizes_to_single_node() {
        let spec: UpstreamSpec = serde_yaml::from_str(
            r#"
name: api__identity
runtime: { host: 127.0.0.1, port: 3000 }
tech: { language: node, version: "20" }
"#,
        )
        .unwrap();
        let def = UpstreamDef::try_from(spec).unwrap();
        assert_eq!(def.nodes().len(), 1);
        assert_eq!(def.nodes()[0].name, "api__identity_default");
        assert_eq!(def.nodes()[0].weight, 100);
        assert_eq!(def.primary_tech().unwrap().language, "node");
        assert_eq!(def.routing(), &Routing::simple());
    }

    #[test]
    fn test_nodes_and_runtime_are_exclusive() {
        let spec: UpstreamSpec = serde_yaml::from_str(
            r#"
name: api__identity
runtime: { host: 127.0.0.1, port: 3000 }
nodes:
  - { name: a, runtime: { host: 127.0.0.1, port: 3001 } }
"#,
        )
        .unwrap();
        assert_eq!(UpstreamDef::try_from(spec).unwrap_err().field, "nodes");

        let spec: UpstreamSpec = serde_yaml::from_str("name: api__identity").unwrap();
        assert_eq!(UpstreamDef::try_from(spec).unwrap_err().field, "nodes");
    }

    #[test]
    fn test_legacy_weighted_strategy() {
        let spec: UpstreamSpec = serde_yaml::from_str(
            r#"
name: api__identity
routing: { strategy: Weighted }
nodes:
  - { name: a, weight: 70, runtime: { host: 10.0.0.1, port: 3000 } }
  - { name: b, weight: 30, runtime: { host: 10.0.0.2, port: 3000 } }
"#,
        )
        .unwrap();
        let def = UpstreamDef::try_from(spec).unwrap();
        assert_eq!(def.routing().strategy(), Strategy::Simple);
        assert_eq!(def.routing().algorithm(), Some(Algorithm::Weighted));
    }

    #[test]
    fn test_document_round_trip() {
        let nodes = vec![
            node("base", 3000, 100, Some(NodeGroup::Base)),
            node("canary", 3001, 100, Some(NodeGroup::Canary)),
        ];
        let def = UpstreamDef::new("api__identity", ServiceType::Api, canary_routing(90, 10), nodes).unwrap();
        let yaml = serde_yaml::to_string(&def.to_document()).unwrap();
        let doc: UpstreamDocument = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(UpstreamDef::try_from(doc).unwrap(), def);
        assert_eq!(def.effective_weights(), vec![90, 10]);
    }
}
