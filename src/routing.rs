//! Routing strategy and load-balancing algorithm rules.
//!
//! Strategy is the deployment intent (why traffic is split), algorithm is the
//! distribution mechanics (how it is split among nodes). Only some pairs make
//! sense together; this module owns that table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Simple,
    Canary,
    Failover,
    BlueGreen,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RoundRobin,
    LeastConn,
    IpHash,
    HashUri,
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryMode {
    #[default]
    Percentage,
    Header,
    Cookie,
}

/// Persistence of the canary decision across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stickiness {
    None,
    Request,
    Ip,
    Cookie,
    Header,
}

impl CanaryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CanaryMode::Percentage => "percentage",
            CanaryMode::Header => "header",
            CanaryMode::Cookie => "cookie",
        }
    }
}

impl FromStr for CanaryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // older documents spelled the percentage split "weighted"
            "percentage" | "weighted" => Ok(CanaryMode::Percentage),
            "header" => Ok(CanaryMode::Header),
            "cookie" => Ok(CanaryMode::Cookie),
            other => Err(format!("unknown canary mode `{}`", other)),
        }
    }
}

impl Stickiness {
    pub fn needs_key(self) -> bool {
        matches!(self, Stickiness::Cookie | Stickiness::Header)
    }
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Simple,
        Strategy::Canary,
        Strategy::Failover,
        Strategy::BlueGreen,
        Strategy::Mirror,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Canary => "canary",
            Strategy::Failover => "failover",
            Strategy::BlueGreen => "blue_green",
            Strategy::Mirror => "mirror",
        }
    }
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::RoundRobin,
        Algorithm::LeastConn,
        Algorithm::IpHash,
        Algorithm::HashUri,
        Algorithm::Weighted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::LeastConn => "least_conn",
            Algorithm::IpHash => "ip_hash",
            Algorithm::HashUri => "hash_uri",
            Algorithm::Weighted => "weighted",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|st| st.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown routing strategy `{}`", s))
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown routing algorithm `{}`", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingViolation {
    #[error("blue_green switches all traffic at once and takes no algorithm (got `{0}`)")]
    AlgorithmNotAllowed(Algorithm),

    #[error("{strategy} + {algorithm} is not a valid combination; allowed: {allowed}")]
    IncompatibleAlgorithm {
        strategy: Strategy,
        algorithm: Algorithm,
        allowed: String,
    },

    #[error("canary mode `{0:?}` only applies to the canary strategy (got {1})")]
    CanaryModeWithoutCanary(CanaryMode, Strategy),

    #[error("a canary block only applies to the canary strategy (got {0})")]
    CanaryConfigWithoutCanary(Strategy),

    #[error("base_weight + canary_weight must be 100 (got {base} + {canary})")]
    CanarySplit { base: u32, canary: u32 },

    #[error("stickiness `{0:?}` needs a sticky_key")]
    MissingStickyKey(Stickiness),
}

impl RoutingViolation {
    /// Document field the violation points at.
    pub fn field(&self) -> &'static str {
        match self {
            RoutingViolation::AlgorithmNotAllowed(_) | RoutingViolation::IncompatibleAlgorithm { .. } => {
                "routing.algorithm"
            }
            RoutingViolation::CanaryModeWithoutCanary(..) => "routing.canary.mode",
            RoutingViolation::CanaryConfigWithoutCanary(_) => "routing.canary",
            RoutingViolation::CanarySplit { .. } => "routing.canary.base_weight",
            RoutingViolation::MissingStickyKey(_) => "routing.canary.sticky_key",
        }
    }
}

/// Algorithms a strategy may be paired with. Empty for blue_green.
pub fn allowed_algorithms(strategy: Strategy) -> &'static [Algorithm] {
    match strategy {
        Strategy::Simple => &Algorithm::ALL,
        Strategy::Canary => &[Algorithm::Weighted],
        Strategy::Failover => &[Algorithm::RoundRobin, Algorithm::LeastConn],
        Strategy::BlueGreen => &[],
        Strategy::Mirror => &[Algorithm::RoundRobin],
    }
}

pub fn requires_algorithm(strategy: Strategy) -> bool {
    strategy != Strategy::BlueGreen
}

/// Algorithm used when a document leaves it out.
pub fn default_algorithm(strategy: Strategy) -> Option<Algorithm> {
    match strategy {
        Strategy::BlueGreen => None,
        Strategy::Canary => Some(Algorithm::Weighted),
        _ => Some(Algorithm::RoundRobin),
    }
}

/// Checks a strategy/algorithm/canary-mode triple against the table and
/// returns the effective algorithm (defaulted when absent).
pub fn validate_routing_combination(
    strategy: Strategy,
    algorithm: Option<Algorithm>,
    canary_mode: Option<CanaryMode>,
) -> Result<Option<Algorithm>, RoutingViolation> {
    if let Some(mode) = canary_mode {
        if strategy != Strategy::Canary {
            return Err(RoutingViolation::CanaryModeWithoutCanary(mode, strategy));
        }
    }

    let Some(algorithm) = algorithm else {
        return Ok(default_algorithm(strategy));
    };

    if strategy == Strategy::BlueGreen {
        return Err(RoutingViolation::AlgorithmNotAllowed(algorithm));
    }

    let allowed = allowed_algorithms(strategy);
    if !allowed.contains(&algorithm) {
        let allowed = allowed
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(RoutingViolation::IncompatibleAlgorithm {
            strategy,
            algorithm,
            allowed,
        });
    }

    Ok(Some(algorithm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_exhaustive() {
        for strategy in Strategy::ALL {
            for algorithm in Algorithm::ALL {
                let legal = allowed_algorithms(strategy).contains(&algorithm);
                let result = validate_routing_combination(strategy, Some(algorithm), None);
                assert_eq!(
                    result.is_ok(),
                    legal,
                    "{} + {} should be {}",
                    strategy,
                    algorithm,
                    if legal { "accepted" } else { "rejected" }
                );
            }
        }
    }

    #[test]
    fn test_blue_green_forbids_algorithm() {
        let err = validate_routing_combination(Strategy::BlueGreen, Some(Algorithm::RoundRobin), None)
            .unwrap_err();
        assert_eq!(err, RoutingViolation::AlgorithmNotAllowed(Algorithm::RoundRobin));
        assert_eq!(
            validate_routing_combination(Strategy::BlueGreen, None, None),
            Ok(None)
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            validate_routing_combination(Strategy::Canary, None, None),
            Ok(Some(Algorithm::Weighted))
        );
        for strategy in [Strategy::Simple, Strategy::Failover, Strategy::Mirror] {
            assert_eq!(
                validate_routing_combination(strategy, None, None),
                Ok(Some(Algorithm::RoundRobin))
            );
        }
    }

    #[test]
    fn test_canary_mode_requires_canary_strategy() {
        assert!(validate_routing_combination(Strategy::Canary, None, Some(CanaryMode::Cookie)).is_ok());
        assert!(matches!(
            validate_routing_combination(Strategy::Simple, None, Some(CanaryMode::Header)),
            Err(RoutingViolation::CanaryModeWithoutCanary(..))
        ));
    }

    #[test]
    fn test_incompatible_lists_allowed() {
        let err = validate_routing_combination(Strategy::Failover, Some(Algorithm::IpHash), None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failover + ip_hash is not a valid combination; allowed: round_robin, least_conn"
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("blue_green".parse::<Strategy>(), Ok(Strategy::BlueGreen));
        assert_eq!(" Least_Conn ".parse::<Algorithm>(), Ok(Algorithm::LeastConn));
        assert!("sticky".parse::<Strategy>().is_err());
        assert!(requires_algorithm(Strategy::Mirror));
        assert!(!requires_algorithm(Strategy::BlueGreen));
    }
}
