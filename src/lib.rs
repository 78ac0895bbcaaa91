//! Declarative web-server configuration management.
//!
//! Desired state (sites and upstream pools, stored as YAML under a fixed
//! provider/server/environment layout) is validated on construction, rendered
//! deterministically into Nginx, Apache, Caddy or Traefik configuration, and
//! compared against the live configuration to report drift.
//!
//! - [`routing`]: legal strategy/algorithm pairs.
//! - [`model`]: sites, routes, upstreams and their invariants.
//! - [`catalog`]: provider aliases and convention paths.
//! - [`store`]: loading and saving documents.
//! - [`render`]: config generation per server type.
//! - [`parser`] / [`drift`]: reading live configs and diffing them.
//! - [`migrate`]: one-shot upgrades of older document shapes.
//! - [`remote`] / [`orchestration`] / [`shell`]: thin wrappers over ssh and
//!   the server tools, used by the CLI.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod drift;
pub mod error;
pub mod migrate;
pub mod model;
pub mod orchestration;
pub mod parser;
pub mod remote;
pub mod render;
pub mod routing;
pub mod shell;
pub mod store;

pub use config::Settings;
pub use error::{Error, Result, ValidationError};
