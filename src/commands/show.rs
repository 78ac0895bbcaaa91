use anyhow::{Context, Result};

use vhostctl::Settings;

use crate::ui;

pub fn run(settings: &Settings, name: &str) -> Result<()> {
    let store = super::open_store(settings)?;
    let domain = store.get_domain(name)?;
    let scope = store.scope_of(&domain)?;

    ui::print_step(&format!(
        "{} ({} / {} / {})",
        domain.domain(),
        scope.provider,
        scope.server,
        scope.environment
    ));
    let yaml = serde_yaml::to_string(&domain.to_document())
        .with_context(|| format!("Failed to serialize {}", domain.domain()))?;
    println!("{}", yaml.trim_end());

    println!();
    for route in domain.routes() {
        match store.resolve_upstream(&domain, &route.upstream_ref) {
            Ok(upstream) => {
                let nodes: Vec<String> = upstream.nodes().iter().map(|n| n.address()).collect();
                println!(
                    "  {} {} -> {} [{}] {}",
                    route.name,
                    route.uri.public,
                    upstream.name(),
                    upstream.routing().strategy(),
                    nodes.join(", ")
                );
            }
            Err(e) => ui::print_warning(&format!("{} {}: {}", route.name, route.uri.public, e)),
        }
    }
    Ok(())
}
