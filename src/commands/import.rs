use anyhow::{Result, anyhow};
use std::path::Path;

use vhostctl::Settings;
use vhostctl::migrate::{ImportOptions, ImportOutcome, import_parsed_config};
use vhostctl::model::Environment;
use vhostctl::parser::{ConfParser, ConfigParser};

use crate::ui;

pub fn run(
    settings: &Settings,
    conf: &Path,
    provider: Option<String>,
    environment: Option<Environment>,
    dry_run: bool,
) -> Result<()> {
    let parsed = ConfParser
        .parse(conf)
        .ok_or_else(|| anyhow!("{} is not a readable server config", conf.display()))?;
    let store = super::open_store(settings)?;
    let options = ImportOptions {
        provider,
        environment,
        dry_run,
    };

    match import_parsed_config(&store, &parsed, &options)? {
        ImportOutcome::Skipped { domain } => {
            ui::print_step(&format!("{} already has a site document, nothing to do", domain));
        }
        ImportOutcome::Imported { domain, upstream } => {
            let verb = if dry_run { "Would import" } else { "Imported" };
            ui::print_success(&format!(
                "{} {} ({} route(s))",
                verb,
                domain.domain(),
                domain.routes().len()
            ));
            if let Some(upstream) = upstream {
                ui::print_success(&format!(
                    "{} upstream {} ({} node(s))",
                    verb,
                    upstream.name(),
                    upstream.nodes().len()
                ));
            }
        }
    }
    Ok(())
}
