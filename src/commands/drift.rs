use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;

use vhostctl::Settings;
use vhostctl::drift::{self, Severity};
use vhostctl::parser::ConfParser;

use crate::ui;

pub fn run(settings: &Settings, only: Option<&str>, json: bool) -> Result<()> {
    let store = super::open_store(settings)?;
    let domains = match only {
        Some(name) => {
            let domain = store.get_domain(name)?;
            BTreeMap::from([(domain.domain().to_string(), domain)])
        }
        None => {
            let report = store.load_all();
            for failure in &report.failures {
                ui::print_warning(&format!("Skipped {}: {}", failure.path.display(), failure.error));
            }
            report.domains
        }
    };

    let spinner = (!json).then(|| ui::create_spinner(&format!("Checking {} domain(s)...", domains.len())));
    let diffs = drift::detect_drift(&store, &ConfParser, &domains);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let errors = diffs.iter().filter(|d| d.severity == Severity::Error).count();
    if json {
        let text = serde_json::to_string_pretty(&diffs).context("Failed to serialize drift report")?;
        println!("{}", text);
    } else if diffs.is_empty() {
        ui::print_success(&format!("No drift across {} domain(s)", domains.len()));
    } else {
        ui::print_drift(&diffs);
        println!();
        ui::print_step(&format!("{} difference(s), {} error(s)", diffs.len(), errors));
    }

    if errors > 0 {
        bail!("drift detected in {} field(s)", errors);
    }
    Ok(())
}
