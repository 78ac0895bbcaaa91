use anyhow::{Result, bail};

use vhostctl::Settings;
use vhostctl::catalog::{UpstreamMatch, UpstreamQuery, resolve_upstream_by_convention};

use crate::ui;

pub fn run(settings: &Settings, query: &UpstreamQuery<'_>) -> Result<()> {
    let store = super::open_store(settings)?;
    match resolve_upstream_by_convention(settings, store.catalog(), query)? {
        UpstreamMatch::Exact { reference, path } => {
            ui::print_success(&format!("{} ({})", reference, path.display()));
        }
        UpstreamMatch::Candidates(candidates) => {
            ui::print_warning("No upstream with the conventional name; candidates in the same scope:");
            for candidate in candidates {
                println!("  {}", candidate);
            }
        }
        UpstreamMatch::NotFound { expected } => {
            bail!("no upstream found, expected {}", expected);
        }
    }
    Ok(())
}
