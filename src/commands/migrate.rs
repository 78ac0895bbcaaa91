use anyhow::{Result, bail};

use vhostctl::Settings;
use vhostctl::migrate::migrate_tree;

use crate::ui;

pub fn run(settings: &Settings, dry_run: bool) -> Result<()> {
    let spinner = ui::create_spinner(&format!("Migrating documents under {}...", settings.root.display()));
    let report = migrate_tree(settings, dry_run);
    spinner.finish_and_clear();

    let verb = if dry_run { "Would migrate" } else { "Migrated" };
    for path in &report.migrated {
        ui::print_success(&format!("{} {}", verb, path.display()));
    }
    for (path, error) in &report.failures {
        ui::print_error(&format!("{}: {}", path.display(), error));
    }
    ui::print_step(&format!(
        "{} migrated, {} already current, {} failed",
        report.migrated.len(),
        report.unchanged,
        report.failures.len()
    ));

    if !report.failures.is_empty() {
        bail!("{} document(s) could not be migrated", report.failures.len());
    }
    Ok(())
}
