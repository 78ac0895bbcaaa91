use anyhow::Result;

use vhostctl::Settings;

use crate::ui;

pub fn run(settings: &Settings) -> Result<()> {
    let store = super::open_store(settings)?;
    let report = store.load_all();

    ui::print_step(&format!(
        "{} domain(s) under {}",
        report.domains.len(),
        store.root().display()
    ));
    println!();
    println!("{:<36} {:<12} {:<6} {:<8} {}", "DOMAIN", "PROVIDER", "ENV", "SERVER", "ROUTES");
    println!("{}", "─".repeat(72));
    for domain in report.domains.values() {
        println!(
            "{:<36} {:<12} {:<6} {:<8} {}",
            domain.domain(),
            domain.provider(),
            domain.environment(),
            domain.server_type(),
            domain.routes().len()
        );
    }

    if !report.failures.is_empty() {
        println!();
        for failure in &report.failures {
            ui::print_warning(&format!("Skipped {}: {}", failure.path.display(), failure.error));
        }
    }
    Ok(())
}
