use anyhow::Result;
use std::time::Duration;

use vhostctl::Settings;
use vhostctl::orchestration::{RemoteOrchestration, apply_root_ownership};
use vhostctl::remote::SshExecutor;

use crate::ui;

pub fn run(settings: &Settings, name: &str, host: &str, user: Option<&str>) -> Result<()> {
    let store = super::open_store(settings)?;
    let domain = store.get_domain(name)?;

    let executor = SshExecutor::new(settings.remote.timeout_secs);
    let user = user.map(str::to_string).or_else(|| settings.remote.user.clone());
    let backend = RemoteOrchestration::new(&executor, host, user)
        .sudo(settings.remote.sudo)
        .timeout(Duration::from_secs(settings.remote.timeout_secs));

    let spinner = ui::create_spinner(&format!("[{}] Applying ownership for {}...", host, domain.domain()));
    let applied = apply_root_ownership(&domain, &backend);
    spinner.finish_and_clear();

    if applied? {
        ui::print_success(&format!("[{}] Ownership applied for {}", host, domain.domain()));
    } else {
        ui::print_step(&format!("{} declares no root, nothing to do", domain.domain()));
    }
    Ok(())
}
