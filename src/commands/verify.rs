use anyhow::Result;
use std::time::Duration;

use vhostctl::Settings;
use vhostctl::model::ServerType;
use vhostctl::remote::{self, SshExecutor};
use vhostctl::shell;

use crate::ui;

pub fn run(settings: &Settings, host: &str, user: Option<&str>, server: ServerType, reload: bool) -> Result<()> {
    let executor = SshExecutor::new(settings.remote.timeout_secs);
    let timeout = Duration::from_secs(settings.remote.timeout_secs);
    let user = user.or(settings.remote.user.as_deref());

    match shell::config_test_command(server) {
        Some(test) => {
            let spinner = ui::create_spinner(&format!("[{}] Testing {} configuration...", host, server));
            let result = remote::run(&executor, host, user, &shell::with_sudo(test, settings.remote.sudo), timeout);
            spinner.finish_and_clear();
            result?;
            ui::print_success(&format!("[{}] {} configuration is valid", host, server));
        }
        None => ui::print_step(&format!("[{}] {} has no configuration test, skipping", host, server)),
    }

    if reload {
        match shell::reload_command(server) {
            Some(command) => {
                remote::run(&executor, host, user, &shell::with_sudo(&command, settings.remote.sudo), timeout)?;
                ui::print_success(&format!("[{}] {} reloaded", host, server));
            }
            None => ui::print_step(&format!("[{}] {} reloads on file change, nothing to do", host, server)),
        }
    }
    Ok(())
}
