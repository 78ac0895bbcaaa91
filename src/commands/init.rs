use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

use vhostctl::Settings;
use vhostctl::constants::PROVIDER_CATALOG;

use crate::ui;

/// Template settings with comments
const SETTINGS_TEMPLATE: &str = r#"# vhostctl settings
# Relative paths are resolved against the directory of this file.

# Root of the declarative tree (providers/, catalog/)
root: ../.vhostctl

# Allow best-effort heuristics: guessed provider ids and prefix matching
# of live config files (optional, default: false)
dev_mode: false

# Force exact config-file lookup even in dev mode (optional, default: false)
# strict_file_match: true

# Directories holding the live server configs, used by `drift` (optional)
conf_dirs:
  - /etc/nginx/sites-enabled
  # - /etc/apache2/sites-enabled
  # - /etc/caddy/sites
  # - /etc/traefik/dynamic

# Defaults for `verify` and `own` (optional)
remote:
  # user: deploy
  timeout_secs: 30
  sudo: true
"#;

/// Template provider catalog
const CATALOG_TEMPLATE: &str = r#"# Known providers. Domains are matched against domain_suffix first,
# then against id or internal_namespace.
providers:
  - id: example
    name: Example Org
    domain_suffix: example.com
    internal_namespace: exmpl
"#;

pub fn run(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        ui::print_error(&format!("Settings file already exists at: {}", config_path.display()));
        ui::print_step("Use a different path with --config or remove the existing file");
        bail!("refusing to overwrite {}", config_path.display());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(config_path, SETTINGS_TEMPLATE)
        .with_context(|| format!("Failed to write settings file: {}", config_path.display()))?;
    ui::print_success(&format!("Created settings file at: {}", config_path.display()));

    let settings = Settings::load(config_path)?;
    let catalog = settings.root.join(PROVIDER_CATALOG);
    if catalog.exists() {
        ui::print_step(&format!("Keeping existing provider catalog at: {}", catalog.display()));
    } else {
        if let Some(parent) = catalog.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&catalog, CATALOG_TEMPLATE)
            .with_context(|| format!("Failed to write provider catalog: {}", catalog.display()))?;
        ui::print_success(&format!("Created provider catalog at: {}", catalog.display()));
    }
    ui::print_step("Edit both files, then add site documents under providers/");

    Ok(())
}
