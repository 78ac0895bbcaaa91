use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

use vhostctl::render::{self, fingerprint};
use vhostctl::Settings;
use vhostctl::store::write_atomic;

use crate::ui;

pub fn run(settings: &Settings, name: &str, out: Option<&Path>, check: bool) -> Result<()> {
    let store = super::open_store(settings)?;
    let domain = store.get_domain(name)?;
    let resolver = store.resolver_for(&domain)?;
    let rendered = render::generate(&domain, &resolver)?;

    let Some(out) = out else {
        print!("{}", rendered);
        return Ok(());
    };

    let path = out.join(render::config_file_name(&domain));
    let current = match fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let unchanged = current.as_deref().map(fingerprint) == Some(fingerprint(&rendered));

    if check {
        if unchanged {
            ui::print_success(&format!("{} is up to date", path.display()));
            return Ok(());
        }
        ui::print_warning(&format!("{} would change", path.display()));
        bail!("{} is out of date", path.display());
    }

    if unchanged {
        ui::print_success(&format!("{} unchanged", path.display()));
        return Ok(());
    }
    fs::create_dir_all(out).with_context(|| format!("Failed to create directory: {}", out.display()))?;
    write_atomic(&path, &rendered, domain.domain())?;
    ui::print_success(&format!("Wrote {} ({})", path.display(), &fingerprint(&rendered)[..12]));
    Ok(())
}
