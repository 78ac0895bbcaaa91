mod drift;
mod generate;
mod import;
mod init;
mod list;
mod migrate;
mod own;
mod resolve;
mod show;
mod verify;

pub use drift::run as drift;
pub use generate::run as generate;
pub use import::run as import;
pub use init::run as init;
pub use list::run as list;
pub use migrate::run as migrate;
pub use own::run as own;
pub use resolve::run as resolve;
pub use show::run as show;
pub use verify::run as verify;

use anyhow::{Context, Result};
use vhostctl::Settings;
use vhostctl::store::Store;

/// Opens the store, loading the provider catalog under the settings root.
pub fn open_store(settings: &Settings) -> Result<Store> {
    Store::open(settings.clone())
        .with_context(|| format!("Failed to open declarative root {}", settings.root.display()))
}
