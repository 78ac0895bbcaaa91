/// Default root of the declarative tree, relative to the working directory
pub const DEFAULT_ROOT: &str = ".vhostctl";

/// Default settings file consulted by the CLI
pub const DEFAULT_SETTINGS_PATH: &str = "config/vhostctl.yml";

/// Top-level directory holding one subtree per provider
pub const PROVIDERS_DIR: &str = "providers";

/// Directory under a provider holding one subtree per server type
pub const SERVERS_DIR: &str = "servers";

/// Directory (per scope) holding site documents
pub const SITES_DIR: &str = "sites";

/// Directory (per scope) holding upstream documents
pub const UPSTREAMS_DIR: &str = "upstreams";

/// Extension of every declarative document
pub const DOCUMENT_EXT: &str = "yaml";

/// Provider catalog, relative to the root
pub const PROVIDER_CATALOG: &str = "catalog/providers.yaml";

/// Start marker of the metadata block embedded in rendered configs
pub const META_START: &str = "# --- VHOSTCTL META ---";

/// End marker of the metadata block
pub const META_END: &str = "# --- END META ---";

/// Extensions scanned when looking for live server configs
pub const CONFIG_EXTENSIONS: &[&str] = &["conf", "caddy", "yml", "yaml"];

/// Timeout applied to remote commands when settings do not override it
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Suffix format of backups written before a migration rewrites a document
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
