mod commands;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vhostctl::Settings;
use vhostctl::catalog::UpstreamQuery;
use vhostctl::constants::DEFAULT_SETTINGS_PATH;
use vhostctl::model::{Environment, ServerType, ServiceType};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Root of the declarative tree (overrides the settings file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Allow best-effort heuristics (provider guessing, fuzzy config lookup)
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a settings file and a provider catalog template
    Init,
    /// List every declared domain
    List,
    /// Show a domain and the upstreams its routes resolve to
    Show { domain: String },
    /// Render the server configuration of a domain
    Generate {
        domain: String,
        /// Write into this directory instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Only report whether the file in --out would change
        #[arg(long, requires = "out")]
        check: bool,
    },
    /// Compare declared domains against the live server configs
    Drift {
        /// Check a single domain
        #[arg(long)]
        domain: Option<String>,
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },
    /// Rewrite legacy documents to the current format
    Migrate {
        #[arg(long)]
        dry_run: bool,
    },
    /// Create declarative documents from an existing server config
    Import {
        conf: PathBuf,
        #[arg(long)]
        dry_run: bool,
        /// Provider used when the config carries none
        #[arg(long)]
        provider: Option<String>,
        /// Environment used when the config carries none
        #[arg(long = "env")]
        environment: Option<Environment>,
    },
    /// Find an upstream by naming convention
    Resolve {
        provider: String,
        environment: Environment,
        server: ServerType,
        service_type: ServiceType,
        slug: String,
        /// Domain the upstream is for, used to resolve the provider
        #[arg(long)]
        domain: Option<String>,
    },
    /// Test (and optionally reload) the web server configuration on a host
    Verify {
        #[arg(long)]
        host: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value = "nginx")]
        server: ServerType,
        #[arg(long)]
        reload: bool,
    },
    /// Apply the root ownership of a domain on a host
    Own {
        domain: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        user: Option<String>,
    },
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    if let Some(root) = &cli.root {
        settings.root = root.clone();
    }
    if cli.dev {
        settings.dev_mode = true;
    }
    Ok(settings)
}

fn dispatch(cli: &Cli) -> Result<()> {
    if let Commands::Init = cli.command {
        return commands::init(&cli.config);
    }

    let settings = load_settings(cli)?;
    log::debug!("Settings: {:?}", settings);

    match &cli.command {
        Commands::Init => Ok(()),
        Commands::List => commands::list(&settings),
        Commands::Show { domain } => commands::show(&settings, domain),
        Commands::Generate { domain, out, check } => commands::generate(&settings, domain, out.as_deref(), *check),
        Commands::Drift { domain, json } => commands::drift(&settings, domain.as_deref(), *json),
        Commands::Migrate { dry_run } => commands::migrate(&settings, *dry_run),
        Commands::Import {
            conf,
            dry_run,
            provider,
            environment,
        } => commands::import(&settings, conf, provider.clone(), *environment, *dry_run),
        Commands::Resolve {
            provider,
            environment,
            server,
            service_type,
            slug,
            domain,
        } => {
            let query = UpstreamQuery {
                provider: provider.as_str(),
                server: *server,
                environment: *environment,
                service_type: *service_type,
                slug: slug.as_str(),
                domain: domain.as_deref(),
            };
            commands::resolve(&settings, &query)
        }
        Commands::Verify {
            host,
            user,
            server,
            reload,
        } => commands::verify(&settings, host, user.as_deref(), *server, *reload),
        Commands::Own { domain, host, user } => commands::own(&settings, domain, host, user.as_deref()),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = dispatch(&cli) {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
