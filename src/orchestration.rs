//! Filesystem ownership of site roots on the target host.

use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use crate::model::DomainConfig;
use crate::remote::{self, RemoteExecutor};
use crate::shell;

pub trait OrchestrationBackend {
    /// Creates `path` if needed and hands it to `user:group`.
    fn ensure_ownership(&self, path: &str, user: &str, group: &str) -> Result<()>;
}

/// Applies ownership through shell commands on a remote host.
pub struct RemoteOrchestration<'a> {
    executor: &'a dyn RemoteExecutor,
    host: String,
    user: Option<String>,
    sudo: bool,
    timeout: Duration,
}

impl<'a> RemoteOrchestration<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor, host: impl Into<String>, user: Option<String>) -> Self {
        Self {
            executor,
            host: host.into(),
            user,
            sudo: false,
            timeout: Duration::from_secs(crate::constants::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, command: &str) -> Result<()> {
        let command = shell::with_sudo(command, self.sudo);
        remote::run(self.executor, &self.host, self.user.as_deref(), &command, self.timeout)?;
        Ok(())
    }
}

impl OrchestrationBackend for RemoteOrchestration<'_> {
    fn ensure_ownership(&self, path: &str, user: &str, group: &str) -> Result<()> {
        self.run(&shell::mkdir_command(path))
            .with_context(|| format!("Failed to create {} on {}", path, self.host))?;
        self.run(&shell::chown_command(path, user, group))
            .with_context(|| format!("Failed to chown {} on {}", path, self.host))?;
        self.run(&shell::chmod_command(path))
            .with_context(|| format!("Failed to chmod {} on {}", path, self.host))?;
        Ok(())
    }
}

/// Applies the domain's `root` ownership. Returns false when the domain
/// declares no root.
pub fn apply_root_ownership(domain: &DomainConfig, backend: &dyn OrchestrationBackend) -> Result<bool> {
    let Some(root) = domain.root() else {
        return Ok(false);
    };
    backend
        .ensure_ownership(&root.path, &root.technical_user, &root.owner)
        .with_context(|| format!("{}: failed to apply root ownership", domain.domain()))?;
    info!(
        "{}: {} owned by {}:{}",
        domain.domain(),
        root.path,
        root.technical_user,
        root.owner
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::model::SiteDocument;
    use crate::remote::CommandOutput;

    #[derive(Default)]
    struct Recorder {
        commands: RefCell<Vec<String>>,
    }

    impl RemoteExecutor for Recorder {
        fn execute(&self, host: &str, user: Option<&str>, command: &str, _: Duration) -> Result<CommandOutput> {
            self.commands
                .borrow_mut()
                .push(format!("{}@{}: {}", user.unwrap_or("-"), host, command));
            Ok(CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn domain(with_root: bool) -> DomainConfig {
        let mut yaml = String::from("domain: shop.example.com\nprovider: example\nserver_web: { type: nginx }\n");
        if with_root {
            yaml.push_str("root: { path: /srv/www/shop, owner: web, technical_user: deploy }\n");
        }
        let doc: SiteDocument = serde_yaml::from_str(&yaml).unwrap();
        DomainConfig::try_from(doc).unwrap()
    }

    #[test]
    fn test_remote_ownership_commands() {
        let recorder = Recorder::default();
        let backend = RemoteOrchestration::new(&recorder, "web1", Some("admin".to_string())).sudo(true);
        assert!(apply_root_ownership(&domain(true), &backend).unwrap());
        assert_eq!(
            *recorder.commands.borrow(),
            vec![
                "admin@web1: sudo mkdir -p /srv/www/shop",
                "admin@web1: sudo chown -R deploy:web /srv/www/shop",
                "admin@web1: sudo chmod -R u+rwX,g+rwX,o-w /srv/www/shop",
            ]
        );
    }

    #[test]
    fn test_no_root_is_a_no_op() {
        let recorder = Recorder::default();
        let backend = RemoteOrchestration::new(&recorder, "web1", None);
        assert!(!apply_root_ownership(&domain(false), &backend).unwrap());
        assert!(recorder.commands.borrow().is_empty());
    }
}
