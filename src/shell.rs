//! Shell command construction for the web-server tools.
//!
//! Anything that ends up in a remote command line goes through [`escape`].

use crate::model::ServerType;

/// Quotes `s` for a POSIX shell.
///
/// Plain words (alphanumerics, `_-./:`) are returned as is; anything else is
/// wrapped in single quotes with embedded quotes written as `'\''`.
///
/// ```
/// use vhostctl::shell::escape;
/// assert_eq!(escape("/srv/www"), "/srv/www");
/// assert_eq!(escape("it's"), "'it'\\''s'");
/// assert_eq!(escape(""), "''");
/// ```
pub fn escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let plain = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':'));
    if plain {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

pub fn with_sudo(command: &str, sudo: bool) -> String {
    if sudo { format!("sudo {}", command) } else { command.to_string() }
}

/// Syntax check of the live configuration. Traefik has none: it validates
/// dynamic files as it watches them.
pub fn config_test_command(server: ServerType) -> Option<&'static str> {
    match server {
        ServerType::Nginx => Some("nginx -t"),
        ServerType::Apache => Some("apachectl configtest"),
        ServerType::Caddy => Some("caddy validate --config /etc/caddy/Caddyfile"),
        ServerType::Traefik => None,
    }
}

/// Graceful reload. `None` for Traefik, which picks up file changes itself.
pub fn reload_command(server: ServerType) -> Option<String> {
    let unit = match server {
        ServerType::Nginx => "nginx",
        ServerType::Apache => "apache2",
        ServerType::Caddy => "caddy",
        ServerType::Traefik => return None,
    };
    Some(format!("systemctl reload {}", unit))
}

pub fn mkdir_command(path: &str) -> String {
    format!("mkdir -p {}", escape(path))
}

pub fn chown_command(path: &str, user: &str, group: &str) -> String {
    format!("chown -R {} {}", escape(&format!("{}:{}", user, group)), escape(path))
}

/// Owner and group read/write, others read-only.
pub fn chmod_command(path: &str) -> String {
    format!("chmod -R u+rwX,g+rwX,o-w {}", escape(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_words() {
        assert_eq!(escape("nginx"), "nginx");
        assert_eq!(escape("/var/www/shop.example.com"), "/var/www/shop.example.com");
        assert_eq!(escape("deploy:www-data"), "deploy:www-data");
    }

    #[test]
    fn test_escape_quotes_everything_else() {
        assert_eq!(escape("my site"), "'my site'");
        assert_eq!(escape("; rm -rf /"), "'; rm -rf /'");
        assert_eq!(escape("$(whoami)"), "'$(whoami)'");
        assert_eq!(escape("it's"), "'it'\\''s'");
        assert_eq!(escape("héllo"), "'héllo'");
    }

    #[test]
    fn test_server_commands() {
        assert_eq!(config_test_command(ServerType::Nginx), Some("nginx -t"));
        assert_eq!(config_test_command(ServerType::Traefik), None);
        assert_eq!(reload_command(ServerType::Apache).as_deref(), Some("systemctl reload apache2"));
        assert_eq!(reload_command(ServerType::Traefik), None);
        assert_eq!(with_sudo("nginx -t", true), "sudo nginx -t");
    }

    #[test]
    fn test_ownership_commands() {
        assert_eq!(
            chown_command("/srv/www/my site", "deploy", "web"),
            "chown -R deploy:web '/srv/www/my site'"
        );
        assert_eq!(chmod_command("/srv/www"), "chmod -R u+rwX,g+rwX,o-w /srv/www");
        assert_eq!(mkdir_command("/srv/www"), "mkdir -p /srv/www");
    }
}
