//! Reading live server configuration back into a comparable record.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;

use crate::constants::{META_END, META_START};
use crate::model::ServerType;

/// What drift detection needs to know about a live config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    pub server_name: Option<String>,
    /// Key/value pairs from the META header, if the file has one.
    pub meta: BTreeMap<String, String>,
    /// Upstream (or balancer/service) name to member addresses.
    pub upstream_blocks: BTreeMap<String, Vec<String>>,
    /// Proxy targets in file order: upstream names or raw addresses.
    pub proxy_pass: Vec<String>,
    /// Flavour detected from the file body, else from META.
    pub server_type: Option<ServerType>,
}

impl ParsedConfig {
    pub fn meta_field(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

pub trait ConfigParser {
    /// `None` when the file cannot be read or makes no sense as a config.
    fn parse(&self, path: &Path) -> Option<ParsedConfig>;
}

/// Line-based parser for the four flavours this crate renders.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfParser;

impl ConfigParser for ConfParser {
    fn parse(&self, path: &Path) -> Option<ParsedConfig> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                return None;
            }
        };
        let parsed = parse_str(&text);
        if parsed.is_none() {
            debug!("{} is not a recognisable server config", path.display());
        }
        parsed
    }
}

pub fn parse_str(text: &str) -> Option<ParsedConfig> {
    let meta = parse_meta(text)?;
    let body = strip_meta(text);
    let detected = detect_server_type(&body);

    let mut parsed = ParsedConfig {
        server_type: detected.or_else(|| meta.get("server_web").and_then(|s| s.parse().ok())),
        meta,
        ..ParsedConfig::default()
    };

    match detected {
        Some(ServerType::Nginx) => parse_nginx(&body, &mut parsed)?,
        Some(ServerType::Apache) => parse_apache(&body, &mut parsed),
        Some(ServerType::Caddy) => parse_caddy(&body, &mut parsed)?,
        Some(ServerType::Traefik) => parse_traefik(text, &mut parsed)?,
        None => {}
    }

    let empty = parsed.meta.is_empty()
        && parsed.server_name.is_none()
        && parsed.upstream_blocks.is_empty()
        && parsed.proxy_pass.is_empty();
    (!empty).then_some(parsed)
}

/// META header fields. `None` if a start marker is never closed.
fn parse_meta(text: &str) -> Option<BTreeMap<String, String>> {
    let mut meta = BTreeMap::new();
    let mut lines = text.lines().map(str::trim);
    if !lines.any(|l| l == META_START) {
        return Some(meta);
    }
    for line in lines {
        if line == META_END {
            return Some(meta);
        }
        let Some(entry) = line.strip_prefix('#') else {
            continue;
        };
        if let Some((key, value)) = entry.split_once(':') {
            meta.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    None
}

fn strip_meta(text: &str) -> String {
    let mut out = String::new();
    let mut inside = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed == META_START {
            inside = true;
        } else if trimmed == META_END {
            inside = false;
        } else if !inside {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Content lines with comments and blank lines removed.
fn code_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .map(|l| l.split_once('#').map_or(l, |(code, _)| code).trim())
        .filter(|l| !l.is_empty())
}

pub fn detect_server_type(body: &str) -> Option<ServerType> {
    let lines: Vec<&str> = code_lines(body).collect();
    let has = |needle: &str| lines.iter().any(|l| l.starts_with(needle));

    if has("<VirtualHost") || has("ServerName ") {
        Some(ServerType::Apache)
    } else if has("server_name ") || has("upstream ") || has("proxy_pass ") {
        Some(ServerType::Nginx)
    } else if has("http:") && lines.iter().any(|l| l.starts_with("routers:")) {
        Some(ServerType::Traefik)
    } else if has("reverse_proxy") {
        Some(ServerType::Caddy)
    } else {
        None
    }
}

fn braces_balanced(body: &str) -> bool {
    let mut depth: i64 = 0;
    for line in code_lines(body) {
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

fn parse_nginx(body: &str, parsed: &mut ParsedConfig) -> Option<()> {
    if !braces_balanced(body) {
        return None;
    }
    let mut current_upstream: Option<String> = None;
    for line in code_lines(body) {
        let statement = line.trim_end_matches(';').trim();
        if let Some(rest) = statement.strip_prefix("upstream ") {
            let name = rest.trim_end_matches('{').trim().to_string();
            parsed.upstream_blocks.entry(name.clone()).or_default();
            current_upstream = Some(name);
            continue;
        }
        if statement == "}" {
            current_upstream = None;
            continue;
        }
        if let Some(name) = &current_upstream {
            if let Some(rest) = statement.strip_prefix("server ") {
                if let Some(address) = rest.split_whitespace().next() {
                    if let Some(members) = parsed.upstream_blocks.get_mut(name) {
                        members.push(address.to_string());
                    }
                }
            }
            continue;
        }
        if let Some(rest) = statement.strip_prefix("server_name ") {
            if parsed.server_name.is_none() {
                parsed.server_name = rest.split_whitespace().next().map(String::from);
            }
        } else if let Some(rest) = statement.strip_prefix("proxy_pass ") {
            parsed.proxy_pass.push(proxy_target(rest));
        }
    }
    Some(())
}

/// `http://name/path` -> `name`.
fn proxy_target(raw: &str) -> String {
    let raw = raw.trim().trim_matches('"');
    let without_scheme = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

fn parse_apache(body: &str, parsed: &mut ParsedConfig) {
    let mut current: Option<String> = None;
    for line in code_lines(body) {
        let mut words = line.split_whitespace();
        let Some(directive) = words.next() else {
            continue;
        };
        match directive {
            "ServerName" if parsed.server_name.is_none() => {
                parsed.server_name = words.next().map(String::from);
            }
            "<Proxy" => {
                let target = line.trim_start_matches("<Proxy").trim().trim_end_matches('>');
                if target.trim_matches('"').starts_with("balancer://") {
                    let name = proxy_target(target);
                    parsed.upstream_blocks.entry(name.clone()).or_default();
                    current = Some(name);
                }
            }
            "</Proxy>" => current = None,
            "BalancerMember" => {
                if let (Some(name), Some(member)) = (&current, words.next()) {
                    if let Some(members) = parsed.upstream_blocks.get_mut(name) {
                        members.push(proxy_target(member));
                    }
                }
            }
            "ProxyPass" => {
                if let Some(target) = words.nth(1) {
                    parsed.proxy_pass.push(proxy_target(target));
                }
            }
            _ => {}
        }
    }
}

fn parse_caddy(body: &str, parsed: &mut ParsedConfig) -> Option<()> {
    if !braces_balanced(body) {
        return None;
    }
    let mut depth = 0usize;
    for line in code_lines(body) {
        if depth == 0 && line.ends_with('{') && parsed.server_name.is_none() {
            let address = line.trim_end_matches('{').trim();
            let address = address.split_once("://").map_or(address, |(_, host)| host);
            parsed.server_name = address.split([',', ' ']).next().map(String::from);
        }
        if let Some(rest) = line.strip_prefix("reverse_proxy") {
            parsed.proxy_pass.extend(
                rest.trim_end_matches('{')
                    .split_whitespace()
                    .map(String::from),
            );
        }
        depth += line.matches('{').count();
        depth = depth.saturating_sub(line.matches('}').count());
    }
    Some(())
}

fn parse_traefik(text: &str, parsed: &mut ParsedConfig) -> Option<()> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    let http = &doc["http"];

    if let Some(routers) = http["routers"].as_mapping() {
        for router in routers.values() {
            if parsed.server_name.is_none() {
                parsed.server_name = router["rule"].as_str().and_then(host_from_rule);
            }
            if let Some(service) = router["service"].as_str() {
                parsed.proxy_pass.push(service.to_string());
            }
        }
    }
    if let Some(services) = http["services"].as_mapping() {
        for (name, service) in services {
            let Some(name) = name.as_str() else {
                continue;
            };
            let members = service["loadBalancer"]["servers"]
                .as_sequence()
                .map(|servers| {
                    servers
                        .iter()
                        .filter_map(|s| s["url"].as_str())
                        .map(proxy_target)
                        .collect()
                })
                .unwrap_or_default();
            parsed.upstream_blocks.insert(name.to_string(), members);
        }
    }
    Some(())
}

fn host_from_rule(rule: &str) -> Option<String> {
    let start = rule.find("Host(`")? + "Host(`".len();
    let end = rule[start..].find('`')?;
    Some(rule[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX: &str = "# --- VHOSTCTL META ---
# provider: example
# server_web: nginx
# tech: node
# --- END META ---

upstream api__identity {
    server 127.0.0.1:3000 weight=90;
    server 127.0.0.1:3001 weight=10;
}

server {
    listen 80;
    server_name dev-identity.example.com www.example.com;

    location / {
        proxy_pass http://api__identity;
    }
}
";

    #[test]
    fn test_nginx() {
        let parsed = parse_str(NGINX).unwrap();
        assert_eq!(parsed.server_type, Some(ServerType::Nginx));
        assert_eq!(parsed.server_name.as_deref(), Some("dev-identity.example.com"));
        assert_eq!(parsed.meta_field("tech"), Some("node"));
        assert_eq!(
            parsed.upstream_blocks["api__identity"],
            vec!["127.0.0.1:3000", "127.0.0.1:3001"]
        );
        assert_eq!(parsed.proxy_pass, vec!["api__identity"]);
    }

    #[test]
    fn test_apache_without_meta() {
        let text = r#"<VirtualHost *:80>
    ServerName shop.example.com
    <Proxy "balancer://api__shop">
        BalancerMember "http://10.0.0.1:8080" loadfactor=50
        BalancerMember "http://10.0.0.2:8080" loadfactor=50
    </Proxy>
    ProxyPass "/" "balancer://api__shop/"
</VirtualHost>
"#;
        let parsed = parse_str(text).unwrap();
        assert_eq!(parsed.server_type, Some(ServerType::Apache));
        assert!(parsed.meta.is_empty());
        assert_eq!(parsed.server_name.as_deref(), Some("shop.example.com"));
        assert_eq!(parsed.upstream_blocks["api__shop"], vec!["10.0.0.1:8080", "10.0.0.2:8080"]);
        assert_eq!(parsed.proxy_pass, vec!["api__shop"]);
    }

    #[test]
    fn test_body_wins_over_meta() {
        let text = NGINX.replace("server_name", "ServerName");
        let text = format!("{}\n<VirtualHost *:80>\n</VirtualHost>\n", text);
        assert_eq!(parse_str(&text).unwrap().server_type, Some(ServerType::Apache));
    }

    #[test]
    fn test_caddy() {
        let text = "shop.example.com {\n    handle_path /api/* {\n        reverse_proxy 10.0.0.1:3000 10.0.0.2:3000 {\n            lb_policy first\n        }\n    }\n}\n";
        let parsed = parse_str(text).unwrap();
        assert_eq!(parsed.server_type, Some(ServerType::Caddy));
        assert_eq!(parsed.server_name.as_deref(), Some("shop.example.com"));
        assert_eq!(parsed.proxy_pass, vec!["10.0.0.1:3000", "10.0.0.2:3000"]);
    }

    #[test]
    fn test_traefik() {
        let text = "http:\n  routers:\n    shop:\n      rule: Host(`shop.example.com`)\n      service: api__shop\n  services:\n    api__shop:\n      loadBalancer:\n        servers:\n          - url: http://10.0.0.1:3000\n";
        let parsed = parse_str(text).unwrap();
        assert_eq!(parsed.server_type, Some(ServerType::Traefik));
        assert_eq!(parsed.server_name.as_deref(), Some("shop.example.com"));
        assert_eq!(parsed.upstream_blocks["api__shop"], vec!["10.0.0.1:3000"]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_str("this is not a config\n").is_none());
        assert!(parse_str("server {\n    server_name a.example.com;\n").is_none());
        assert!(parse_str("# --- VHOSTCTL META ---\n# provider: x\n").is_none());
    }

    #[test]
    fn test_parse_missing_file() {
        assert!(ConfParser.parse(Path::new("/nonexistent/site.conf")).is_none());
    }
}
