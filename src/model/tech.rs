//! Known runtime stacks and their version/package managers.

use super::Tech;

pub struct Capabilities {
    pub language: &'static str,
    pub providers: &'static [&'static str],
    pub managers: &'static [&'static str],
    pub default_version: &'static str,
    pub default_provider: &'static str,
    pub default_manager: &'static str,
}

pub const CATALOG: &[Capabilities] = &[
    Capabilities {
        language: "node",
        providers: &["volta", "nvm", "asdf", "system"],
        managers: &["npm", "yarn", "pnpm", "bun"],
        default_version: "20",
        default_provider: "volta",
        default_manager: "yarn",
    },
    Capabilities {
        language: "php",
        providers: &["system"],
        managers: &["composer"],
        default_version: "7.2",
        default_provider: "system",
        default_manager: "composer",
    },
    Capabilities {
        language: "python",
        providers: &["pyenv", "system"],
        managers: &["pip", "poetry", "pipenv"],
        default_version: "3.11",
        default_provider: "system",
        default_manager: "pip",
    },
];

pub fn capabilities(language: &str) -> Option<&'static Capabilities> {
    let language = language.trim().to_lowercase();
    CATALOG.iter().find(|c| c.language == language)
}

fn is_manager(value: &str) -> bool {
    CATALOG.iter().any(|c| c.managers.iter().any(|m| *m == value))
}

/// Fills provider/manager defaults for known languages and repairs the
/// common mistake of writing a package manager in the provider slot.
/// Unknown languages are returned lowercased but otherwise untouched.
pub fn normalize(tech: &Tech) -> Tech {
    let language = tech.language.trim().to_lowercase();
    let provider = tech.provider.as_deref().map(|p| p.trim().to_lowercase());
    let manager = tech.manager.as_deref().map(|m| m.trim().to_lowercase());

    let Some(caps) = capabilities(&language) else {
        return Tech {
            language,
            version: tech.version.trim().to_string(),
            provider,
            manager,
        };
    };

    let provider = match provider.as_deref() {
        Some(p) if caps.providers.iter().any(|known| *known == p) => p.to_string(),
        Some(p) if is_manager(p) => "system".to_string(),
        _ => caps.default_provider.to_string(),
    };
    let manager = match manager.as_deref() {
        Some(m) if caps.managers.iter().any(|known| *known == m) => m.to_string(),
        _ => caps.default_manager.to_string(),
    };
    let version = match tech.version.trim() {
        "" => caps.default_version.to_string(),
        v => v.to_string(),
    };

    Tech {
        language,
        version,
        provider: Some(provider),
        manager: Some(manager),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(language: &str, version: &str, provider: Option<&str>, manager: Option<&str>) -> Tech {
        Tech {
            language: language.to_string(),
            version: version.to_string(),
            provider: provider.map(String::from),
            manager: manager.map(String::from),
        }
    }

    #[test]
    fn test_manager_in_provider_slot() {
        let fixed = normalize(&tech("PHP", "7.4", Some("composer"), None));
        assert_eq!(fixed.language, "php");
        assert_eq!(fixed.provider.as_deref(), Some("system"));
        assert_eq!(fixed.manager.as_deref(), Some("composer"));
    }

    #[test]
    fn test_defaults_for_node() {
        let fixed = normalize(&tech("node", "", None, Some("pnpm")));
        assert_eq!(fixed.version, "20");
        assert_eq!(fixed.provider.as_deref(), Some("volta"));
        assert_eq!(fixed.manager.as_deref(), Some("pnpm"));
    }

    #[test]
    fn test_unknown_language_untouched() {
        let fixed = normalize(&tech("Ruby", "3.3", Some("rbenv"), None));
        assert_eq!(fixed, tech("ruby", "3.3", Some("rbenv"), None));
    }
}
