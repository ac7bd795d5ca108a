//! Configuration for repoforge.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REPOFORGE_HOME, REPOFORGE_DATABASE,
//!    REPOFORGE_WORKSPACE, GITHUB_TOKEN, GITHUB_OWNER)
//! 2. Config file (.repoforge/config.yaml)
//! 3. Defaults (~/.repoforge)
//!
//! Config file discovery:
//! - Searches current directory and parents for .repoforge/config.yaml
//! - Paths in config file are relative to the .repoforge/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::GitHubConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".repoforge";
const CONFIG_FILE: &str = "config.yaml";
const DATABASE_FILE: &str = "repoforge.db";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub github: Option<GitHubSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
    /// Parent directory of per-job workspaces
    pub workspace: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubSection {
    pub owner: Option<String>,
    pub token: Option<String>,
    pub organization: Option<bool>,
    pub private: Option<bool>,
    pub api_url: Option<String>,
    pub command_timeout_seconds: Option<u64>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Parent directory of per-job workspaces
    pub workspace: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// GitHub and git settings
    pub github: GitHubConfig,
}

impl ResolvedConfig {
    /// Token suitable for printing
    pub fn redacted_token(&self) -> &'static str {
        if self.github.token.is_empty() {
            "(not set)"
        } else {
            "********"
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge env, file and defaults. `env` looks up a variable by name.
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_file, paths, section) = match file {
        Some((path, config)) => (Some(path), config.paths, config.github.unwrap_or_default()),
        None => (None, PathsConfig::default(), GitHubSection::default()),
    };

    // Relative paths in the file are anchored at .repoforge/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    let from_file = |value: &Option<String>| match (&base_dir, value) {
        (Some(base), Some(p)) => Some(resolve_path(base, p)),
        _ => None,
    };

    let home = env("REPOFORGE_HOME")
        .map(PathBuf::from)
        .or_else(|| from_file(&paths.home))
        .unwrap_or(default_home);

    let database = env("REPOFORGE_DATABASE")
        .map(PathBuf::from)
        .or_else(|| from_file(&paths.database))
        .unwrap_or_else(|| home.join(DATABASE_FILE));

    let workspace = env("REPOFORGE_WORKSPACE")
        .map(PathBuf::from)
        .or_else(|| from_file(&paths.workspace))
        .unwrap_or_else(std::env::temp_dir);

    let defaults = GitHubConfig::default();
    let github = GitHubConfig {
        token: env("GITHUB_TOKEN").or(section.token).unwrap_or_default(),
        owner: env("GITHUB_OWNER")
            .or_else(|| env("GITHUB_USERNAME"))
            .or(section.owner)
            .unwrap_or_default(),
        organization: section.organization.unwrap_or(defaults.organization),
        private: section.private.unwrap_or(defaults.private),
        api_url: section.api_url.unwrap_or(defaults.api_url),
        command_timeout: section
            .command_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.command_timeout),
        committer_name: section.committer_name.unwrap_or(defaults.committer_name),
        committer_email: section.committer_email.unwrap_or(defaults.committer_email),
        git_binary: defaults.git_binary,
    };

    ResolvedConfig {
        home,
        database,
        workspace,
        config_file,
        github,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(file, default_home, |key| {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = resolve(None, PathBuf::from("/home/u/.repoforge"), no_env);

        assert_eq!(config.home, PathBuf::from("/home/u/.repoforge"));
        assert_eq!(config.database, PathBuf::from("/home/u/.repoforge/repoforge.db"));
        assert_eq!(config.workspace, std::env::temp_dir());
        assert!(config.config_file.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.command_timeout, Duration::from_secs(300));
        assert_eq!(config.redacted_token(), "(not set)");
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./
  database: ./state/forge.db
github:
  owner: acme
  organization: true
  command_timeout_seconds: 30
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.paths.database, Some("./state/forge.db".to_string()));

        let config = resolve(
            Some((config_path.clone(), parsed)),
            PathBuf::from("/unused"),
            no_env,
        );
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.database.ends_with("state/forge.db"));
        assert_eq!(config.github.owner, "acme");
        assert!(config.github.organization);
        assert_eq!(config.github.command_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            version: "1.0".to_string(),
            paths: PathsConfig {
                workspace: Some("/from/file".to_string()),
                ..Default::default()
            },
            github: Some(GitHubSection {
                owner: Some("file-owner".to_string()),
                token: Some("file-token".to_string()),
                ..Default::default()
            }),
        };
        let env: HashMap<&str, &str> = [
            ("REPOFORGE_WORKSPACE", "/from/env"),
            ("GITHUB_TOKEN", "env-token"),
            ("GITHUB_USERNAME", "env-user"),
        ]
        .into_iter()
        .collect();

        let config = resolve(
            Some((PathBuf::from("/proj/.repoforge/config.yaml"), file)),
            PathBuf::from("/home/u/.repoforge"),
            |key| env.get(key).map(|v| v.to_string()),
        );

        assert_eq!(config.workspace, PathBuf::from("/from/env"));
        assert_eq!(config.github.token, "env-token");
        assert_eq!(config.github.owner, "env-user");
        assert_eq!(config.redacted_token(), "********");
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.repoforge");

        assert_eq!(
            resolve_path(&base, "./state"),
            PathBuf::from("/home/user/project/.repoforge/./state")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
