//! Layered configuration for imgload.
//!
//! Sources are merged in order, later ones overriding earlier ones:
//! 1. built-in defaults,
//! 2. `config.toml` in the platform configuration directory, if present,
//! 3. an explicitly requested file (TOML, YAML or JSON, by extension),
//! 4. `IMGLOAD_`-prefixed environment variables, with `__` separating
//!    nested keys (`IMGLOAD_CACHE__POLICY=memory`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use imgload_fetch::CachePolicy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "IMGLOAD_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub policy: CachePolicy,
    /// Disk cache root. Defaults to `images` under the platform cache directory.
    pub directory: Option<PathBuf>,
    /// Maximum number of decoded images held in memory. Unbounded if unset.
    pub memory_capacity: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, user_agent: None }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "imgload")
}

impl Config {
    /// Load configuration from every source, optionally including an
    /// explicitly requested file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(dirs) = project_dirs() {
            let path = dirs.config_dir().join("config.toml");
            if path.is_file() {
                tracing::debug!(path = %path.display(), "Loading user configuration");
                figment = figment.merge(Toml::file(path));
            }
        }
        if let Some(path) = explicit {
            figment = Self::merge_file(figment, path)?;
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        if !path.is_file() {
            exn::bail!(ErrorKind::FileNotFound(path.to_path_buf()));
        }
        tracing::debug!(path = %path.display(), "Loading configuration file");
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    pub fn extract(figment: Figment) -> Result<Self> {
        figment.extract().or_raise(|| ErrorKind::Invalid)
    }
}

impl CacheConfig {
    /// The disk cache root, made absolute.
    pub fn directory(&self) -> Result<PathBuf> {
        let directory = match &self.directory {
            Some(directory) => directory.clone(),
            None => match project_dirs() {
                Some(dirs) => dirs.cache_dir().join("images"),
                None => exn::bail!(ErrorKind::NoCacheDirectory),
            },
        };
        std::path::absolute(&directory).or_raise(|| ErrorKind::NoCacheDirectory)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    #[test]
    fn test_defaults() {
        let config = Config::extract(defaults()).unwrap();
        assert_eq!(config.cache.policy, CachePolicy::Disk);
        assert_eq!(config.cache.memory_capacity, None);
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
    }

    #[rstest]
    #[case("config.toml", "[cache]\npolicy = \"memory\"\nmemory_capacity = 64\n")]
    #[case("config.yaml", "cache:\n  policy: memory\n  memory_capacity: 64\n")]
    #[case("config.json", r#"{"cache": {"policy": "memory", "memory_capacity": 64}}"#)]
    fn test_explicit_file_formats(#[case] name: &str, #[case] contents: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        let config = Config::extract(Config::merge_file(defaults(), &path).unwrap()).unwrap();
        assert_eq!(config.cache.policy, CachePolicy::Memory);
        assert_eq!(config.cache.memory_capacity, NonZeroUsize::new(64));
        // Untouched sections keep their defaults.
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::merge_file(defaults(), Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "policy=memory").unwrap();
        let err = Config::merge_file(defaults(), &path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_invalid_policy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\npolicy = \"sometimes\"\n").unwrap();
        let err = Config::extract(Config::merge_file(defaults(), &path).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid));
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("imgload.toml", "[cache]\npolicy = \"memory\"\n[http]\ntimeout_secs = 5\n")?;
            jail.set_env("IMGLOAD_CACHE__POLICY", "none");
            jail.set_env("IMGLOAD_HTTP__USER_AGENT", "tests/1.0");
            let path = jail.directory().join("imgload.toml");
            let config = Config::load(Some(&path)).map_err(|err| err.to_string())?;
            assert_eq!(config.cache.policy, CachePolicy::None);
            assert_eq!(config.http.timeout_secs, 5);
            assert_eq!(config.http.user_agent.as_deref(), Some("tests/1.0"));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_directory_is_made_absolute() {
        let config = CacheConfig { directory: Some(PathBuf::from("relative/images")), ..CacheConfig::default() };
        let directory = config.directory().unwrap();
        assert!(directory.is_absolute());
        assert!(directory.ends_with("relative/images"));
    }
}
