use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{ConfigError, Result};

/// Environment profile used when `SPECTRUM_ENVIRONMENT` is unset.
pub const DEFAULT_ENVIRONMENT: &str = "end2end";
/// Settings file read when `SPECTRUM_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "app.toml";

pub const GOOGLEBOT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// Settings shared by every environment: local paths for generated fixtures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Common {
    /// Scratch directory for generated articles and digests.
    pub tmp: PathBuf,
    /// Directory holding `elife-<id>-<kind>-<r|v><n>` article templates.
    pub templates: PathBuf,
}

impl Default for Common {
    fn default() -> Self {
        Self {
            tmp: PathBuf::from("tmp"),
            templates: PathBuf::from("templates"),
        }
    }
}

/// One environment profile: where every service under test lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Object storage
    pub bucket_input: String,
    pub bucket_silent_corrections: String,
    pub bucket_archive: String,
    pub bucket_covers: String,
    pub bucket_published: String,
    pub bucket_packaging: String,
    pub bucket_configuration: String,
    pub bucket_digests_input: String,
    pub aws_region: String,
    pub s3_endpoint: Option<String>,

    // Dashboard
    pub dashboard_host: String,
    pub dashboard_user: String,
    pub dashboard_password: String,

    // Content APIs
    pub lax_host: String,
    pub api_gateway_host: String,
    pub api_gateway_authorization: Option<String>,

    // Journal
    pub journal_host: String,
    pub journal_cdn_host: String,
    pub generic_cdn_host: String,

    // Bot and reports
    pub github_article_xml_repository_url: String,
    pub observer_host: String,
    pub bot_host: String,
    pub bot_mailcatcher: String,

    // HTTP behavior
    pub retry_statuses: Vec<u16>,
    pub accept_invalid_certs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket_input: String::new(),
            bucket_silent_corrections: String::new(),
            bucket_archive: String::new(),
            bucket_covers: String::new(),
            bucket_published: String::new(),
            bucket_packaging: String::new(),
            bucket_configuration: String::new(),
            bucket_digests_input: String::new(),
            aws_region: "us-east-1".to_string(),
            s3_endpoint: None,
            dashboard_host: String::new(),
            dashboard_user: String::new(),
            dashboard_password: String::new(),
            lax_host: String::new(),
            api_gateway_host: String::new(),
            api_gateway_authorization: None,
            journal_host: String::new(),
            journal_cdn_host: String::new(),
            generic_cdn_host: String::new(),
            github_article_xml_repository_url: String::new(),
            observer_host: String::new(),
            bot_host: String::new(),
            bot_mailcatcher: String::new(),
            retry_statuses: vec![400, 404, 502, 504],
            accept_invalid_certs: true,
        }
    }
}

impl Settings {
    /// Log the profile with credentials masked.
    pub fn log_redacted(&self) {
        info!(
            dashboard_host = %self.dashboard_host,
            dashboard_user = %self.dashboard_user,
            dashboard_password = %redact(&self.dashboard_password),
            api_gateway_host = %self.api_gateway_host,
            api_gateway_authorization = %self.api_gateway_authorization.as_deref().map(redact).unwrap_or_default(),
            journal_host = %self.journal_host,
            journal_cdn_host = %self.journal_cdn_host,
            bucket_archive = %self.bucket_archive,
            bucket_published = %self.bucket_published,
            retry_statuses = ?self.retry_statuses,
            "Loaded settings"
        );
    }
}

/// A parsed settings file: `[common]` plus one table per environment.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub common: Common,
    #[serde(flatten)]
    pub environments: HashMap<String, Settings>,
}

impl SettingsFile {
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Pick one environment's settings out of the file.
    pub fn environment(&self, name: &str) -> Result<Settings> {
        self.environments
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
                available: {
                    let mut names: Vec<String> = self.environments.keys().cloned().collect();
                    names.sort();
                    names
                },
            })
    }
}

/// Everything a harness process needs to know about where it runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub common: Common,
    pub settings: Settings,
}

impl Config {
    /// Load the settings file named by `SPECTRUM_CONFIG` and select the
    /// profile named by `SPECTRUM_ENVIRONMENT`.
    pub fn from_env() -> Result<Self> {
        let path = env::var("SPECTRUM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let environment =
            env::var("SPECTRUM_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        Self::load(Path::new(&path), &environment)
    }

    pub fn load(path: &Path, environment: &str) -> Result<Self> {
        let file = SettingsFile::read(path)?;
        let settings = file.environment(environment)?;
        Ok(Self {
            environment: environment.to_string(),
            common: file.common,
            settings,
        })
    }
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[common]
tmp = "/var/tmp/spectrum"
templates = "spectrum/templates"

[end2end]
bucket_archive = "end2end-elife-publishing-archive"
dashboard_host = "https://end2end--ppp-dash.elifesciences.org"
dashboard_user = "spectrum"
dashboard_password = "secret"
journal_host = "https://end2end--journal.elifesciences.org"
retry_statuses = [502, 504]

[continuumtest]
journal_host = "https://continuumtest--journal.elifesciences.org"
"#;

    #[test]
    fn selects_environment_table() {
        let file = SettingsFile::parse(SAMPLE).unwrap();
        let settings = file.environment("end2end").unwrap();
        assert_eq!(settings.bucket_archive, "end2end-elife-publishing-archive");
        assert_eq!(settings.retry_statuses, vec![502, 504]);
        assert_eq!(file.common.tmp, PathBuf::from("/var/tmp/spectrum"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let file = SettingsFile::parse(SAMPLE).unwrap();
        let settings = file.environment("continuumtest").unwrap();
        assert_eq!(settings.retry_statuses, vec![400, 404, 502, 504]);
        assert!(settings.dashboard_host.is_empty());
        assert!(settings.accept_invalid_certs);
    }

    #[test]
    fn unknown_environment_lists_available_ones() {
        let file = SettingsFile::parse(SAMPLE).unwrap();
        let err = file.environment("prod").unwrap_err();
        match err {
            ConfigError::UnknownEnvironment { name, available } => {
                assert_eq!(name, "prod");
                assert_eq!(available, vec!["continuumtest", "end2end"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&path, "end2end").unwrap();
        assert_eq!(config.environment, "end2end");
        assert_eq!(config.settings.dashboard_user, "spectrum");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Path::new("/nonexistent/app.toml"), "end2end").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
