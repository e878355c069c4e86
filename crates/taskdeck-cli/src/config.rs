use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Root config, read from `taskdeck.yaml` in the data root. Every section
/// has workable defaults so a missing file still boots a dev instance.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub mailer: MailerSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_file")]
    pub file: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: default_db_file(),
        }
    }
}

fn default_db_file() -> String {
    "taskdeck.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// OpenAI-compatible chat completions endpoint base.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Without a key the service falls back to the stub provider.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailerSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_mail_from")]
    pub from: String,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_retry_gap")]
    pub retry_gap_secs: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for MailerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: String::new(),
            api_key: String::new(),
            from: default_mail_from(),
            sweep_interval_secs: default_sweep_interval(),
            retry_gap_secs: default_retry_gap(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_mail_from() -> String {
    "taskdeck@localhost".to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_retry_gap() -> i64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorSection {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

fn default_check_interval() -> u64 {
    15 * 60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public URL of the web app, used for links in emails.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_url: default_base_url(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.database.file, "taskdeck.db");
        assert!(!config.mailer.enabled);
        assert_eq!(config.monitor.check_interval_secs, 900);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn partial_sections_keep_their_defaults() {
        let yaml = r#"
provider:
  api_key: sk-test
mailer:
  enabled: true
  api_url: https://mail.example.com/v1/send
  api_key: mk-test
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert!(config.mailer.enabled);
        assert_eq!(config.mailer.max_attempts, 3);
        assert_eq!(config.mailer.retry_gap_secs, 300);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = "database:\n  file: x.db\n  flavor: espresso\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskdeck.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "monitor:\n  check_interval_secs: 60").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.monitor.check_interval_secs, 60);
    }
}
