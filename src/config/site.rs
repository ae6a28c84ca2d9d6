//! Site configuration (site.yml + environment)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
///
/// Built once at startup by [`SiteConfig::load`] and shared by reference with
/// every component that needs it. Nothing reads the process environment after
/// this point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub author: String,
    pub language: String,

    // Server
    pub port: u16,
    pub in_production: bool,

    // Directory
    pub posts_dir: String,
    pub static_dir: String,

    // Writing
    #[serde(default)]
    pub highlight: HighlightConfig,

    // Integrations
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Folio".to_string(),
            author: String::new(),
            language: "pt-BR".to_string(),

            port: 8888,
            in_production: false,

            posts_dir: "posts".to_string(),
            static_dir: "static".to_string(),

            highlight: HighlightConfig::default(),

            mail: MailConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration for the site rooted at `base_dir`.
    ///
    /// Reads `site.yml` when present, then the `.env` file, then applies
    /// overrides from the process environment.
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join("site.yml");

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        match dotenvy::from_path(base_dir.join(".env")) {
            Ok(()) => tracing::debug!("Loaded .env from {:?}", base_dir),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Failed to load .env file: {}", e),
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// Unparseable numeric or boolean values are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT").and_then(|v| parse_or_warn("PORT", &v)) {
            self.port = port;
        }
        if let Some(flag) = get("IN_PRODUCTION").and_then(|v| parse_bool("IN_PRODUCTION", &v)) {
            self.in_production = flag;
        }
        if let Some(lang) = get("SITE_LANGUAGE") {
            self.language = lang;
        }
        if let Some(dir) = get("POSTS_DIR") {
            self.posts_dir = dir;
        }
        if let Some(dir) = get("STATIC_DIR") {
            self.static_dir = dir;
        }

        // Mail
        if let Some(host) = get("SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Some(port) = get("SMTP_PORT").and_then(|v| parse_or_warn("SMTP_PORT", &v)) {
            self.mail.smtp_port = port;
        }
        if let Some(user) = get("SMTP_USERNAME") {
            self.mail.username = Some(user);
        }
        if let Some(password) = get("SMTP_PASSWORD") {
            self.mail.password = Some(password);
        }
        if let Some(sender) = get("MAIL_SENDER") {
            self.mail.sender = Some(sender);
        }
        if let Some(recipient) = get("MAIL_RECIPIENT") {
            self.mail.recipient = Some(recipient);
        }

        // Webhook
        if let Some(secret) = get("GITHUB_WEBHOOK_SECRET") {
            self.webhook.secret = Some(secret);
        }
        if let Some(branch) = get("WEBHOOK_BRANCH") {
            self.webhook.branch = branch;
        }
        if let Some(secs) = get("WEBHOOK_PULL_TIMEOUT_SECS")
            .and_then(|v| parse_or_warn("WEBHOOK_PULL_TIMEOUT_SECS", &v))
        {
            self.webhook.pull_timeout_secs = secs;
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, value);
            None
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, value);
            None
        }
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}

/// Outbound mail (SMTP) configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Account the message is submitted through
    pub sender: Option<String>,
    /// Operator address that receives contact messages
    pub recipient: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            sender: None,
            recipient: None,
        }
    }
}

impl MailConfig {
    /// Names of the settings that are still unset
    pub fn missing(&self) -> Vec<&'static str> {
        let fields = [
            ("SMTP_HOST", &self.smtp_host),
            ("SMTP_USERNAME", &self.username),
            ("SMTP_PASSWORD", &self.password),
            ("MAIL_SENDER", &self.sender),
            ("MAIL_RECIPIENT", &self.recipient),
        ];
        fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Repository webhook configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared secret for `X-Hub-Signature-256`
    pub secret: Option<String>,
    /// Fully qualified ref that triggers a refresh
    pub branch: String,
    pub pull_timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            branch: "refs/heads/main".to_string(),
            pull_timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("branch", &self.branch)
            .field("pull_timeout_secs", &self.pull_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.posts_dir, "posts");
        assert_eq!(config.webhook.branch, "refs/heads/main");
        assert!(!config.mail.is_complete());
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: Meu Site
language: en
port: 9000
highlight:
  line_number: true
webhook:
  branch: refs/heads/content
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Meu Site");
        assert_eq!(config.language, "en");
        assert_eq!(config.port, 9000);
        assert!(config.highlight.line_number);
        assert_eq!(config.webhook.branch, "refs/heads/content");
        assert_eq!(config.webhook.pull_timeout_secs, 60);
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("PORT", "3000"),
            ("IN_PRODUCTION", "true"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "user"),
            ("SMTP_PASSWORD", "secret"),
            ("MAIL_SENDER", "site@example.com"),
            ("MAIL_RECIPIENT", "me@example.com"),
            ("GITHUB_WEBHOOK_SECRET", "hook"),
        ]);
        let mut config = SiteConfig::default();
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.port, 3000);
        assert!(config.in_production);
        assert!(config.mail.is_complete());
        assert_eq!(config.webhook.secret.as_deref(), Some("hook"));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let vars = env(&[("PORT", "not-a-port"), ("IN_PRODUCTION", "maybe")]);
        let mut config = SiteConfig::default();
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.port, 8888);
        assert!(!config.in_production);
    }

    #[test]
    fn test_missing_mail_settings() {
        let mail = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            ..Default::default()
        };
        let missing = mail.missing();
        assert!(!missing.contains(&"SMTP_HOST"));
        assert!(missing.contains(&"MAIL_RECIPIENT"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = SiteConfig::default();
        config.mail.password = Some("hunter2".to_string());
        config.webhook.secret = Some("s3cret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
    }
}
