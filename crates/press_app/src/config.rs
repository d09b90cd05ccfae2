use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use engine_logging::engine_info;
use press_engine::{Credentials, PackageConfig, SmtpSettings};
use serde::Deserialize;

/// Contents of `press.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Account used to log in before fetching; anonymous when absent.
    pub credentials: Option<AccountConfig>,
    pub directories: Directories,
    /// Converter binary (a bare name is looked up on `PATH`); `None` keeps the EPUB.
    pub converter: Option<String>,
    pub language: String,
    pub smtp: Option<SmtpConfig>,
    /// Recipients of the finished file; delivery needs `smtp` as well.
    pub deliver_to: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            directories: Directories::default(),
            converter: Some("kindlegen".to_string()),
            language: "en".to_string(),
            smtp: None,
            deliver_to: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Directories {
    pub issues: PathBuf,
    pub tmp: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            issues: PathBuf::from("issues"),
            tmp: PathBuf::from("tmp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default = "default_starttls")]
    pub starttls: bool,
    pub username: String,
    pub password: String,
    /// Sender address; the username when absent.
    #[serde(default)]
    pub from: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

impl AppConfig {
    /// Reads the config file; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                engine_info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("cannot read {}", path.display()))
            }
        };
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.as_ref().map(|account| Credentials {
            email: account.email.clone(),
            password: account.password.clone(),
        })
    }

    pub fn package_config(&self) -> PackageConfig {
        PackageConfig {
            issues_dir: self.directories.issues.clone(),
            tmp_dir: self.directories.tmp.clone(),
            language: self.language.clone(),
            ..PackageConfig::default()
        }
    }

    /// SMTP settings, only when there is somebody to deliver to.
    pub fn delivery(&self) -> Option<(SmtpSettings, Vec<String>)> {
        let smtp = self.smtp.as_ref()?;
        if self.deliver_to.is_empty() {
            return None;
        }
        let settings = SmtpSettings {
            host: smtp.host.clone(),
            port: smtp.port,
            starttls: smtp.starttls,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from: smtp.from.clone().unwrap_or_else(|| smtp.username.clone()),
        };
        Some((settings, self.deliver_to.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("()").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.converter.as_deref(), Some("kindlegen"));
        assert!(config.credentials().is_none());
        assert!(config.delivery().is_none());
    }

    #[test]
    fn full_file_is_read() {
        let text = r#"(
            credentials: Some((email: "me@example.com", password: "pw")),
            directories: (issues: "out", tmp: "/tmp/press"),
            converter: None,
            smtp: Some((host: "smtp.example.com", username: "me@example.com", password: "pw")),
            deliver_to: ["me@kindle.example"],
        )"#;
        let config = AppConfig::parse(text).unwrap();

        assert_eq!(config.credentials().unwrap().email, "me@example.com");
        assert_eq!(config.converter, None);
        let package = config.package_config();
        assert_eq!(package.issues_dir, PathBuf::from("out"));
        assert_eq!(package.tmp_dir, PathBuf::from("/tmp/press"));
        assert_eq!(package.language, "en");

        let (smtp, recipients) = config.delivery().unwrap();
        assert_eq!(smtp.port, 587);
        assert!(smtp.starttls);
        assert_eq!(smtp.from, "me@example.com");
        assert_eq!(recipients, vec!["me@kindle.example".to_string()]);
    }

    #[test]
    fn smtp_without_recipients_does_not_deliver() {
        let text = r#"(smtp: Some((host: "h", username: "u", password: "p")))"#;
        assert!(AppConfig::parse(text).unwrap().delivery().is_none());
    }

    #[test]
    fn missing_file_means_defaults_and_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AppConfig::load(&dir.path().join("press.ron")).unwrap();
        assert_eq!(missing, AppConfig::default());

        let bad = dir.path().join("bad.ron");
        fs::write(&bad, "(directories: 3)").unwrap();
        let err = AppConfig::load(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"));
    }
}
