//! Credential resolution for request signing
//!
//! Supports explicit key pairs and named profiles from the shared
//! credentials file (`~/.aws/credentials`, or `$AWS_SHARED_CREDENTIALS_FILE`),
//! with `~/.aws/config` as a second place to look for a profile.

use super::config::CredentialSource;
use crate::config::SecretString;
use crate::error::{AgentError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolved signing credentials
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

/// Resolve a credential source into concrete credentials
///
/// Fails with a configuration error when nothing usable is found.
pub fn resolve(source: &CredentialSource) -> Result<Credentials> {
    match source {
        CredentialSource::Static {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            if access_key_id.trim().is_empty() || secret_access_key.expose().trim().is_empty() {
                return Err(AgentError::Config(
                    "access key id and secret access key must both be set".to_string(),
                ));
            }
            Ok(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: session_token.clone(),
            })
        }
        CredentialSource::Profile(profile) => load_profile(profile),
        CredentialSource::Default => {
            if let Some(credentials) = from_env() {
                return Ok(credentials);
            }
            let profile = std::env::var("AWS_PROFILE")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "default".to_string());
            load_profile(&profile)
        }
    }
}

fn from_env() -> Option<Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok().filter(|v| !v.is_empty())?;
    let secret = std::env::var("AWS_SECRET_ACCESS_KEY").ok().filter(|v| !v.is_empty())?;
    let session_token = std::env::var("AWS_SESSION_TOKEN")
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::new);
    Some(Credentials {
        access_key_id,
        secret_access_key: SecretString::new(secret),
        session_token,
    })
}

fn shared_credentials_path() -> PathBuf {
    if let Ok(path) = std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return PathBuf::from(path);
    }
    aws_dir().join("credentials")
}

fn shared_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("AWS_CONFIG_FILE") {
        return PathBuf::from(path);
    }
    aws_dir().join("config")
}

fn aws_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aws")
}

/// Load a named profile from the shared credentials or config file
pub fn load_profile(profile: &str) -> Result<Credentials> {
    let credentials_path = shared_credentials_path();
    if let Some(found) = profile_from_file(&credentials_path, profile, false)? {
        return Ok(found);
    }
    let config_path = shared_config_path();
    if let Some(found) = profile_from_file(&config_path, profile, true)? {
        return Ok(found);
    }
    Err(AgentError::Config(format!(
        "AWS profile '{}' not found or incomplete in {} or {}",
        profile,
        credentials_path.display(),
        config_path.display()
    )))
}

/// Read one profile out of an INI-style AWS file
///
/// In the config file, non-default sections are written `[profile name]`.
pub fn profile_from_file(
    path: &Path,
    profile: &str,
    config_style: bool,
) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let sections = parse_ini(&content);

    let section_name = if config_style && profile != "default" {
        format!("profile {}", profile)
    } else {
        profile.to_string()
    };

    let Some(section) = sections.get(&section_name) else {
        return Ok(None);
    };
    let (Some(key), Some(secret)) = (
        section.get("aws_access_key_id"),
        section.get("aws_secret_access_key"),
    ) else {
        return Ok(None);
    };

    Ok(Some(Credentials {
        access_key_id: key.clone(),
        secret_access_key: SecretString::new(secret.as_str()),
        session_token: section
            .get("aws_session_token")
            .map(|t| SecretString::new(t.as_str())),
    }))
}

/// Minimal INI parser: `[section]` headers, `key = value` lines, `#`/`;` comments
pub fn parse_ini(content: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    sections
}
