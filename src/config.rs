use crate::secret_string::SecretString;
use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::{env, fs, path::Path};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub git: GitConfig,
    /// Directory to walk, relative to the checkout for `git` runs.
    pub path: PathBuf,
    pub image: String,
    pub tag: String,
    /// Glob patterns, relative to `path`, of files and directories to leave alone.
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git: GitConfig::default(),
            path: PathBuf::from("."),
            image: String::new(),
            tag: String::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GitConfig {
    pub url: String,
    pub clone_dir: PathBuf,
    pub ssh_key: PathBuf,
    /// Encrypted keys are not supported, a non-empty passphrase fails `validate_git`.
    pub ssh_key_password: Option<SecretString>,
    /// User for SSH and for HTTPS token authentication.
    pub user: String,
    pub ssh_skip_verify_host_key: bool,
    pub token: Option<SecretString>,
    pub commit_author: String,
    pub commit_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            clone_dir: PathBuf::from("./resource-repo"),
            ssh_key: PathBuf::from("./ssh_private_key"),
            ssh_key_password: None,
            user: "git".to_string(),
            ssh_skip_verify_host_key: false,
            token: None,
            commit_author: "bumpversion".to_string(),
            commit_email: "bumpversion@localhost".to_string(),
        }
    }
}

impl Config {
    /// Checks the fields every run needs.
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            bail!("No image given, set --image or BV_IMAGE");
        }
        if self.tag.is_empty() {
            bail!("No tag given, set --tag or BV_TAG");
        }
        Ok(())
    }

    pub fn validate_git(&self) -> Result<()> {
        self.validate()?;
        if self.git.url.is_empty() {
            bail!("No git URL given, set --git-url or BV_GIT_URL");
        }
        if self
            .git
            .ssh_key_password
            .as_ref()
            .is_some_and(|password| !password.is_empty())
        {
            bail!(
                "SSH key passphrases are not supported, use an unencrypted key for {} or a token",
                self.git.ssh_key.display()
            );
        }
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&yaml_str)?;

    let config = serde_yaml_ng::from_str(&expanded)
        .context("Failed to parse YAML config after environment variable expansion")?;

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error naming every referenced variable that is not set.
fn expand_env_vars(input: &str) -> Result<String> {
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut missing = Vec::new();
    let result = re.replace_all(input, |caps: &regex::Captures| {
        env::var(&caps[1]).unwrap_or_else(|_| {
            missing.push(caps[1].to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        bail!("Missing environment variable: {}", missing.join(", "));
    }

    Ok(result.into_owned())
}
