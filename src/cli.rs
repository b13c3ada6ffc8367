use crate::config::{Config, load_config};
use crate::secret_string::SecretString;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bumpversion")]
#[command(about = "Bump the image version in the k8s resource files of a git repository")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clone the manifest repository, bump the image, commit and push
    Git(GitArgs),
    /// Bump the image in a local directory, without any git operation
    Local(BumpArgs),
}

#[derive(Debug, Args)]
pub struct BumpArgs {
    /// YAML config file, flags override its values
    #[arg(long, env = "BV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image that needs to be updated, without tag
    #[arg(short, long, env = "BV_IMAGE")]
    pub image: Option<String>,

    /// Tag the image is set to
    #[arg(short, long, env = "BV_TAG")]
    pub tag: Option<String>,

    /// Directory to walk; relative to the clone for `git`
    #[arg(long, env = "BV_PATH")]
    pub path: Option<PathBuf>,

    /// Glob of files or directories to skip, relative to the walked directory
    #[arg(long, env = "BV_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args)]
pub struct GitArgs {
    #[command(flatten)]
    pub bump: BumpArgs,

    /// Manifest repository URL
    #[arg(long, env = "BV_GIT_URL")]
    pub git_url: Option<String>,

    /// Directory the repository is cloned into
    #[arg(long, env = "BV_GIT_CLONE_DIR")]
    pub git_clone_dir: Option<PathBuf>,

    /// SSH private key file
    #[arg(long, env = "BV_GIT_SSH_KEY")]
    pub git_ssh_key: Option<PathBuf>,

    /// Passphrase of the SSH private key; rejected, encrypted keys are not supported
    #[arg(long, env = "BV_GIT_SSH_KEY_PASSWORD", hide_env_values = true)]
    pub git_ssh_key_password: Option<String>,

    /// User for SSH and HTTPS token authentication
    #[arg(long, env = "BV_GIT_USER")]
    pub git_user: Option<String>,

    /// Accept any SSH host key
    #[arg(long, env = "BV_GIT_SSH_SKIP_VERIFY_HOST_KEY")]
    pub git_ssh_skip_verify_host_key: bool,

    /// Token for HTTPS remotes
    #[arg(long, env = "BV_GIT_TOKEN", hide_env_values = true)]
    pub git_token: Option<String>,

    #[arg(long, env = "BV_GIT_COMMIT_AUTHOR")]
    pub git_commit_author: Option<String>,

    #[arg(long, env = "BV_GIT_COMMIT_EMAIL")]
    pub git_commit_email: Option<String>,
}

impl BumpArgs {
    /// Loads the config file when one is given and applies the flags on top.
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };

        if let Some(image) = self.image {
            config.image = image;
        }
        if let Some(tag) = self.tag {
            config.tag = tag;
        }
        if let Some(path) = self.path {
            config.path = path;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        Ok(config)
    }
}

impl GitArgs {
    pub fn into_config(self) -> Result<Config> {
        let mut config = self.bump.into_config()?;
        let git = &mut config.git;

        if let Some(url) = self.git_url {
            git.url = url;
        }
        if let Some(clone_dir) = self.git_clone_dir {
            git.clone_dir = clone_dir;
        }
        if let Some(ssh_key) = self.git_ssh_key {
            git.ssh_key = ssh_key;
        }
        if let Some(password) = self.git_ssh_key_password {
            git.ssh_key_password = Some(SecretString::new(password));
        }
        if let Some(user) = self.git_user {
            git.user = user;
        }
        if self.git_ssh_skip_verify_host_key {
            git.ssh_skip_verify_host_key = true;
        }
        if let Some(token) = self.git_token {
            git.token = Some(SecretString::new(token));
        }
        if let Some(author) = self.git_commit_author {
            git.commit_author = author;
        }
        if let Some(email) = self.git_commit_email {
            git.commit_email = email;
        }
        Ok(config)
    }
}
