use crate::config::GitConfig;
use crate::secret_string::SecretString;
use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// A writable working tree whose changes can be published.
pub trait Checkout {
    fn root(&self) -> &Path;

    /// Stages every change, commits it with `message` and pushes. Fails when there is nothing
    /// to commit.
    fn commit_and_push(&self, message: &str) -> Result<()>;
}

/// Environment for every `git` invocation of a checkout.
struct GitEnv {
    vars: Vec<(&'static str, String)>,
    // passed through GIT_CONFIG_* so the token never shows up in the process list
    auth_header: Option<SecretString>,
}

impl GitEnv {
    fn new(config: &GitConfig) -> Result<Self> {
        let mut vars = vec![
            ("GIT_AUTHOR_NAME", config.commit_author.clone()),
            ("GIT_AUTHOR_EMAIL", config.commit_email.clone()),
            ("GIT_COMMITTER_NAME", config.commit_author.clone()),
            ("GIT_COMMITTER_EMAIL", config.commit_email.clone()),
            ("GIT_TERMINAL_PROMPT", "0".to_string()),
        ];

        if config.ssh_key.is_file() {
            vars.push(("GIT_SSH_COMMAND", ssh_command(config)?));
        } else {
            debug!(
                "SSH key {} not found, using the default SSH configuration",
                config.ssh_key.display()
            );
        }

        let auth_header = config
            .token
            .as_ref()
            .filter(|token| !token.is_empty())
            .map(|token| basic_auth_header(&config.user, token));

        Ok(Self { vars, auth_header })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.envs(self.vars.iter().map(|(k, v)| (*k, v.as_str())));
        if let Some(header) = &self.auth_header {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", header.expose_secret());
        }
        cmd
    }
}

fn ssh_command(config: &GitConfig) -> Result<String> {
    let key = config.ssh_key.to_string_lossy();
    let mut command = format!(
        "ssh -i {} -l {} -o IdentitiesOnly=yes",
        shlex::try_quote(&key).context("SSH key path cannot be quoted")?,
        shlex::try_quote(&config.user).context("Git user cannot be quoted")?,
    );
    if config.ssh_skip_verify_host_key {
        warn!("SSH host key verification is disabled");
        command.push_str(" -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null");
    }
    Ok(command)
}

fn basic_auth_header(user: &str, token: &SecretString) -> SecretString {
    let credentials = BASE64_STANDARD.encode(format!("{}:{}", user, token.expose_secret()));
    SecretString::new(format!("Authorization: Basic {}", credentials))
}

/// A repository cloned with the `git` executable.
pub struct GitCheckout {
    root: PathBuf,
    env: GitEnv,
}

impl GitCheckout {
    pub fn clone(config: &GitConfig) -> Result<Self> {
        let env = GitEnv::new(config)?;
        info!(
            "Cloning {} into {}",
            config.url,
            config.clone_dir.display()
        );

        let mut cmd = env.command();
        cmd.arg("clone").arg(&config.url).arg(&config.clone_dir);
        run(cmd, "clone")?;

        Ok(Self {
            root: config.clone_dir.clone(),
            env,
        })
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.env.command();
        cmd.current_dir(&self.root).args(args);
        run(cmd, args.first().copied().unwrap_or_default())
    }
}

impl Checkout for GitCheckout {
    fn root(&self) -> &Path {
        &self.root
    }

    fn commit_and_push(&self, message: &str) -> Result<()> {
        let status = self.git(&["status", "--porcelain"])?;
        if status.trim().is_empty() {
            bail!("git status: no changes");
        }

        self.git(&["add", "-A"])?;
        self.git(&["commit", "-m", message])?;
        let head = self.git(&["rev-parse", "HEAD"])?;
        info!("Committed {} as {}", message, head.trim());

        self.git(&["push"])?;
        info!("git push successful");
        Ok(())
    }
}

fn run(mut cmd: Command, subcommand: &str) -> Result<String> {
    debug!("Running git {}", subcommand);
    let output = cmd
        .output()
        .with_context(|| format!("Failed to run git {}", subcommand))?;

    if !output.status.success() {
        bail!(
            "git {} failed with {}: {}",
            subcommand,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
