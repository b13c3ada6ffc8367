use crate::checkout::Checkout;
use crate::config::Config;
use crate::walker::{WalkReport, Walker};
use anyhow::{Result, bail};
use std::path::Path;

pub fn commit_message(image: &str, tag: &str) -> String {
    format!("bumpversion({}):{}", image, tag)
}

/// Bumps the image across `config.path` inside the checkout, then commits and pushes.
pub fn run(checkout: &impl Checkout, config: &Config) -> Result<WalkReport> {
    let report = walk(&checkout.root().join(&config.path), config)?;
    checkout.commit_and_push(&commit_message(&config.image, &config.tag))?;
    Ok(report)
}

/// Bumps the image across `config.path` on the local filesystem.
pub fn run_local(config: &Config) -> Result<WalkReport> {
    walk(&config.path, config)
}

fn walk(root: &Path, config: &Config) -> Result<WalkReport> {
    let walker = Walker::new(&config.image, &config.tag, &config.exclude)?;
    let report = walker.walk(root)?;
    if report.updated_files() == 0 {
        bail!(
            "No changes: image {} not found or already at tag {} under {}",
            config.image,
            config.tag,
            root.display()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const DEPLOYMENT: &str = "kind: Deployment\nspec:\n  template:\n    spec:\n      containers:\n        - image: registry/app:1\n";

    struct FakeCheckout {
        dir: TempDir,
        commits: RefCell<Vec<String>>,
    }

    impl FakeCheckout {
        fn with_manifest(name: &str) -> Self {
            let dir = TempDir::new().expect("Failed to create temp dir");
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().expect("has parent")).expect("create dir");
            fs::write(path, DEPLOYMENT).expect("write manifest");
            Self {
                dir,
                commits: RefCell::new(Vec::new()),
            }
        }
    }

    impl Checkout for FakeCheckout {
        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn commit_and_push(&self, message: &str) -> Result<()> {
            self.commits.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    fn config(tag: &str) -> Config {
        Config {
            image: "registry/app".to_string(),
            tag: tag.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message("registry/app", "1.1.16"),
            "bumpversion(registry/app):1.1.16"
        );
    }

    #[test]
    fn test_run_commits_once_after_update() {
        let checkout = FakeCheckout::with_manifest("apps/deployment.yaml");
        let report = run(&checkout, &config("2")).expect("run should succeed");

        assert_eq!(report.updated_files(), 1);
        assert_eq!(
            *checkout.commits.borrow(),
            vec!["bumpversion(registry/app):2".to_string()]
        );
        assert_eq!(
            fs::read_to_string(checkout.root().join("apps/deployment.yaml")).expect("read"),
            DEPLOYMENT.replace("registry/app:1", "registry/app:2")
        );
    }

    #[test]
    fn test_run_walks_configured_path_only() {
        let checkout = FakeCheckout::with_manifest("other/deployment.yaml");
        let config = Config {
            path: PathBuf::from("apps"),
            ..config("2")
        };
        fs::create_dir_all(checkout.root().join("apps")).expect("create dir");

        assert!(run(&checkout, &config).is_err());
        assert!(checkout.commits.borrow().is_empty());
    }

    #[test]
    fn test_run_without_changes_does_not_commit() {
        let checkout = FakeCheckout::with_manifest("deployment.yaml");
        let err = run(&checkout, &config("1")).expect_err("nothing to bump");

        assert!(err.to_string().starts_with("No changes"));
        assert!(checkout.commits.borrow().is_empty());
    }

    #[test]
    fn test_run_local() {
        let checkout = FakeCheckout::with_manifest("deployment.yaml");
        let config = Config {
            path: checkout.root().to_path_buf(),
            ..config("3")
        };

        let report = run_local(&config).expect("run should succeed");
        assert_eq!(report.total_updates(), 1);
        assert!(run_local(&config).is_err());
    }
}
