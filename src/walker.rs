use crate::editor;
use crate::error::EditError;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::{self, FileType, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static MANIFEST_EXTENSION: &str = "yaml";
static VCS_DIR: &str = ".git";

#[derive(Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(usize),
    NoMatch,
    Failed(String),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: EditOutcome,
}

impl FileReport {
    fn log(&self) {
        match &self.outcome {
            EditOutcome::Updated(n) => info!("Updated {} images in {}", n, self.path.display()),
            EditOutcome::NoMatch => debug!("No image to update in {}", self.path.display()),
            EditOutcome::Failed(e) => warn!("Skipping {}: {}", self.path.display(), e),
        }
    }
}

#[derive(Debug, Default)]
pub struct WalkReport {
    pub files: Vec<FileReport>,
}

impl WalkReport {
    pub fn updated_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, EditOutcome::Updated(_)))
            .count()
    }

    pub fn total_updates(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                EditOutcome::Updated(n) => n,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, EditOutcome::Failed(_)))
            .count()
    }
}

/// Walks a manifest tree and bumps `image` to `tag` in every `.yaml` file it finds.
pub struct Walker<'a> {
    image: &'a str,
    tag: &'a str,
    exclude: GlobSet,
}

impl<'a> Walker<'a> {
    /// `exclude` holds glob patterns matched against paths relative to the walk root.
    pub fn new(image: &'a str, tag: &'a str, exclude: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude {
            builder.add(
                Glob::new(pattern)
                    .with_context(|| format!("Invalid exclude pattern: {}", pattern))?,
            );
        }
        let exclude = builder
            .build()
            .context("Failed to build exclude pattern set")?;

        Ok(Self {
            image,
            tag,
            exclude,
        })
    }

    /// Visits `root` depth-first in file name order.
    ///
    /// Per-file failures are recorded in the report and never stop the walk. Only a directory
    /// that cannot be listed aborts it.
    pub fn walk(&self, root: &Path) -> Result<WalkReport> {
        info!(
            "Bumping image {} to tag {} in {}",
            self.image,
            self.tag,
            root.display()
        );
        let mut report = WalkReport::default();
        self.visit_dir(root, root, &mut report)?;
        info!(
            "Updated {} images in {} files, {} files failed",
            report.total_updates(),
            report.updated_files(),
            report.failed_files()
        );
        Ok(report)
    }

    fn visit_dir(&self, root: &Path, dir: &Path, report: &mut WalkReport) -> Result<()> {
        let mut entries = fs::read_dir(dir)
            .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
            .with_context(|| format!("Failed to list directory {}", dir.display()))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            self.visit_entry(root, entry.path(), entry.file_type(), report)?;
        }

        Ok(())
    }

    fn visit_entry(
        &self,
        root: &Path,
        path: PathBuf,
        file_type: io::Result<FileType>,
        report: &mut WalkReport,
    ) -> Result<()> {
        if self.is_excluded(root, &path) {
            debug!("Skipping excluded path {}", path.display());
            return Ok(());
        }

        let outcome = match file_type {
            Ok(file_type) if file_type.is_dir() => {
                if path.file_name().is_none_or(|name| name != VCS_DIR) {
                    self.visit_dir(root, &path, report)?;
                }
                return Ok(());
            }
            Ok(_) if path.extension().is_none_or(|ext| ext != MANIFEST_EXTENSION) => {
                return Ok(());
            }
            Ok(_) => self.visit_file(&path),
            Err(e) => EditOutcome::Failed(format!(
                "Failed to read file type of {}: {}",
                path.display(),
                e
            )),
        };

        let file = FileReport { path, outcome };
        file.log();
        report.files.push(file);
        Ok(())
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        path.strip_prefix(root)
            .is_ok_and(|relative| self.exclude.is_match(relative))
    }

    fn visit_file(&self, path: &Path) -> EditOutcome {
        match bump_file(path, self.image, self.tag) {
            Ok(Some(updated)) => EditOutcome::Updated(updated),
            Ok(None) => EditOutcome::NoMatch,
            Err(e) => EditOutcome::Failed(format!("{:#}", e)),
        }
    }
}

/// Edits one manifest in place. `Ok(None)` when there was nothing to update.
fn bump_file(path: &Path, image: &str, tag: &str) -> Result<Option<usize>> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let edited = match editor::edit(&content, image, tag) {
        Ok(edited) => edited,
        Err(EditError::ImageNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to edit {}", path.display())),
    };

    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.set_len(0))
        .and_then(|_| file.write_all(edited.content.as_bytes()))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(Some(edited.updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEPLOYMENT: &str = "kind: Deployment\nspec:\n  template:\n    spec:\n      containers:\n        - name: app # main\n          image: registry/app:1.1.15\n";
    const MALFORMED: &str = "kind: Deployment\nspec:\n  template: {unclosed\n";
    const CONFIG_MAP: &str = "kind: ConfigMap\ndata:\n  image: registry/app:1.1.15\n";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    fn outcome_of<'r>(report: &'r WalkReport, path: &Path) -> &'r EditOutcome {
        &report
            .files
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("no report for {}", path.display()))
            .outcome
    }

    #[test]
    fn test_walk_updates_matching_and_skips_the_rest() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let root = tmp.path();
        let matching = write(root, "apps/deployment.yaml", DEPLOYMENT);
        let text = write(root, "apps/notes.txt", DEPLOYMENT);
        let yml = write(root, "apps/other.yml", DEPLOYMENT);
        let malformed = write(root, "broken.yaml", MALFORMED);
        let config_map = write(root, "nested/deep/config.yaml", CONFIG_MAP);

        let walker = Walker::new("registry/app", "1.1.16", &[]).expect("walker");
        let report = walker.walk(root).expect("walk should not fail");

        assert_eq!(report.files.len(), 3);
        assert_eq!(outcome_of(&report, &matching), &EditOutcome::Updated(1));
        assert_eq!(outcome_of(&report, &config_map), &EditOutcome::NoMatch);
        assert!(matches!(
            outcome_of(&report, &malformed),
            EditOutcome::Failed(_)
        ));
        assert_eq!(report.updated_files(), 1);
        assert_eq!(report.total_updates(), 1);
        assert_eq!(report.failed_files(), 1);

        assert_eq!(
            fs::read_to_string(&matching).expect("read"),
            DEPLOYMENT.replace("registry/app:1.1.15", "registry/app:1.1.16")
        );
        assert_eq!(fs::read_to_string(&text).expect("read"), DEPLOYMENT);
        assert_eq!(fs::read_to_string(&yml).expect("read"), DEPLOYMENT);
        assert_eq!(fs::read_to_string(&malformed).expect("read"), MALFORMED);
        assert_eq!(fs::read_to_string(&config_map).expect("read"), CONFIG_MAP);
    }

    #[test]
    fn test_rewrite_truncates_longer_content() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let path = write(tmp.path(), "deployment.yaml", DEPLOYMENT);

        let walker = Walker::new("registry/app", "2", &[]).expect("walker");
        walker.walk(tmp.path()).expect("walk");

        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            DEPLOYMENT.replace("registry/app:1.1.15", "registry/app:2")
        );
    }

    #[test]
    fn test_second_walk_changes_nothing() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let path = write(tmp.path(), "deployment.yaml", DEPLOYMENT);

        let walker = Walker::new("registry/app", "1.1.16", &[]).expect("walker");
        walker.walk(tmp.path()).expect("first walk");
        let after_first = fs::read_to_string(&path).expect("read");

        let report = walker.walk(tmp.path()).expect("second walk");
        assert_eq!(report.updated_files(), 0);
        assert_eq!(outcome_of(&report, &path), &EditOutcome::NoMatch);
        assert_eq!(fs::read_to_string(&path).expect("read"), after_first);
    }

    #[test]
    fn test_excluded_and_vcs_paths_are_skipped() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let root = tmp.path();
        let vendored = write(root, "vendor/upstream/deployment.yaml", DEPLOYMENT);
        let vcs = write(root, ".git/deployment.yaml", DEPLOYMENT);
        let kept = write(root, "deployment.yaml", DEPLOYMENT);

        let walker =
            Walker::new("registry/app", "1.1.16", &["vendor/**".to_string()]).expect("walker");
        let report = walker.walk(root).expect("walk");

        assert_eq!(report.files.len(), 1);
        assert_eq!(outcome_of(&report, &kept), &EditOutcome::Updated(1));
        assert_eq!(fs::read_to_string(&vendored).expect("read"), DEPLOYMENT);
        assert_eq!(fs::read_to_string(&vcs).expect("read"), DEPLOYMENT);
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_file_does_not_stop_the_walk() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let root = tmp.path();
        let dangling = root.join("a.yaml");
        std::os::unix::fs::symlink(root.join("missing.yaml"), &dangling)
            .expect("Failed to create symlink");
        let matching = write(root, "b.yaml", DEPLOYMENT);

        let walker = Walker::new("registry/app", "1.1.16", &[]).expect("walker");
        let report = walker.walk(root).expect("walk should not fail");

        assert_eq!(report.files.len(), 2);
        match outcome_of(&report, &dangling) {
            EditOutcome::Failed(e) => assert!(e.starts_with("Failed to open"), "{}", e),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(outcome_of(&report, &matching), &EditOutcome::Updated(1));
        assert_eq!(report.failed_files(), 1);
    }

    #[test]
    fn test_unknown_file_type_is_recorded_as_failed() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let root = tmp.path();
        let path = root.join("gone.yaml");

        let walker = Walker::new("registry/app", "1.1.16", &[]).expect("walker");
        let mut report = WalkReport::default();
        walker
            .visit_entry(root, path.clone(), Err(io::Error::other("stale entry")), &mut report)
            .expect("entry errors should not abort");

        assert_eq!(report.files.len(), 1);
        assert_eq!(
            outcome_of(&report, &path),
            &EditOutcome::Failed(format!(
                "Failed to read file type of {}: stale entry",
                path.display()
            ))
        );
    }

    #[test]
    fn test_byte_order_mark_manifest_is_updated() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let source = format!("\u{feff}{}", DEPLOYMENT);
        let path = write(tmp.path(), "deployment.yaml", &source);

        let walker = Walker::new("registry/app", "1.1.16", &[]).expect("walker");
        let report = walker.walk(tmp.path()).expect("walk");

        assert_eq!(outcome_of(&report, &path), &EditOutcome::Updated(1));
        assert_eq!(
            fs::read(&path).expect("read"),
            source
                .replace("registry/app:1.1.15", "registry/app:1.1.16")
                .into_bytes()
        );
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        assert!(Walker::new("registry/app", "1", &["a[".to_string()]).is_err());
    }

    #[test]
    fn test_missing_root_fails() {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let walker = Walker::new("registry/app", "1", &[]).expect("walker");
        assert!(walker.walk(&tmp.path().join("missing")).is_err());
    }
}
