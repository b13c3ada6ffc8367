//! Errors produced while editing a single manifest.

use thiserror::Error;
use yaml_rust2::scanner::ScanError;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("malformed YAML: {0}")]
    Parse(#[from] ScanError),

    #[error("manifest is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Nothing to update: not a supported workload, no matching image, or already at the tag.
    #[error("no image to update")]
    ImageNotFound,

    #[error("unexpected document structure at {path}: {reason}")]
    Structure { path: String, reason: String },
}
