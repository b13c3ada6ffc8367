use crate::document::{Document, Node, ScalarId};
use crate::error::EditError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Key(&'static str),
    /// Every item of a sequence, `[*]`.
    Each,
}

/// A structural path to the container image fields of a workload manifest.
#[derive(Debug, PartialEq, Eq)]
pub struct ImagePathSelector {
    segments: &'static [Segment],
}

impl ImagePathSelector {
    pub const fn new(segments: &'static [Segment]) -> Self {
        Self { segments }
    }

    /// Resolves the selector to the image scalars of `document`.
    ///
    /// Missing keys drop the branch they are on; if no branch survives the result is
    /// [`EditError::ImageNotFound`]. A node of the wrong shape anywhere on the path is a
    /// [`EditError::Structure`] error.
    pub fn select(&self, document: &Document) -> Result<Vec<ScalarId>, EditError> {
        let Some(root) = document.root() else {
            return Err(EditError::ImageNotFound);
        };

        let mut nodes = vec![root];
        for (depth, segment) in self.segments.iter().enumerate() {
            let mut next = Vec::with_capacity(nodes.len());
            for node in nodes {
                match (segment, node) {
                    (Segment::Key(key), Node::Mapping(entries)) => {
                        next.extend(document.entry(entries, key));
                    }
                    (Segment::Each, Node::Sequence(items)) => next.extend(items),
                    (Segment::Key(_), other) => {
                        return Err(self.structure_error(depth, "mapping", other));
                    }
                    (Segment::Each, other) => {
                        return Err(self.structure_error(depth, "sequence", other));
                    }
                }
            }
            nodes = next;
        }

        if nodes.is_empty() {
            return Err(EditError::ImageNotFound);
        }

        nodes
            .into_iter()
            .map(|node| match node {
                Node::Scalar(id) => Ok(*id),
                other => Err(self.structure_error(self.segments.len(), "scalar", other)),
            })
            .collect()
    }

    fn structure_error(&self, depth: usize, expected: &str, found: &Node) -> EditError {
        EditError::Structure {
            path: Self::render(&self.segments[..depth]),
            reason: format!("expected a {}, found {}", expected, found.kind_name()),
        }
    }

    fn render(segments: &[Segment]) -> String {
        let mut path = String::from("$");
        for segment in segments {
            match segment {
                Segment::Key(key) => {
                    path.push('.');
                    path.push_str(key);
                }
                Segment::Each => path.push_str("[*]"),
            }
        }
        path
    }
}

impl fmt::Display for ImagePathSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::render(self.segments))
    }
}
