use std::fmt;

/// A container image reference as written in a manifest, split into `name` and `tag`
/// on the first colon only.
///
/// A registry port therefore ends up in the tag: `host:5000/app:1.0` parses as name `host`
/// and tag `5000/app:1.0`. References without a colon carry an empty tag.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageReference<'a> {
    pub name: &'a str,
    pub tag: &'a str,
}

impl<'a> ImageReference<'a> {
    pub fn parse(s: &'a str) -> Self {
        match s.split_once(':') {
            Some((name, tag)) => Self { name, tag },
            None => Self { name: s, tag: "" },
        }
    }

    /// Returns the replacement value when this reference names `image` and is not already at
    /// `tag`.
    pub fn retag(&self, image: &str, tag: &str) -> Option<String> {
        if self.name != image || self.tag == tag {
            return None;
        }
        Some(format!("{}:{}", image, tag))
    }
}

impl fmt::Display for ImageReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.tag)
        }
    }
}
