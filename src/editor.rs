use crate::document::{Document, Node};
use crate::error::EditError;
use crate::image_reference::ImageReference;
use crate::kind::ResourceKind;
use tracing::debug;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Result of a successful edit: the rewritten manifest and the number of images bumped.
#[derive(Debug, PartialEq, Eq)]
pub struct Edited {
    pub content: String,
    pub updated: usize,
}

/// Sets every `image:<any tag>` reference in the container image fields of a workload
/// manifest to `image:tag`.
///
/// Only the matched scalars change; everything else in the returned text is byte-identical to
/// the input. References already at `tag` are left alone, so a second run with the same
/// arguments reports [`EditError::ImageNotFound`]. A leading byte order mark is kept.
pub fn edit(yaml: &[u8], image: &str, tag: &str) -> Result<Edited, EditError> {
    let source = std::str::from_utf8(yaml)?;
    let (bom, source) = match source.strip_prefix(BYTE_ORDER_MARK) {
        Some(rest) => (&source[..BYTE_ORDER_MARK.len_utf8()], rest),
        None => ("", source),
    };
    let mut document = Document::parse(source)?;

    let kind = resource_kind(&document).ok_or(EditError::ImageNotFound)?;
    let kind = ResourceKind::from_kind(kind).ok_or(EditError::ImageNotFound)?;
    let selector = kind.image_selector();

    let mut updated = 0;
    for id in selector.select(&document)? {
        let Some(retagged) = ImageReference::parse(document.value(id)).retag(image, tag) else {
            continue;
        };
        debug!(
            "Updating {} image {} to {}",
            kind.name(),
            document.value(id),
            retagged
        );
        document
            .set_value(id, retagged)
            .map_err(|e| EditError::Structure {
                path: selector.to_string(),
                reason: e.to_string(),
            })?;
        updated += 1;
    }

    if !document.is_modified() {
        return Err(EditError::ImageNotFound);
    }

    Ok(Edited {
        content: format!("{}{}", bom, document),
        updated,
    })
}

fn resource_kind(document: &Document) -> Option<&str> {
    let Node::Mapping(entries) = document.root()? else {
        return None;
    };
    match document.entry(entries, "kind")? {
        Node::Scalar(id) => Some(document.value(*id)),
        _ => None,
    }
}
