//! Reading identities back out of a deck container.

use tracing::debug;

use super::DeckKind;
use super::transition::EXITING_CLASS;
use crate::view::{Document, ElementHandle, ViewError};

/// One element found in a deck container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted<I> {
    pub id: I,
    pub handle: ElementHandle,
    /// The element is running its exit transition.
    pub exiting: bool,
}

/// Identities of the children of `container`, in document order.
///
/// Children whose marker attribute is missing or does not parse are left out
/// and logged; they never stop the rest of the deck from being read.
///
/// # Errors
///
/// Returns [`ViewError::StaleHandle`] if `container` no longer exists.
pub fn extract<K: DeckKind>(
    doc: &Document,
    container: ElementHandle,
) -> Result<Vec<Extracted<K::Id>>, ViewError> {
    let children = doc.children(container)?;
    let mut found = Vec::with_capacity(children.len());

    for &handle in children {
        let Some(raw) = doc.attribute(handle, K::MARKER)? else {
            debug!(kind = %K::KIND, element = %handle, "skipping child without {}", K::MARKER);
            continue;
        };
        let Ok(id) = raw.parse::<K::Id>() else {
            debug!(kind = %K::KIND, element = %handle, value = raw, "skipping unparseable marker");
            continue;
        };
        found.push(Extracted {
            id,
            handle,
            exiting: doc.has_class(handle, EXITING_CLASS)?,
        });
    }

    Ok(found)
}
