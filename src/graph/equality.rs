//! Structural equality across documents.
//!
//! Two properties are equal when their names and own fields match and their
//! referenced children are pairwise equal, recursively. Identity never
//! matters, so a property can be compared with one living in another
//! document.

use std::collections::HashSet;

use super::{Document, PropertyId};
use crate::util::Result;

/// Compare `a` in `a_doc` with `b` in `b_doc`.
pub fn equals(a_doc: &Document, a: PropertyId, b_doc: &Document, b: PropertyId) -> Result<bool> {
    let mut visiting = HashSet::new();
    equals_inner(a_doc, a, b_doc, b, &mut visiting)
}

fn equals_inner(
    a_doc: &Document,
    a: PropertyId,
    b_doc: &Document,
    b: PropertyId,
    visiting: &mut HashSet<(PropertyId, PropertyId)>,
) -> Result<bool> {
    // A pair seen before is either still being compared further up (cycle)
    // or has already compared equal; a mismatch would have ended the walk.
    if !visiting.insert((a, b)) {
        return Ok(true);
    }

    let pa = a_doc.get(a)?;
    let pb = b_doc.get(b)?;
    if pa.name != pb.name || pa.kind() != pb.kind() {
        return Ok(false);
    }
    if pa.data.shape() != pb.data.shape() {
        return Ok(false);
    }

    let refs_a = pa.data.refs();
    let refs_b = pb.data.refs();
    debug_assert_eq!(refs_a.len(), refs_b.len());
    for (&ca, &cb) in refs_a.iter().zip(refs_b.iter()) {
        if !equals_inner(a_doc, ca, b_doc, cb, visiting)? {
            return Ok(false);
        }
    }
    Ok(true)
}
