/*
 * reassembler.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Restores ordinal order over concurrently completed resolutions.
 */

//! Result reassembly.
//!
//! Resolutions arrive in completion order. The [`Reassembler`] holds one slot
//! per ordinal and hands the results back in ordinal order once every slot is
//! filled, whatever order they arrived in.

use standoc_xml::{Document, NodeId};

use crate::error::{FetchError, ReassemblyError};
use crate::resolver::{Outcome, Resolution};

/// Dense, ordinal-indexed collection of resolutions.
#[derive(Debug)]
pub struct Reassembler {
    slots: Vec<Option<Resolution>>,
    filled: usize,
}

impl Reassembler {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
            filled: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Store the resolution for `ordinal`.
    pub fn accept(&mut self, ordinal: usize, resolution: Resolution) -> Result<(), ReassemblyError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(ordinal)
            .ok_or(ReassemblyError::OutOfRange { ordinal, len })?;
        if slot.is_some() {
            return Err(ReassemblyError::Duplicate(ordinal));
        }
        *slot = Some(resolution);
        self.filled += 1;
        Ok(())
    }

    /// Emit the resolutions in ordinal order.
    ///
    /// A slot nobody filled (its task died) comes out as a failure, so the
    /// descriptor is still rendered as a stub.
    pub fn finish(self) -> Vec<Resolution> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(ordinal, slot)| {
                slot.unwrap_or_else(|| {
                    tracing::error!(ordinal, "no resolution reported");
                    Resolution::new(Outcome::Failed {
                        error: FetchError::Unavailable("resolution task".to_string()),
                    })
                })
            })
            .collect()
    }
}

/// Replace the `ul` children of a `references` element with `bibitems`.
///
/// The bibitems go where the first list was, in the order given. Other
/// children such as the title stay put.
pub fn merge_citation_list(doc: &mut Document, references: NodeId, bibitems: &[NodeId]) {
    let lists = doc.children_named(references, "ul");
    let Some(first) = lists.first().copied() else {
        for bibitem in bibitems {
            doc.append_child(references, *bibitem);
        }
        return;
    };
    doc.replace_with_many(first, bibitems);
    for list in lists.into_iter().skip(1) {
        doc.detach(list);
    }
}
