//! Label arena and pending branch references.
//!
//! A [`Label`] is an index into the [`LabelTable`] owned by one emitter. Each
//! [`LabelRecord`] holds the resolved offset (once marked), the stack height expected at the
//! label, and the list of [`PendingRef`]s: 4-byte placeholders emitted by branches and switch
//! entries that reached the label before it was marked.
//!
//! Resolving a label walks its pending references exactly once. Every patch is independent,
//! so the order in which they are applied does not matter.

use std::fmt;

use crate::{Error, Result};

/// Opaque handle of a branch target, valid only for the emitter that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    /// Position of this label in its table.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L_{:04}", self.0)
    }
}

/// A 4-byte displacement placeholder waiting for its label to be marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRef {
    /// Buffer offset of the placeholder.
    pub patch_address: u32,
    /// Offset the displacement is relative to, when it is not the end of the placeholder.
    ///
    /// Switch table entries are relative to the end of the whole table.
    pub switch_base: Option<u32>,
}

impl PendingRef {
    /// Offset the displacement is measured from.
    #[must_use]
    pub fn base(&self) -> u32 {
        self.switch_base.unwrap_or(self.patch_address + 4)
    }

    /// Displacement from the base to `target`, as written into the placeholder.
    #[must_use]
    pub fn displacement_to(&self, target: u32) -> i32 {
        #[allow(clippy::cast_possible_wrap)]
        let displacement = target.wrapping_sub(self.base()) as i32;
        displacement
    }
}

/// State of one declared label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRecord {
    /// Buffer offset the label was marked at, `None` until marked.
    pub offset: Option<u32>,
    /// Highest stack height seen on any edge into the label.
    pub expected_height: u32,
    /// Placeholders to patch once the label is marked.
    pub pending: Vec<PendingRef>,
}

impl LabelRecord {
    /// Whether the label has been marked.
    #[must_use]
    pub fn is_marked(&self) -> bool {
        self.offset.is_some()
    }

    /// Merge the stack height of one more incoming edge.
    pub fn merge_height(&mut self, height: u32) {
        self.expected_height = self.expected_height.max(height);
    }
}

/// Growable arena of label records, indexed by [`Label`].
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    records: Vec<LabelRecord>,
}

impl LabelTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        LabelTable {
            records: Vec::new(),
        }
    }

    /// Append a fresh, unmarked record and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` labels are declared.
    pub fn declare(&mut self) -> Label {
        let index = u32::try_from(self.records.len())
            .unwrap_or_else(|_| panic!("label table exceeds u32 range"));
        self.records.push(LabelRecord::default());
        Label(index)
    }

    /// Look up a label's record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLabel`] for a handle this table never issued.
    pub fn get(&self, label: Label) -> Result<&LabelRecord> {
        self.records
            .get(label.index())
            .ok_or(Error::UnknownLabel(label))
    }

    /// Look up a label's record for modification.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLabel`] for a handle this table never issued.
    pub fn get_mut(&mut self, label: Label) -> Result<&mut LabelRecord> {
        self.records
            .get_mut(label.index())
            .ok_or(Error::UnknownLabel(label))
    }

    /// Fix `label` at `offset` and hand back the references that were waiting on it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLabel`] or [`crate::Error::LabelAlreadyMarked`].
    pub fn resolve(&mut self, label: Label, offset: u32) -> Result<Vec<PendingRef>> {
        let record = self.get_mut(label)?;
        if record.is_marked() {
            return Err(Error::LabelAlreadyMarked(label));
        }

        record.offset = Some(offset);
        Ok(std::mem::take(&mut record.pending))
    }

    /// First declared label that was never marked.
    #[must_use]
    pub fn first_unresolved(&self) -> Option<Label> {
        self.iter()
            .find(|(_, record)| !record.is_marked())
            .map(|(label, _)| label)
    }

    /// Iterate over all labels in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &LabelRecord)> {
        self.records.iter().enumerate().map(|(index, record)| {
            #[allow(clippy::cast_possible_truncation)]
            let label = Label(index as u32);
            (label, record)
        })
    }

    /// Number of declared labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no label has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
