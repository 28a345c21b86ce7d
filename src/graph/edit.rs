//! Edit journal
//!
//! Every mutation applied to a write target is recorded as an [`EditOp`]
//! carrying explicit element ids. The journal is replayed onto the other
//! target on commit and undone in reverse on rollback. Nested write handles
//! open nested frames; committing a nested frame folds its ops into the
//! parent.

use super::attribute::AttributeDescriptor;
use super::counters::ModificationCounters;
use super::store::{Graph, GraphError, GraphResult};
use super::types::{AttributeId, Direction, ElementId, ElementType, LinkId, TransactionId, VertexId};
use super::value::AttributeValue;
use tracing::{error, trace};

/// A single replayable graph mutation
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    AddVertex {
        id: VertexId,
        uid: u64,
    },
    RemoveVertex {
        id: VertexId,
        uid: u64,
    },
    AddTransaction {
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        direction: Direction,
        link: LinkId,
        uid: u64,
    },
    RemoveTransaction {
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        direction: Direction,
        link: LinkId,
        uid: u64,
    },
    AddAttribute {
        descriptor: AttributeDescriptor,
    },
    RemoveAttribute {
        descriptor: AttributeDescriptor,
    },
    SetValue {
        attribute: AttributeId,
        element: ElementId,
        old: Option<AttributeValue>,
        new: Option<AttributeValue>,
    },
    SetPrimaryKey {
        element_type: ElementType,
        old: Vec<AttributeId>,
        new: Vec<AttributeId>,
    },
    RenameAttribute {
        attribute: AttributeId,
        old: String,
        new: String,
    },
    DescribeAttribute {
        attribute: AttributeId,
        old: String,
        new: String,
    },
    SetAttributeDefault {
        attribute: AttributeId,
        old: AttributeValue,
        new: AttributeValue,
    },
    SetModificationCounters {
        old: [u64; 3],
        new: [u64; 3],
    },
    SetValueModificationCounter {
        attribute: AttributeId,
        old: u64,
        new: u64,
    },
}

impl EditOp {
    /// The op that reverts this one
    pub fn inverse(&self) -> EditOp {
        match self.clone() {
            EditOp::AddVertex { id, uid } => EditOp::RemoveVertex { id, uid },
            EditOp::RemoveVertex { id, uid } => EditOp::AddVertex { id, uid },
            EditOp::AddTransaction { id, source, destination, direction, link, uid } => {
                EditOp::RemoveTransaction { id, source, destination, direction, link, uid }
            }
            EditOp::RemoveTransaction { id, source, destination, direction, link, uid } => {
                EditOp::AddTransaction { id, source, destination, direction, link, uid }
            }
            EditOp::AddAttribute { descriptor } => EditOp::RemoveAttribute { descriptor },
            EditOp::RemoveAttribute { descriptor } => EditOp::AddAttribute { descriptor },
            EditOp::SetValue { attribute, element, old, new } => EditOp::SetValue {
                attribute,
                element,
                old: new,
                new: old,
            },
            EditOp::SetPrimaryKey { element_type, old, new } => EditOp::SetPrimaryKey {
                element_type,
                old: new,
                new: old,
            },
            EditOp::RenameAttribute { attribute, old, new } => EditOp::RenameAttribute {
                attribute,
                old: new,
                new: old,
            },
            EditOp::DescribeAttribute { attribute, old, new } => EditOp::DescribeAttribute {
                attribute,
                old: new,
                new: old,
            },
            EditOp::SetAttributeDefault { attribute, old, new } => EditOp::SetAttributeDefault {
                attribute,
                old: new,
                new: old,
            },
            EditOp::SetModificationCounters { old, new } => {
                EditOp::SetModificationCounters { old: new, new: old }
            }
            EditOp::SetValueModificationCounter { attribute, old, new } => {
                EditOp::SetValueModificationCounter { attribute, old: new, new: old }
            }
        }
    }
}

/// Ops recorded by one write handle
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub name: String,
    pub ops: Vec<EditOp>,
    /// Counters when the frame was opened
    pub counters: ModificationCounters,
}

/// Stack of open frames on a write target
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    frames: Vec<Frame>,
}

impl Journal {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn open(&mut self, name: &str, counters: ModificationCounters) {
        self.frames.push(Frame {
            name: name.to_string(),
            ops: Vec::new(),
            counters,
        });
    }

    pub fn record(&mut self, op: EditOp) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ops.push(op);
        }
    }

    pub fn close(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Close the innermost frame and append its ops to the parent.
    ///
    /// Returns the closed frame when it was the outermost one.
    pub fn fold(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        match self.frames.last_mut() {
            Some(parent) => {
                parent.ops.extend(frame.ops);
                None
            }
            None => Some(frame),
        }
    }
}

impl Graph {
    /// Apply one op with explicit ids, bumping counters exactly as the
    /// original mutation did.
    pub(crate) fn apply_edit(&mut self, op: &EditOp) -> GraphResult<()> {
        trace!("Applying edit {:?}", op);
        match op {
            EditOp::AddVertex { id, uid } => self.raw_add_vertex(*id, *uid),
            EditOp::RemoveVertex { id, .. } => self.raw_remove_vertex(*id),
            EditOp::AddTransaction { id, source, destination, direction, link, uid } => {
                self.raw_add_transaction(*id, *source, *destination, *direction, *link, *uid)
            }
            EditOp::RemoveTransaction { id, .. } => self.raw_remove_transaction(*id).map(|_| ()),
            EditOp::AddAttribute { descriptor } => self.raw_add_attribute(descriptor.clone()),
            EditOp::RemoveAttribute { descriptor } => self.raw_remove_attribute(descriptor.id),
            EditOp::SetValue { attribute, element, new, .. } => {
                self.raw_set_value(*attribute, *element, new.clone()).map(|_| ())
            }
            EditOp::SetPrimaryKey { element_type, new, .. } => {
                self.raw_set_primary_key(*element_type, new.clone());
                Ok(())
            }
            EditOp::RenameAttribute { attribute, new, .. } => self.raw_rename_attribute(*attribute, new),
            EditOp::DescribeAttribute { attribute, new, .. } => {
                self.raw_describe_attribute(*attribute, new)
            }
            EditOp::SetAttributeDefault { attribute, new, .. } => {
                self.raw_set_attribute_default(*attribute, new.clone())
            }
            EditOp::SetModificationCounters { new, .. } => {
                self.raw_set_modification_counters(new[0], new[1], new[2]);
                Ok(())
            }
            EditOp::SetValueModificationCounter { attribute, new, .. } => {
                self.raw_set_value_modification_counter(*attribute, *new);
                Ok(())
            }
        }
    }

    /// Replay a committed journal onto this graph
    pub(crate) fn replay(&mut self, ops: &[EditOp]) -> GraphResult<()> {
        for op in ops {
            self.apply_edit(op)?;
        }
        Ok(())
    }

    /// Revert a frame's ops in reverse order and restore its counters
    pub(crate) fn undo(&mut self, frame: Frame) -> GraphResult<()> {
        let journal = self.journal.take();
        let mut result = Ok(());
        for op in frame.ops.iter().rev() {
            if let Err(e) = self.apply_edit(&op.inverse()) {
                error!("Undo of '{}' failed at {:?}: {}", frame.name, op, e);
                result = Err(GraphError::IllegalState(format!(
                    "undo of '{}' failed: {}",
                    frame.name, e
                )));
                break;
            }
        }
        self.journal = journal;
        self.counters = frame.counters;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_is_involution() {
        let op = EditOp::SetValue {
            attribute: AttributeId(1),
            element: ElementId(2),
            old: None,
            new: Some(AttributeValue::from("x")),
        };
        assert_eq!(op.inverse().inverse(), op);
        assert_eq!(
            EditOp::AddVertex { id: VertexId(3), uid: 9 }.inverse(),
            EditOp::RemoveVertex { id: VertexId(3), uid: 9 }
        );
    }

    #[test]
    fn test_fold_into_parent() {
        let mut journal = Journal::default();
        journal.open("outer", ModificationCounters::new());
        journal.record(EditOp::AddVertex { id: VertexId(0), uid: 1 });
        journal.open("inner", ModificationCounters::new());
        journal.record(EditOp::AddVertex { id: VertexId(1), uid: 2 });
        assert_eq!(journal.depth(), 2);

        assert!(journal.fold().is_none());
        let outer = journal.fold().unwrap();
        assert_eq!(outer.name, "outer");
        assert_eq!(outer.ops.len(), 2);
        assert_eq!(journal.depth(), 0);
    }

    #[test]
    fn test_record_without_frame_is_dropped() {
        let mut journal = Journal::default();
        journal.record(EditOp::AddVertex { id: VertexId(0), uid: 1 });
        assert!(journal.close().is_none());
    }
}
