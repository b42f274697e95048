use crate::store::changes::{ChangeSet, PendingChange};
use crate::store::graph::EntityGraph;

/// Conflict resolution for a context receiving a committed batch
///
/// The writer context keeps its own pending edits (`WriterWins`): it is the
/// single serialized mutation pipeline and must never be silently overridden.
/// The reader context prefers whatever is durable (`StoreWins`): its unsaved
/// scratch edits yield to anything the writer committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    WriterWins,
    StoreWins,
}

/// One logical view over the entity graph: a snapshot plus pending changes
#[derive(Debug)]
pub struct Context {
    pub graph: EntityGraph,
    pub pending: ChangeSet,
    pub policy: MergePolicy,
}

impl Context {
    pub fn new(graph: EntityGraph, policy: MergePolicy) -> Self {
        Self {
            graph,
            pending: ChangeSet::new(),
            policy,
        }
    }

    /// Fold a batch committed by the other context into this one
    ///
    /// Inserts and deletes always apply (a delete also voids any pending
    /// changes for the entity). Field updates are where the policy bites:
    /// under `StoreWins` the incoming durable value replaces both the row and
    /// any conflicting pending edit; under `WriterWins` a pending edit of the
    /// same field shadows the incoming value until this context saves.
    pub fn merge_committed(&mut self, batch: &ChangeSet) {
        for change in batch.iter() {
            match change {
                PendingChange::Insert(row) => {
                    self.graph.apply_insert(row);
                }
                PendingChange::Delete(entity) => {
                    self.pending.drop_entity(entity);
                    self.graph.apply_delete(entity);
                }
                PendingChange::Update {
                    entity,
                    field,
                    value,
                    ..
                } => match self.policy {
                    MergePolicy::StoreWins => {
                        self.pending.remove_update(entity, *field);
                        self.graph.set_field(entity, *field, value, true);
                    }
                    MergePolicy::WriterWins => {
                        if !self.pending.has_update(entity, *field) {
                            self.graph.set_field(entity, *field, value, true);
                        }
                    }
                },
            }
        }
    }
}
