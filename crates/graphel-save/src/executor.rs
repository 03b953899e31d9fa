//! The save executor: a resumable state machine that hands statement
//! batches to the caller and takes server-assigned identifiers back.
//!
//! Lifecycle: while inserting, every yielded batch must be answered with
//! [`SaveExecutor::feed_ids`] before later statements can reference the
//! inserted objects. After the last insert batch the remaining updates
//! come as one final batch, then the executor is done and
//! [`SaveExecutor::commit`] folds the recorded state back into the
//! in-memory graph. Nothing in memory changes before `commit`.

use graphel_core::{Error, Object, ObjectId, Result, UsageErrorKind};

use crate::compile::{ParamBuilder, Statement, compile_insert, compile_update};
use crate::graph::iter_graph;
use crate::plan::SavePlan;
use crate::tracker::IdTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Index of the next insert batch to yield
    Inserting(usize),
    Updating,
    Done,
}

/// Drives one computed [`SavePlan`] to completion.
pub struct SaveExecutor {
    roots: Vec<Object>,
    plan: SavePlan,
    phase: Phase,
    /// Server-assigned identifiers for this save's new objects
    ids: IdTracker<ObjectId>,
    params: ParamBuilder,
    /// The insert batch yielded last and not yet answered via `feed_ids`
    pending: Option<Vec<Object>>,
}

impl SaveExecutor {
    pub fn new(roots: Vec<Object>, plan: SavePlan) -> Self {
        SaveExecutor {
            roots,
            phase: Phase::Inserting(0),
            ids: IdTracker::new(),
            params: ParamBuilder::new(),
            pending: None,
            plan,
        }
    }

    /// Whether the most recent batch was an insert batch awaiting
    /// identifiers.
    pub fn expects_ids(&self) -> bool {
        self.pending.is_some()
    }

    /// The next statement batch, or `None` when the plan is exhausted.
    /// Statements are compiled lazily so that identifiers fed back from
    /// earlier batches are available to later ones.
    pub fn next_batch(&mut self) -> Option<Result<Vec<Statement>>> {
        loop {
            match self.phase {
                Phase::Inserting(index) => {
                    if index >= self.plan.insert_batches.len() {
                        self.phase = Phase::Updating;
                        continue;
                    }
                    let batch = self.plan.insert_batches[index].clone();
                    let mut statements = Vec::with_capacity(batch.len());
                    for obj in &batch {
                        match compile_insert(obj, &self.ids, &mut self.params) {
                            Ok(stmt) => statements.push(stmt),
                            Err(err) => return Some(Err(err)),
                        }
                    }
                    self.phase = Phase::Inserting(index + 1);
                    self.pending = Some(batch);
                    return Some(Ok(statements));
                }
                Phase::Updating => {
                    self.phase = Phase::Done;
                    if self.plan.updates.is_empty() {
                        continue;
                    }
                    let mut statements = Vec::with_capacity(self.plan.updates.len());
                    for record in &self.plan.updates {
                        match compile_update(record, &self.ids, &mut self.params) {
                            Ok(stmt) => statements.push(stmt),
                            Err(err) => return Some(Err(err)),
                        }
                    }
                    return Some(Ok(statements));
                }
                Phase::Done => return None,
            }
        }
    }

    /// Record the identifiers the server returned for the last insert
    /// batch, in statement order.
    pub fn feed_ids(&mut self, ids: &[ObjectId]) -> Result<()> {
        let Some(batch) = self.pending.take() else {
            return Err(Error::usage(
                UsageErrorKind::FeedOutOfPhase,
                "no insert batch is awaiting identifiers",
            ));
        };
        if batch.len() != ids.len() {
            let message = format!(
                "insert batch has {} statements but {} identifiers were fed",
                batch.len(),
                ids.len()
            );
            self.pending = Some(batch);
            return Err(Error::usage(UsageErrorKind::FeedCountMismatch, message));
        }
        for (obj, id) in batch.iter().zip(ids) {
            self.ids.track(obj, *id);
        }
        Ok(())
    }

    /// Fold the executed plan back into the in-memory graph: assign the
    /// recorded identifier to each inserted object, reset dirty sets, and
    /// settle container snapshots. Only valid once the plan is exhausted
    /// and every insert batch was answered.
    pub fn commit(&mut self) -> Result<()> {
        if self.phase != Phase::Done || self.pending.is_some() {
            return Err(Error::usage(
                UsageErrorKind::CommitBeforeDone,
                "commit requires the full plan to be consumed first",
            ));
        }
        let visited = iter_graph(&self.roots);
        for obj in &visited {
            if let Some(id) = self.ids.get(obj) {
                obj.commit_identifier(*id)?;
            }
            obj.commit_tracking();
        }
        tracing::debug!(objects = visited.len(), "save committed");
        Ok(())
    }
}

impl Iterator for SaveExecutor {
    type Item = Result<Vec<Statement>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::compute_ops;
    use graphel_core::{Cardinality, ObjectType, Pointer, Value};

    static GROUP: ObjectType = ObjectType {
        name: "default::Group",
        pointers: &[Pointer::property("name", "std::str", Cardinality::One)],
    };

    static USER: ObjectType = ObjectType {
        name: "default::User",
        pointers: &[
            Pointer::property("name", "std::str", Cardinality::One),
            Pointer::link("group", &GROUP, Cardinality::AtMostOne),
            Pointer::link("sponsor", &USER, Cardinality::One),
        ],
    };

    fn executor_for(roots: &[Object]) -> SaveExecutor {
        let plan = compute_ops(roots).unwrap();
        SaveExecutor::new(roots.to_vec(), plan)
    }

    #[test]
    fn full_insert_then_update_cycle() {
        let group = Object::new(&GROUP);
        group.set_property("name", "staff").unwrap();
        let user = Object::new(&USER);
        user.set_property("name", "Alice").unwrap();
        user.set_link("group", group.clone()).unwrap();

        let mut exec = executor_for(&[user.clone()]);

        let inserts = exec.next_batch().unwrap().unwrap();
        assert_eq!(inserts.len(), 2);
        assert!(exec.expects_ids());
        exec.feed_ids(&[ObjectId::from_u128(1), ObjectId::from_u128(2)])
            .unwrap();

        let updates = exec.next_batch().unwrap().unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].text.contains("group :="));
        assert!(exec.next_batch().is_none());

        exec.commit().unwrap();
        assert!(!user.is_new());
        assert!(!group.is_new());
        assert_eq!(user.dirty_fields(), None);
    }

    #[test]
    fn later_batches_see_fed_ids() {
        let sponsor = Object::new(&USER);
        sponsor.set_property("name", "root").unwrap();
        let user = Object::new(&USER);
        user.set_property("name", "junior").unwrap();
        user.set_link("sponsor", sponsor.clone()).unwrap();

        let mut exec = executor_for(&[user]);

        let first = exec.next_batch().unwrap().unwrap();
        assert_eq!(first.len(), 1);
        let sponsor_id = ObjectId::from_u128(11);
        exec.feed_ids(&[sponsor_id]).unwrap();

        let second = exec.next_batch().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(
            second[0]
                .params
                .values()
                .any(|v| *v == Value::Uuid(sponsor_id))
        );
    }

    #[test]
    fn feed_ids_out_of_phase_is_rejected() {
        let user = Object::new(&USER);
        let mut exec = executor_for(&[user]);
        let err = exec.feed_ids(&[ObjectId::from_u128(1)]).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::FeedOutOfPhase));
    }

    #[test]
    fn feed_count_mismatch_is_rejected_and_recoverable() {
        let user = Object::new(&USER);
        let mut exec = executor_for(&[user]);
        exec.next_batch().unwrap().unwrap();

        let err = exec.feed_ids(&[]).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::FeedCountMismatch));
        // The batch stays pending; feeding the right count still works.
        exec.feed_ids(&[ObjectId::from_u128(1)]).unwrap();
    }

    #[test]
    fn commit_before_exhaustion_is_rejected() {
        let user = Object::new(&USER);
        user.set_property("name", "Eve").unwrap();
        let mut exec = executor_for(&[user.clone()]);

        let err = exec.commit().unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::CommitBeforeDone));
        // Dirty state is untouched by the failed commit.
        assert!(user.dirty_fields().unwrap().contains("name"));

        exec.next_batch().unwrap().unwrap();
        let err = exec.commit().unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::CommitBeforeDone));
    }

    #[test]
    fn empty_plan_is_immediately_done() {
        let mut exec = executor_for(&[]);
        assert!(exec.next_batch().is_none());
        exec.commit().unwrap();
    }

    #[test]
    fn iterator_interface_matches_next_batch() {
        let user = Object::new(&USER);
        user.set_property("name", "Zed").unwrap();
        let mut exec = executor_for(&[user]);
        let batch = Iterator::next(&mut exec).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
    }
}
