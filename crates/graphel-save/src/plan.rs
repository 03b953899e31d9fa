//! Change classification and dependency batching.
//!
//! [`compute_ops`] walks the graph once and splits the work into two
//! phases: new objects, grouped into insert batches such that every
//! required link target of a batch lands in an earlier batch, and change
//! records that become update statements after all inserts ran.

use graphel_core::{
    DependencyError, Error, FieldValue, Linked, LinkSet, Object, Pointer, Proxy, Result, Value,
};

use crate::graph::{iter_graph, linked_new_objects, requires_self_link};
use crate::tracker::IdTracker;

/// One single-valued assignment on an object.
#[derive(Debug, Clone)]
pub enum FieldChange {
    Property {
        pointer: &'static Pointer,
        value: Value,
    },
    SingleLink {
        pointer: &'static Pointer,
        /// `None` compiles to clearing the link
        target: Option<Linked>,
    },
}

/// Element-level delta of a multi property.
#[derive(Debug, Clone)]
pub struct MultiPropDelta {
    pub pointer: &'static Pointer,
    pub added: Vec<Value>,
    pub removed: Vec<Value>,
}

/// Element-level delta of a multi link.
#[derive(Debug, Clone)]
pub struct MultiLinkDelta {
    pub pointer: &'static Pointer,
    pub added: Vec<Linked>,
    /// Unwrapped removal targets; never includes unpersisted objects
    pub removed: Vec<Object>,
}

/// Everything that must change on one object via an update statement.
///
/// Multi-property deltas stay separate from `fields`: single-valued
/// assignments and element-level deltas compile to different shapes.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub object: Object,
    pub fields: Vec<FieldChange>,
    pub multi_props: Vec<MultiPropDelta>,
    pub multi_links: Vec<MultiLinkDelta>,
}

impl ChangeRecord {
    fn new(object: Object) -> Self {
        ChangeRecord {
            object,
            fields: Vec::new(),
            multi_props: Vec::new(),
            multi_links: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.multi_props.is_empty() && self.multi_links.is_empty()
    }
}

/// The ordered work a save must perform.
#[derive(Debug, Default)]
pub struct SavePlan {
    /// Insert batches in dependency order; statements within a batch are
    /// mutually independent.
    pub insert_batches: Vec<Vec<Object>>,
    /// Update records, applied after every insert batch.
    pub updates: Vec<ChangeRecord>,
}

impl SavePlan {
    pub fn is_empty(&self) -> bool {
        self.insert_batches.is_empty() && self.updates.is_empty()
    }
}

/// Walk the graph under `roots`, classify every reachable object, and
/// order the inserts so that required link targets always precede their
/// dependents. Fails when new objects form a required-link cycle.
#[tracing::instrument(skip_all, fields(roots = roots.len()))]
pub fn compute_ops(roots: &[Object]) -> Result<SavePlan> {
    let mut new_pool: Vec<Object> = Vec::new();
    let mut updates: Vec<ChangeRecord> = Vec::new();

    for obj in iter_graph(roots) {
        if obj.is_new() {
            let record = deferred_record(&obj);
            new_pool.push(obj);
            if !record.is_empty() {
                updates.push(record);
            }
        } else if let Some(record) = existing_record(&obj) {
            updates.push(record);
        }
    }

    let insert_batches = batch_inserts(new_pool)?;
    tracing::debug!(
        batches = insert_batches.len(),
        updates = updates.len(),
        "save plan computed"
    );
    Ok(SavePlan {
        insert_batches,
        updates,
    })
}

/// The part of a new object its insert statement cannot carry: optional
/// link targets are deferred to a follow-up update, so that optional
/// reference cycles never deadlock the batching.
fn deferred_record(obj: &Object) -> ChangeRecord {
    let mut record = ChangeRecord::new(obj.clone());
    for ptr in obj.ty().pointers_sorted() {
        if !ptr.is_link() || ptr.computed || ptr.readonly || !ptr.cardinality.is_optional() {
            continue;
        }
        obj.with_field(ptr.name, |field| match field {
            Some(FieldValue::Link(Some(linked))) => {
                record.fields.push(FieldChange::SingleLink {
                    pointer: ptr,
                    target: Some(linked.clone()),
                });
            }
            Some(FieldValue::MultiLink(set)) if !set.is_empty() => {
                record.multi_links.push(MultiLinkDelta {
                    pointer: ptr,
                    added: set.iter().cloned().collect(),
                    removed: Vec::new(),
                });
            }
            _ => {}
        });
    }
    record
}

/// Changes recorded on an already-persisted object, or `None` when it is
/// clean.
fn existing_record(obj: &Object) -> Option<ChangeRecord> {
    let mut record = ChangeRecord::new(obj.clone());
    let dirty = obj.dirty_fields().unwrap_or_default();

    for ptr in obj.ty().pointers_sorted() {
        if ptr.computed || ptr.readonly {
            continue;
        }
        if ptr.cardinality.is_multi() {
            obj.with_field(ptr.name, |field| match field {
                Some(FieldValue::MultiProperty(list)) if list.has_changes() => {
                    record.multi_props.push(MultiPropDelta {
                        pointer: ptr,
                        added: list.get_added(),
                        removed: list.get_removed(),
                    });
                }
                Some(FieldValue::MultiLink(set)) => {
                    let delta = multi_link_delta(ptr, set);
                    if !delta.added.is_empty() || !delta.removed.is_empty() {
                        record.multi_links.push(delta);
                    }
                }
                _ => {}
            });
        } else if dirty.contains(ptr.name) {
            obj.with_field(ptr.name, |field| match field {
                Some(FieldValue::Property(value)) => {
                    record.fields.push(FieldChange::Property {
                        pointer: ptr,
                        value: value.clone(),
                    });
                }
                Some(FieldValue::Link(target)) => {
                    record.fields.push(FieldChange::SingleLink {
                        pointer: ptr,
                        target: target.clone(),
                    });
                }
                _ => {}
            });
        } else if ptr.is_link() {
            // Untouched link slot, but the proxy's link properties may
            // have changed under it.
            obj.with_field(ptr.name, |field| {
                if let Some(FieldValue::Link(Some(linked))) = field {
                    if linked.proxy().is_some_and(Proxy::has_changed_props) {
                        record.fields.push(FieldChange::SingleLink {
                            pointer: ptr,
                            target: Some(linked.clone()),
                        });
                    }
                }
            });
        }
    }

    if record.is_empty() { None } else { Some(record) }
}

fn multi_link_delta(ptr: &'static Pointer, set: &LinkSet) -> MultiLinkDelta {
    let mut added = set.get_added();
    // Elements whose link properties changed in place re-enter the add
    // set; `+=` overwrites their property values.
    for linked in set.iter() {
        let prop_changed = linked.proxy().is_some_and(Proxy::has_changed_props);
        if prop_changed && !added.iter().any(|a| a.handle_id() == linked.handle_id()) {
            added.push(linked.clone());
        }
    }
    // Removing an element that was never persisted needs no statement.
    let removed: Vec<Object> = set
        .get_removed()
        .iter()
        .map(|linked| linked.object().clone())
        .filter(|obj| !obj.is_new())
        .collect();
    MultiLinkDelta {
        pointer: ptr,
        added,
        removed,
    }
}

/// Readiness-scan topological batching over the new-object pool.
fn batch_inserts(mut remaining: Vec<Object>) -> Result<Vec<Vec<Object>>> {
    let mut batches: Vec<Vec<Object>> = Vec::new();
    let mut planned: IdTracker = IdTracker::new();

    while !remaining.is_empty() {
        let mut ready: Vec<Object> = Vec::new();
        let mut blocked: Vec<Object> = Vec::new();
        for obj in remaining {
            // A required link back to the object itself can never resolve.
            if requires_self_link(&obj) {
                blocked.push(obj);
                continue;
            }
            let deps = linked_new_objects(&obj);
            if deps.iter().all(|dep| planned.contains(dep)) {
                ready.push(obj);
            } else {
                blocked.push(obj);
            }
        }
        if ready.is_empty() {
            let stuck: Vec<String> = blocked.iter().map(Object::describe).collect();
            return Err(Error::Dependency(DependencyError {
                stuck,
                message: "cyclic dependency among new objects via required links".to_string(),
            }));
        }
        planned.track_many(&ready);
        batches.push(ready);
        remaining = blocked;
    }
    Ok(batches)
}
