//! Object-graph traversal.

use graphel_core::{FieldValue, Object, Pointer};

use crate::tracker::IdTracker;

fn link_pointers(obj: &Object) -> impl Iterator<Item = &'static Pointer> {
    obj.ty()
        .pointers
        .iter()
        .filter(|p| p.is_link() && !p.computed)
}

/// Objects directly linked from `obj` through non-computed links, single
/// and multi, proxies unwrapped. Absent fields contribute nothing.
fn linked_objects(obj: &Object) -> Vec<Object> {
    let mut out = Vec::new();
    for ptr in link_pointers(obj) {
        obj.with_field(ptr.name, |field| match field {
            Some(FieldValue::Link(Some(linked))) => out.push(linked.object().clone()),
            Some(FieldValue::MultiLink(set)) => {
                out.extend(set.iter().map(|linked| linked.object().clone()));
            }
            _ => {}
        });
    }
    out
}

/// Every object reachable from `roots` through non-computed links, in
/// depth-first pre-order, each instance visited exactly once. Cycles are
/// safe: the visited check is by identity, before descending.
pub fn iter_graph(roots: &[Object]) -> Vec<Object> {
    let mut seen: IdTracker = IdTracker::new();
    let mut out = Vec::new();
    for root in roots {
        visit(root, &mut seen, &mut out);
    }
    tracing::trace!(roots = roots.len(), visited = out.len(), "graph traversal");
    out
}

fn visit(obj: &Object, seen: &mut IdTracker, out: &mut Vec<Object>) {
    if seen.contains(obj) {
        return;
    }
    seen.track(obj, ());
    out.push(obj.clone());
    for child in linked_objects(obj) {
        visit(&child, seen, out);
    }
}

/// The not-yet-persisted objects `obj` requires before it can be inserted:
/// targets of its required, non-computed links. Optional links never block
/// an insert; they are deferred to a follow-up update instead. The result
/// is deduplicated by identity and never includes `obj` itself.
pub fn linked_new_objects(obj: &Object) -> Vec<Object> {
    let mut seen: IdTracker = IdTracker::new();
    seen.track(obj, ());
    let mut out = Vec::new();
    for ptr in link_pointers(obj) {
        if ptr.cardinality.is_optional() {
            continue;
        }
        obj.with_field(ptr.name, |field| {
            let targets: Vec<Object> = match field {
                Some(FieldValue::Link(Some(linked))) => vec![linked.object().clone()],
                Some(FieldValue::MultiLink(set)) => {
                    set.iter().map(|linked| linked.object().clone()).collect()
                }
                _ => Vec::new(),
            };
            for target in targets {
                if target.is_new() && !seen.contains(&target) {
                    seen.track(&target, ());
                    out.push(target);
                }
            }
        });
    }
    out
}

/// Whether `obj` carries a required link back to itself. No single insert
/// statement can satisfy that, so the batcher reports it instead of
/// letting compilation fail on an unresolvable identifier.
pub(crate) fn requires_self_link(obj: &Object) -> bool {
    for ptr in link_pointers(obj) {
        if ptr.cardinality.is_optional() {
            continue;
        }
        let found = obj.with_field(ptr.name, |field| match field {
            Some(FieldValue::Link(Some(linked))) => linked.handle_id() == obj.handle_id(),
            Some(FieldValue::MultiLink(set)) => {
                set.iter().any(|linked| linked.handle_id() == obj.handle_id())
            }
            _ => false,
        });
        if found {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphel_core::{Cardinality, ObjectId, ObjectType, Pointer, Proxy};

    static NODE: ObjectType = ObjectType {
        name: "default::Node",
        pointers: &[
            Pointer::property("name", "std::str", Cardinality::One),
            Pointer::link("next", &NODE, Cardinality::AtMostOne),
            Pointer::link("parent", &NODE, Cardinality::One),
            Pointer::link("children", &NODE, Cardinality::Many),
            Pointer::link("shadow", &NODE, Cardinality::AtMostOne).computed(),
        ],
    };

    #[test]
    fn visits_each_instance_once_in_cycles() {
        let a = Object::new(&NODE);
        let b = Object::new(&NODE);
        a.set_link("next", b.clone()).unwrap();
        b.set_link("next", a.clone()).unwrap();

        let visited = iter_graph(&[a.clone()]);
        assert_eq!(visited.len(), 2);
        assert_eq!(visited[0].handle_id(), a.handle_id());
        assert_eq!(visited[1].handle_id(), b.handle_id());
    }

    #[test]
    fn walks_multi_links_and_unwraps_proxies() {
        let root = Object::new(&NODE);
        let kid = Object::new(&NODE);
        let proxied = Object::new(&NODE);
        root.multi_link_mut("children").unwrap().add(kid.clone());
        root.multi_link_mut("children")
            .unwrap()
            .add(Proxy::new(proxied.clone(), &[]));

        let visited = iter_graph(&[root]);
        let ids: Vec<usize> = visited.iter().map(Object::handle_id).collect();
        assert!(ids.contains(&kid.handle_id()));
        assert!(ids.contains(&proxied.handle_id()));
    }

    #[test]
    fn skips_computed_links_and_tolerates_absent_fields() {
        let root = Object::new(&NODE);
        let hidden = Object::new(&NODE);
        root.load_link("shadow", hidden.clone());

        let visited = iter_graph(&[root]);
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn shared_roots_deduplicate() {
        let shared = Object::new(&NODE);
        let a = Object::new(&NODE);
        let b = Object::new(&NODE);
        a.set_link("next", shared.clone()).unwrap();
        b.set_link("next", shared.clone()).unwrap();

        let visited = iter_graph(&[a, b]);
        assert_eq!(visited.len(), 3);
    }

    #[test]
    fn required_links_gate_readiness() {
        let parent = Object::new(&NODE);
        let optional = Object::new(&NODE);
        let child = Object::new(&NODE);
        child.set_link("parent", parent.clone()).unwrap();
        child.set_link("next", optional).unwrap();

        let deps = linked_new_objects(&child);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].handle_id(), parent.handle_id());
    }

    #[test]
    fn persisted_targets_never_block() {
        let parent = Object::with_id(&NODE, ObjectId::from_u128(1));
        let child = Object::new(&NODE);
        child.set_link("parent", parent).unwrap();
        assert!(linked_new_objects(&child).is_empty());
    }

    #[test]
    fn self_reference_does_not_report_itself() {
        let node = Object::new(&NODE);
        node.set_link("parent", node.clone()).unwrap();
        assert!(linked_new_objects(&node).is_empty());
        assert!(requires_self_link(&node));
    }

    #[test]
    fn optional_self_reference_is_not_a_required_self_link() {
        let node = Object::new(&NODE);
        node.set_link("next", node.clone()).unwrap();
        assert!(!requires_self_link(&node));
    }
}
