//! Identity-keyed object tracking.

use std::collections::HashMap;

use graphel_core::Object;

/// A map over object handles keyed by in-memory identity, never by domain
/// equality. Two unpersisted instances with identical contents stay
/// distinct; two handles to the same instance collapse to one entry.
#[derive(Debug, Default)]
pub struct IdTracker<V = ()> {
    seen: HashMap<usize, (Object, V)>,
}

impl<V> IdTracker<V> {
    pub fn new() -> Self {
        IdTracker {
            seen: HashMap::new(),
        }
    }

    /// Track an object with an associated value, replacing any previous
    /// entry for the same instance.
    pub fn track(&mut self, obj: &Object, value: V) {
        self.seen.insert(obj.handle_id(), (obj.clone(), value));
    }

    pub fn untrack(&mut self, obj: &Object) {
        self.seen.remove(&obj.handle_id());
    }

    pub fn untrack_many<'a>(&mut self, objs: impl IntoIterator<Item = &'a Object>) {
        for obj in objs {
            self.untrack(obj);
        }
    }

    pub fn contains(&self, obj: &Object) -> bool {
        self.seen.contains_key(&obj.handle_id())
    }

    pub fn get(&self, obj: &Object) -> Option<&V> {
        self.seen.get(&obj.handle_id()).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.seen.values().map(|(obj, _)| obj)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Object, &V)> {
        self.seen.values().map(|(obj, v)| (obj, v))
    }
}

impl<V: Default> IdTracker<V> {
    pub fn track_many<'a>(&mut self, objs: impl IntoIterator<Item = &'a Object>) {
        for obj in objs {
            self.track(obj, V::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphel_core::{Cardinality, ObjectId, ObjectType, Pointer};

    static TAG: ObjectType = ObjectType {
        name: "default::Tag",
        pointers: &[Pointer::property("label", "std::str", Cardinality::One)],
    };

    #[test]
    fn tracks_by_identity_not_equality() {
        let a = Object::with_id(&TAG, ObjectId::from_u128(1));
        let b = Object::with_id(&TAG, ObjectId::from_u128(1));
        assert_eq!(a, b);

        let mut tracker: IdTracker = IdTracker::new();
        tracker.track(&a, ());
        assert!(tracker.contains(&a));
        assert!(!tracker.contains(&b));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn handle_clones_collapse() {
        let a = Object::new(&TAG);
        let alias = a.clone();
        let mut tracker: IdTracker = IdTracker::new();
        tracker.track_many([&a, &alias]);
        assert_eq!(tracker.len(), 1);

        tracker.untrack(&alias);
        assert!(tracker.is_empty());
    }

    #[test]
    fn carries_associated_values() {
        let a = Object::new(&TAG);
        let mut tracker: IdTracker<u32> = IdTracker::new();
        tracker.track(&a, 7);
        assert_eq!(tracker.get(&a), Some(&7));
        tracker.track(&a, 8);
        assert_eq!(tracker.get(&a), Some(&8));
        assert_eq!(tracker.len(), 1);
    }
}
