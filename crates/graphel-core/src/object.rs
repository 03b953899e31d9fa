//! The `Object` runtime handle.
//!
//! An [`Object`] is a shared handle (`Rc<RefCell<..>>`) to one domain
//! instance. Cloning the handle never copies the instance; two clones
//! observe each other's mutations, which is what lets a single instance
//! appear at several places in an object graph.
//!
//! Two distinct notions of sameness apply:
//!
//! - **domain equality** (`PartialEq`): two handles are equal when both
//!   carry the same persisted identifier, or when they are literally the
//!   same in-memory instance;
//! - **identity** ([`Object::handle_id`]): the in-memory instance address,
//!   used by the save machinery to deduplicate regardless of id state.
//!
//! The planner is single-threaded, hence `Rc` rather than `Arc`.

use std::cell::{RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result, UsageErrorKind};
use crate::id::ObjectId;
use crate::meta::{ObjectType, Pointer};
use crate::proxy::Linked;
use crate::tracked::{LinkSet, TrackedList};
use crate::value::Value;

/// Storage for one declared pointer on an object.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Property(Value),
    MultiProperty(TrackedList),
    /// `None` records an explicit clearing of an optional link
    Link(Option<Linked>),
    MultiLink(LinkSet),
}

struct ObjectData {
    ty: &'static ObjectType,
    id: Option<ObjectId>,
    fields: BTreeMap<&'static str, FieldValue>,
    /// `None`: no change tracking recorded (fetched, untouched).
    /// `Some(set)`: the single-valued fields assigned since the last
    /// commit; an empty set on a new object means "constructed bare".
    dirty: Option<BTreeSet<&'static str>>,
}

impl ObjectData {
    fn mark_dirty(&mut self, name: &'static str) {
        self.dirty.get_or_insert_with(BTreeSet::new).insert(name);
    }
}

/// A shared handle to one domain object instance.
#[derive(Clone)]
pub struct Object {
    inner: Rc<RefCell<ObjectData>>,
}

impl Object {
    /// A fresh, not-yet-persisted object. Every field assigned afterwards
    /// is recorded as dirty.
    pub fn new(ty: &'static ObjectType) -> Self {
        Object {
            inner: Rc::new(RefCell::new(ObjectData {
                ty,
                id: None,
                fields: BTreeMap::new(),
                dirty: Some(BTreeSet::new()),
            })),
        }
    }

    /// An already-persisted object materialized from fetched data. Change
    /// tracking starts unset; use the `load_*` methods to populate fields
    /// without marking them dirty.
    pub fn with_id(ty: &'static ObjectType, id: ObjectId) -> Self {
        Object {
            inner: Rc::new(RefCell::new(ObjectData {
                ty,
                id: Some(id),
                fields: BTreeMap::new(),
                dirty: None,
            })),
        }
    }

    pub fn ty(&self) -> &'static ObjectType {
        self.inner.borrow().ty
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.inner.borrow().id
    }

    /// Whether this object has not been persisted yet.
    pub fn is_new(&self) -> bool {
        self.inner.borrow().id.is_none()
    }

    /// In-memory instance identity; stable for the lifetime of the
    /// instance and independent of the persisted id.
    pub fn handle_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// A short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        let data = self.inner.borrow();
        match data.id {
            Some(id) => format!("{}({})", data.ty.name, id),
            None => format!("{}@{:#x}", data.ty.name, self.handle_id()),
        }
    }

    fn writable_pointer(&self, name: &str) -> Result<&'static Pointer> {
        let ty = self.ty();
        let ptr = ty.pointer(name).ok_or_else(|| {
            Error::usage(
                UsageErrorKind::UnknownPointer,
                format!("no pointer '{}' declared on {}", name, ty.name),
            )
        })?;
        if ptr.computed || ptr.readonly {
            return Err(Error::usage(
                UsageErrorKind::ImmutablePointer,
                format!("pointer '{}' on {} is not writable", name, ty.name),
            ));
        }
        Ok(ptr)
    }

    /// Assign a single-valued property. No-op (and no dirty mark) when the
    /// new value equals the current one.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let ptr = self.writable_pointer(name)?;
        if ptr.is_link() {
            return Err(Error::type_mismatch("property", "link", Some(name)));
        }
        if ptr.cardinality.is_multi() {
            return Err(Error::type_mismatch(
                "single property",
                "multi property",
                Some(name),
            ));
        }
        let value = value.into();
        if !value.conforms_to(ptr.typexpr) {
            return Err(Error::type_mismatch(
                ptr.typexpr,
                value.type_name(),
                Some(name),
            ));
        }
        let mut data = self.inner.borrow_mut();
        if let Some(FieldValue::Property(existing)) = data.fields.get(ptr.name) {
            if *existing == value {
                return Ok(());
            }
        }
        data.fields.insert(ptr.name, FieldValue::Property(value));
        data.mark_dirty(ptr.name);
        Ok(())
    }

    /// Assign a single link. No-op when both the current and the new
    /// target are plain objects comparing equal; proxies always record,
    /// since their link properties may differ.
    pub fn set_link(&self, name: &str, target: impl Into<Linked>) -> Result<()> {
        let ptr = self.single_link_pointer(name)?;
        let target = target.into();
        let mut data = self.inner.borrow_mut();
        if let Some(FieldValue::Link(Some(existing))) = data.fields.get(ptr.name) {
            if existing.proxy().is_none() && target.proxy().is_none() && *existing == target {
                return Ok(());
            }
        }
        data.fields.insert(ptr.name, FieldValue::Link(Some(target)));
        data.mark_dirty(ptr.name);
        Ok(())
    }

    /// Clear an optional single link; compiles to `<Target>{}` on update.
    pub fn clear_link(&self, name: &str) -> Result<()> {
        let ptr = self.single_link_pointer(name)?;
        if !ptr.cardinality.is_optional() {
            return Err(Error::usage(
                UsageErrorKind::FieldRemoval,
                format!("required link '{}' cannot be cleared", name),
            ));
        }
        let mut data = self.inner.borrow_mut();
        if let Some(FieldValue::Link(None)) = data.fields.get(ptr.name) {
            return Ok(());
        }
        data.fields.insert(ptr.name, FieldValue::Link(None));
        data.mark_dirty(ptr.name);
        Ok(())
    }

    fn single_link_pointer(&self, name: &str) -> Result<&'static Pointer> {
        let ptr = self.writable_pointer(name)?;
        if ptr.is_property() {
            return Err(Error::type_mismatch("link", "property", Some(name)));
        }
        if ptr.cardinality.is_multi() {
            return Err(Error::type_mismatch(
                "single link",
                "multi link",
                Some(name),
            ));
        }
        Ok(ptr)
    }

    /// Mutable access to a multi-property container, created empty on
    /// first touch. Element additions and removals are tracked by the
    /// container itself, not the object's dirty set.
    pub fn multi_property_mut(&self, name: &str) -> Result<RefMut<'_, TrackedList>> {
        let ptr = self.writable_pointer(name)?;
        if ptr.is_link() || !ptr.cardinality.is_multi() {
            return Err(Error::type_mismatch(
                "multi property",
                if ptr.is_link() { "link" } else { "single property" },
                Some(name),
            ));
        }
        {
            let mut data = self.inner.borrow_mut();
            data.fields
                .entry(ptr.name)
                .or_insert_with(|| FieldValue::MultiProperty(TrackedList::new(ptr.typexpr)));
        }
        let data = self.inner.borrow_mut();
        RefMut::filter_map(data, |d| match d.fields.get_mut(ptr.name) {
            Some(FieldValue::MultiProperty(list)) => Some(list),
            _ => None,
        })
        .map_err(|_| Error::type_mismatch("multi property", "other field shape", Some(name)))
    }

    /// Mutable access to a multi-link container, created empty on first
    /// touch.
    pub fn multi_link_mut(&self, name: &str) -> Result<RefMut<'_, LinkSet>> {
        let ptr = self.writable_pointer(name)?;
        if ptr.is_property() || !ptr.cardinality.is_multi() {
            return Err(Error::type_mismatch(
                "multi link",
                if ptr.is_property() { "property" } else { "single link" },
                Some(name),
            ));
        }
        {
            let mut data = self.inner.borrow_mut();
            data.fields
                .entry(ptr.name)
                .or_insert_with(|| FieldValue::MultiLink(LinkSet::new()));
        }
        let data = self.inner.borrow_mut();
        RefMut::filter_map(data, |d| match d.fields.get_mut(ptr.name) {
            Some(FieldValue::MultiLink(set)) => Some(set),
            _ => None,
        })
        .map_err(|_| Error::type_mismatch("multi link", "other field shape", Some(name)))
    }

    /// Removing a declared field is not supported: the reset semantics
    /// (revert to default vs. delete) are schema-dependent.
    pub fn remove_field(&self, name: &str) -> Result<()> {
        let ty = self.ty();
        if ty.pointer(name).is_none() {
            return Err(Error::usage(
                UsageErrorKind::UnknownPointer,
                format!("no pointer '{}' declared on {}", name, ty.name),
            ));
        }
        Err(Error::usage(
            UsageErrorKind::FieldRemoval,
            format!("field '{}' on {} cannot be removed", name, ty.name),
        ))
    }

    // Load-path setters: populate fields from fetched data without
    // recording changes.

    pub fn load_property(&self, name: &'static str, value: Value) {
        self.inner
            .borrow_mut()
            .fields
            .insert(name, FieldValue::Property(value));
    }

    pub fn load_link(&self, name: &'static str, target: impl Into<Linked>) {
        self.inner
            .borrow_mut()
            .fields
            .insert(name, FieldValue::Link(Some(target.into())));
    }

    pub fn load_multi_property(&self, name: &'static str, list: TrackedList) {
        self.inner
            .borrow_mut()
            .fields
            .insert(name, FieldValue::MultiProperty(list));
    }

    pub fn load_multi_link(&self, name: &'static str, set: LinkSet) {
        self.inner
            .borrow_mut()
            .fields
            .insert(name, FieldValue::MultiLink(set));
    }

    // Read accessors.

    pub fn property(&self, name: &str) -> Option<Value> {
        match self.inner.borrow().fields.get(name) {
            Some(FieldValue::Property(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// The current single-link target; `None` when the field is absent or
    /// explicitly cleared.
    pub fn link(&self, name: &str) -> Option<Linked> {
        match self.inner.borrow().fields.get(name) {
            Some(FieldValue::Link(target)) => target.clone(),
            _ => None,
        }
    }

    /// Borrow-scoped access to raw field storage. Low-level; the save
    /// planner uses this to walk links and diff containers.
    pub fn with_field<R>(&self, name: &str, f: impl FnOnce(Option<&FieldValue>) -> R) -> R {
        let data = self.inner.borrow();
        f(data.fields.get(name))
    }

    /// The single-valued fields assigned since the last commit, or `None`
    /// when no tracking has been recorded.
    pub fn dirty_fields(&self) -> Option<BTreeSet<&'static str>> {
        self.inner.borrow().dirty.clone()
    }

    /// Record the server-assigned identifier. Idempotent for the same id;
    /// assigning a different one is a usage error.
    pub fn commit_identifier(&self, id: ObjectId) -> Result<()> {
        let mut data = self.inner.borrow_mut();
        match data.id {
            Some(existing) if existing == id => Ok(()),
            Some(existing) => Err(Error::usage(
                UsageErrorKind::IdentifierReassigned,
                format!(
                    "{} already has identifier {}, refusing to assign {}",
                    data.ty.name, existing, id
                ),
            )),
            None => {
                data.id = Some(id);
                Ok(())
            }
        }
    }

    /// Mark every tracked change on this object as persisted: reset the
    /// dirty set, snapshot the containers, settle link-property records.
    pub fn commit_tracking(&self) {
        let mut data = self.inner.borrow_mut();
        data.dirty = None;
        for field in data.fields.values_mut() {
            match field {
                FieldValue::MultiProperty(list) => list.commit(),
                FieldValue::MultiLink(set) => {
                    for linked in set.items() {
                        if let Some(proxy) = linked.proxy() {
                            proxy.commit_props();
                        }
                    }
                    set.commit();
                }
                FieldValue::Link(Some(linked)) => {
                    if let Some(proxy) = linked.proxy() {
                        proxy.commit_props();
                    }
                }
                _ => {}
            }
        }
    }
}

impl PartialEq for Object {
    /// Domain equality: same instance, or both persisted with the same id.
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Object {
    // Deliberately shallow: object graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Cardinality;

    static TAG: ObjectType = ObjectType {
        name: "default::Tag",
        pointers: &[Pointer::property("label", "std::str", Cardinality::One)],
    };

    static POST: ObjectType = ObjectType {
        name: "default::Post",
        pointers: &[
            Pointer::property("title", "std::str", Cardinality::One),
            Pointer::property("views", "std::int64", Cardinality::AtMostOne),
            Pointer::property("keywords", "std::str", Cardinality::Many),
            Pointer::link("primary_tag", &TAG, Cardinality::AtMostOne),
            Pointer::link("tags", &TAG, Cardinality::Many),
            Pointer::property("score", "std::int64", Cardinality::One).computed(),
        ],
    };

    #[test]
    fn fresh_object_tracks_assignments() {
        let post = Object::new(&POST);
        assert!(post.is_new());
        assert_eq!(post.dirty_fields(), Some(BTreeSet::new()));

        post.set_property("title", "hello").unwrap();
        post.set_property("views", 3i64).unwrap();
        let dirty = post.dirty_fields().unwrap();
        assert!(dirty.contains("title"));
        assert!(dirty.contains("views"));
    }

    #[test]
    fn equal_reassignment_does_not_mark_dirty() {
        let post = Object::with_id(&POST, ObjectId::from_u128(7));
        post.load_property("title", Value::Str("hello".into()));
        assert_eq!(post.dirty_fields(), None);

        post.set_property("title", "hello").unwrap();
        assert_eq!(post.dirty_fields(), None);

        post.set_property("title", "changed").unwrap();
        assert_eq!(
            post.dirty_fields().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["title"]
        );
    }

    #[test]
    fn type_and_pointer_validation() {
        let post = Object::new(&POST);
        assert!(post.set_property("title", 42i64).is_err());
        assert!(post.set_property("score", 1i64).is_err());
        let err = post.set_property("nope", 1i64).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownPointer));
        assert!(post.set_property("keywords", "x").is_err());
        assert!(post.set_property("primary_tag", "x").is_err());
    }

    #[test]
    fn field_removal_is_rejected() {
        let post = Object::new(&POST);
        let err = post.remove_field("title").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::FieldRemoval));
    }

    #[test]
    fn domain_equality_vs_identity() {
        let a = Object::with_id(&TAG, ObjectId::from_u128(1));
        let b = Object::with_id(&TAG, ObjectId::from_u128(1));
        let c = Object::with_id(&TAG, ObjectId::from_u128(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.handle_id(), b.handle_id());

        let new1 = Object::new(&TAG);
        let new2 = Object::new(&TAG);
        assert_ne!(new1, new2);
        assert_eq!(new1, new1.clone());
    }

    #[test]
    fn clone_is_a_shared_handle() {
        let post = Object::new(&POST);
        let alias = post.clone();
        alias.set_property("title", "shared").unwrap();
        assert_eq!(post.property("title"), Some(Value::Str("shared".into())));
        assert_eq!(post.handle_id(), alias.handle_id());
    }

    #[test]
    fn link_assignment_gates_on_equality() {
        let post = Object::with_id(&POST, ObjectId::from_u128(10));
        let tag = Object::with_id(&TAG, ObjectId::from_u128(20));
        post.load_link("primary_tag", tag.clone());
        assert_eq!(post.dirty_fields(), None);

        let same_tag = Object::with_id(&TAG, ObjectId::from_u128(20));
        post.set_link("primary_tag", same_tag).unwrap();
        assert_eq!(post.dirty_fields(), None);

        let other = Object::with_id(&TAG, ObjectId::from_u128(21));
        post.set_link("primary_tag", other).unwrap();
        assert!(post.dirty_fields().unwrap().contains("primary_tag"));
    }

    #[test]
    fn clearing_optional_link() {
        let post = Object::with_id(&POST, ObjectId::from_u128(10));
        post.clear_link("primary_tag").unwrap();
        assert!(post.dirty_fields().unwrap().contains("primary_tag"));
        assert!(post.link("primary_tag").is_none());
    }

    #[test]
    fn commit_identifier_is_exactly_once() {
        let post = Object::new(&POST);
        let id = ObjectId::from_u128(42);
        post.commit_identifier(id).unwrap();
        post.commit_identifier(id).unwrap();
        let err = post.commit_identifier(ObjectId::from_u128(43)).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::IdentifierReassigned));
        assert_eq!(post.id(), Some(id));
    }

    #[test]
    fn commit_tracking_resets_dirty_and_containers() {
        let post = Object::new(&POST);
        post.set_property("title", "hello").unwrap();
        post.multi_property_mut("keywords")
            .unwrap()
            .add(Value::Str("rust".into()))
            .unwrap();

        post.commit_tracking();
        assert_eq!(post.dirty_fields(), None);
        let added = post
            .with_field("keywords", |f| match f {
                Some(FieldValue::MultiProperty(list)) => list.get_added(),
                _ => panic!("keywords container missing"),
            });
        assert!(added.is_empty());
    }
}
