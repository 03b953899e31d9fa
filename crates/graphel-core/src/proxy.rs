//! Link-property proxies.
//!
//! A [`Proxy`] pairs an [`Object`] with the link properties of one
//! relationship slot (EdgeQL `@prop` values). The proxy is transparent:
//! equality defers to the wrapped object, and the save machinery unwraps
//! proxies before identity checks so that a direct reference and a
//! proxied reference to the same instance count as one.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result, UsageErrorKind};
use crate::meta::Pointer;
use crate::object::Object;
use crate::value::Value;

struct LinkProps {
    declared: &'static [Pointer],
    values: BTreeMap<&'static str, Value>,
    dirty: Option<BTreeSet<&'static str>>,
}

/// An object reference decorated with link properties.
#[derive(Clone)]
pub struct Proxy {
    target: Object,
    props: Rc<RefCell<LinkProps>>,
}

impl Proxy {
    /// Wrap a target with an empty link-property record. Wrapping an
    /// existing proxy reuses its target; proxies never nest.
    pub fn new(target: impl Into<Linked>, declared: &'static [Pointer]) -> Self {
        Proxy {
            target: target.into().object().clone(),
            props: Rc::new(RefCell::new(LinkProps {
                declared,
                values: BTreeMap::new(),
                dirty: Some(BTreeSet::new()),
            })),
        }
    }

    pub fn target(&self) -> &Object {
        &self.target
    }

    fn declared_prop(&self, name: &str) -> Result<&'static Pointer> {
        let declared: &'static [Pointer] = self.props.borrow().declared;
        declared
            .iter()
            .find(|p| p.name == name && p.is_property())
            .ok_or_else(|| {
                Error::usage(
                    UsageErrorKind::UnknownPointer,
                    format!("no link property '{}' declared", name),
                )
            })
    }

    /// Assign a link property. Equality-gated like object properties.
    pub fn set_prop(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let ptr = self.declared_prop(name)?;
        let value = value.into();
        if !value.conforms_to(ptr.typexpr) {
            return Err(Error::type_mismatch(
                ptr.typexpr,
                value.type_name(),
                Some(name),
            ));
        }
        let mut props = self.props.borrow_mut();
        if props.values.get(ptr.name) == Some(&value) {
            return Ok(());
        }
        props.values.insert(ptr.name, value);
        props.dirty.get_or_insert_with(BTreeSet::new).insert(ptr.name);
        Ok(())
    }

    /// Populate a link property from fetched data, without tracking.
    pub fn load_prop(&self, name: &'static str, value: Value) {
        let mut props = self.props.borrow_mut();
        props.values.insert(name, value);
        props.dirty = None;
    }

    pub fn prop(&self, name: &str) -> Option<Value> {
        self.props.borrow().values.get(name).cloned()
    }

    /// Link properties assigned since the last commit, in name order.
    pub fn changed_props(&self) -> Vec<(&'static str, Value)> {
        let props = self.props.borrow();
        let Some(dirty) = &props.dirty else {
            return Vec::new();
        };
        props
            .values
            .iter()
            .filter(|(name, _)| dirty.contains(*name))
            .map(|(name, value)| (*name, value.clone()))
            .collect()
    }

    pub fn has_changed_props(&self) -> bool {
        self.props
            .borrow()
            .dirty
            .as_ref()
            .is_some_and(|d| !d.is_empty())
    }

    /// Settle the link-property record after a successful save.
    pub fn commit_props(&self) {
        self.props.borrow_mut().dirty = None;
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy({})", self.target.describe())
    }
}

/// Either a direct object reference or a proxied one.
#[derive(Clone)]
pub enum Linked {
    Object(Object),
    Proxy(Proxy),
}

impl Linked {
    /// The underlying object, proxies unwrapped.
    pub fn object(&self) -> &Object {
        match self {
            Linked::Object(obj) => obj,
            Linked::Proxy(proxy) => proxy.target(),
        }
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        match self {
            Linked::Proxy(proxy) => Some(proxy),
            Linked::Object(_) => None,
        }
    }

    /// Identity of the underlying object.
    pub fn handle_id(&self) -> usize {
        self.object().handle_id()
    }
}

impl PartialEq for Linked {
    fn eq(&self, other: &Self) -> bool {
        self.object() == other.object()
    }
}

impl From<Object> for Linked {
    fn from(obj: Object) -> Self {
        Linked::Object(obj)
    }
}

impl From<&Object> for Linked {
    fn from(obj: &Object) -> Self {
        Linked::Object(obj.clone())
    }
}

impl From<Proxy> for Linked {
    fn from(proxy: Proxy) -> Self {
        Linked::Proxy(proxy)
    }
}

impl fmt::Debug for Linked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linked::Object(obj) => obj.fmt(f),
            Linked::Proxy(proxy) => proxy.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectId;
    use crate::meta::{Cardinality, ObjectType};

    static MEMBERSHIP_PROPS: &[Pointer] = &[
        Pointer::property("role", "std::str", Cardinality::AtMostOne),
        Pointer::property("rank", "std::int64", Cardinality::AtMostOne),
    ];

    static USER: ObjectType = ObjectType {
        name: "default::User",
        pointers: &[Pointer::property("name", "std::str", Cardinality::One)],
    };

    #[test]
    fn proxy_is_transparent_for_equality() {
        let user = Object::with_id(&USER, ObjectId::from_u128(1));
        let proxy = Proxy::new(user.clone(), MEMBERSHIP_PROPS);
        let linked_direct = Linked::from(user.clone());
        let linked_via = Linked::from(proxy);
        assert_eq!(linked_direct, linked_via);
        assert_eq!(linked_direct.handle_id(), linked_via.handle_id());
    }

    #[test]
    fn proxies_never_nest() {
        let user = Object::new(&USER);
        let inner = Proxy::new(user.clone(), MEMBERSHIP_PROPS);
        let outer = Proxy::new(inner, MEMBERSHIP_PROPS);
        assert_eq!(outer.target().handle_id(), user.handle_id());
    }

    #[test]
    fn prop_changes_are_tracked() {
        let user = Object::new(&USER);
        let proxy = Proxy::new(user, MEMBERSHIP_PROPS);
        assert!(!proxy.has_changed_props());

        proxy.set_prop("role", "admin").unwrap();
        assert!(proxy.has_changed_props());
        assert_eq!(
            proxy.changed_props(),
            vec![("role", Value::Str("admin".into()))]
        );

        proxy.commit_props();
        assert!(!proxy.has_changed_props());
        assert_eq!(proxy.prop("role"), Some(Value::Str("admin".into())));

        proxy.set_prop("role", "admin").unwrap();
        assert!(!proxy.has_changed_props());
    }

    #[test]
    fn loaded_props_do_not_count_as_changes() {
        let user = Object::new(&USER);
        let proxy = Proxy::new(user, MEMBERSHIP_PROPS);
        proxy.load_prop("role", Value::Str("admin".into()));
        assert!(!proxy.has_changed_props());
        assert!(proxy.changed_props().is_empty());

        proxy.set_prop("role", "admin").unwrap();
        assert!(!proxy.has_changed_props());
        proxy.set_prop("role", "owner").unwrap();
        assert!(proxy.has_changed_props());
    }

    #[test]
    fn prop_validation() {
        let user = Object::new(&USER);
        let proxy = Proxy::new(user, MEMBERSHIP_PROPS);
        assert!(proxy.set_prop("role", 7i64).is_err());
        let err = proxy.set_prop("missing", "x").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownPointer));
    }
}
