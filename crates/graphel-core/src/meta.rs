//! Pointer reflection: static descriptors of object types and their
//! pointers.
//!
//! Descriptor tables are `&'static` and usually produced by code
//! generation; handing an `Object` its `&'static ObjectType` is the only
//! capability the planner needs, so there is no global type registry.

use std::fmt;

/// Whether a pointer carries a scalar value or a link to another object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Property,
    Link,
}

/// Declared cardinality of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one (required single)
    One,
    /// Zero or one (optional single)
    AtMostOne,
    /// Zero or more (optional multi)
    Many,
    /// One or more (required multi)
    AtLeastOne,
}

impl Cardinality {
    pub const fn is_multi(self) -> bool {
        matches!(self, Cardinality::Many | Cardinality::AtLeastOne)
    }

    pub const fn is_optional(self) -> bool {
        matches!(self, Cardinality::AtMostOne | Cardinality::Many)
    }
}

/// A declared pointer on an object type.
#[derive(Debug)]
pub struct Pointer {
    pub name: &'static str,
    pub kind: PointerKind,
    pub cardinality: Cardinality,
    /// Computed by the server; never written by the client
    pub computed: bool,
    /// Writable only at insert time by the server (e.g. `id`)
    pub readonly: bool,
    /// Schema type expression for properties (`std::str`,
    /// `array<std::int64>`, ...); empty for links
    pub typexpr: &'static str,
    /// Link target type; `None` for properties
    pub target: Option<&'static ObjectType>,
    /// Link properties declared on this link
    pub properties: &'static [Pointer],
}

impl Pointer {
    pub const fn property(
        name: &'static str,
        typexpr: &'static str,
        cardinality: Cardinality,
    ) -> Self {
        Pointer {
            name,
            kind: PointerKind::Property,
            cardinality,
            computed: false,
            readonly: false,
            typexpr,
            target: None,
            properties: &[],
        }
    }

    pub const fn link(
        name: &'static str,
        target: &'static ObjectType,
        cardinality: Cardinality,
    ) -> Self {
        Pointer {
            name,
            kind: PointerKind::Link,
            cardinality,
            computed: false,
            readonly: false,
            typexpr: "",
            target: Some(target),
            properties: &[],
        }
    }

    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub const fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub const fn with_properties(mut self, properties: &'static [Pointer]) -> Self {
        self.properties = properties;
        self
    }

    pub const fn is_link(&self) -> bool {
        matches!(self.kind, PointerKind::Link)
    }

    pub const fn is_property(&self) -> bool {
        matches!(self.kind, PointerKind::Property)
    }
}

/// A declared object type: schema-qualified name plus its pointer table.
#[derive(Debug)]
pub struct ObjectType {
    pub name: &'static str,
    pub pointers: &'static [Pointer],
}

impl ObjectType {
    /// Look up a pointer by name.
    pub fn pointer(&'static self, name: &str) -> Option<&'static Pointer> {
        self.pointers.iter().find(|p| p.name == name)
    }

    /// Pointers in name order, for deterministic statement text.
    pub fn pointers_sorted(&'static self) -> Vec<&'static Pointer> {
        let mut ptrs: Vec<&'static Pointer> = self.pointers.iter().collect();
        ptrs.sort_by_key(|p| p.name);
        ptrs
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
