//! Change-tracked multi-value containers.
//!
//! Both containers follow the same protocol: they behave as ordered,
//! duplicate-free collections, and on the first mutation they snapshot
//! their contents. [`TrackedList::get_added`] / [`TrackedList::get_removed`]
//! (and the [`LinkSet`] equivalents) diff the live contents against that
//! snapshot; `commit` discards it, declaring the current contents
//! persisted.

use crate::error::{Error, Result};
use crate::proxy::Linked;
use crate::value::Value;

/// Ordered, duplicate-free multi-property container with element type
/// checking against the declared schema type.
#[derive(Debug, Clone)]
pub struct TrackedList {
    typexpr: &'static str,
    items: Vec<Value>,
    snapshot: Option<Vec<Value>>,
}

impl TrackedList {
    pub fn new(typexpr: &'static str) -> Self {
        TrackedList {
            typexpr,
            items: Vec::new(),
            snapshot: None,
        }
    }

    /// A committed container with the given contents; duplicates are
    /// dropped, keeping first occurrences.
    pub fn with_items(
        typexpr: &'static str,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let mut list = TrackedList::new(typexpr);
        for value in items {
            list.check(&value)?;
            if !list.items.contains(&value) {
                list.items.push(value);
            }
        }
        Ok(list)
    }

    pub fn element_type(&self) -> &'static str {
        self.typexpr
    }

    fn check(&self, value: &Value) -> Result<()> {
        if value.conforms_to(self.typexpr) {
            Ok(())
        } else {
            Err(Error::type_mismatch(self.typexpr, value.type_name(), None))
        }
    }

    fn touch(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.items.clone());
        }
    }

    /// Append a value; duplicates are a silent no-op.
    pub fn add(&mut self, value: Value) -> Result<()> {
        self.check(&value)?;
        if self.items.contains(&value) {
            return Ok(());
        }
        self.touch();
        self.items.push(value);
        Ok(())
    }

    /// Insert at a position; duplicates are a silent no-op.
    pub fn insert(&mut self, index: usize, value: Value) -> Result<()> {
        self.check(&value)?;
        if self.items.contains(&value) {
            return Ok(());
        }
        self.touch();
        let index = index.min(self.items.len());
        self.items.insert(index, value);
        Ok(())
    }

    /// Remove a value; absent values are an error.
    pub fn remove(&mut self, value: &Value) -> Result<()> {
        if self.discard(value) {
            Ok(())
        } else {
            Err(Error::Custom(format!(
                "value {:?} not present in multi property",
                value
            )))
        }
    }

    /// Remove a value if present; returns whether it was.
    pub fn discard(&mut self, value: &Value) -> bool {
        match self.items.iter().position(|v| v == value) {
            Some(index) => {
                self.touch();
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.touch();
        self.items.clear();
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Value>) -> Result<()> {
        for value in values {
            self.add(value)?;
        }
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    /// Values present now but not at the last commit.
    pub fn get_added(&self) -> Vec<Value> {
        match &self.snapshot {
            Some(snapshot) => self
                .items
                .iter()
                .filter(|v| !snapshot.contains(v))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Values present at the last commit but gone now.
    pub fn get_removed(&self) -> Vec<Value> {
        match &self.snapshot {
            Some(snapshot) => snapshot
                .iter()
                .filter(|v| !self.items.contains(v))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.get_added().is_empty() || !self.get_removed().is_empty()
    }

    /// Declare the current contents persisted.
    pub fn commit(&mut self) {
        self.snapshot = None;
    }
}

/// Ordered multi-link container, distinct by target identity (proxies
/// unwrapped).
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    items: Vec<Linked>,
    snapshot: Option<Vec<Linked>>,
}

impl LinkSet {
    pub fn new() -> Self {
        LinkSet::default()
    }

    /// A committed container with the given contents, deduplicated by
    /// identity.
    pub fn with_items(items: impl IntoIterator<Item = Linked>) -> Self {
        let mut set = LinkSet::new();
        for linked in items {
            if !set.contains_identity(linked.handle_id()) {
                set.items.push(linked);
            }
        }
        set
    }

    fn contains_identity(&self, handle_id: usize) -> bool {
        self.items.iter().any(|l| l.handle_id() == handle_id)
    }

    fn touch(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.items.clone());
        }
    }

    /// Add a target; an already-present identity is a silent no-op.
    pub fn add(&mut self, linked: impl Into<Linked>) {
        let linked = linked.into();
        if self.contains_identity(linked.handle_id()) {
            return;
        }
        self.touch();
        self.items.push(linked);
    }

    /// Remove a target by identity; absence is an error.
    pub fn remove(&mut self, target: &Linked) -> Result<()> {
        if self.discard(target) {
            Ok(())
        } else {
            Err(Error::Custom(format!(
                "{} not present in multi link",
                target.object().describe()
            )))
        }
    }

    /// Remove a target by identity if present; returns whether it was.
    pub fn discard(&mut self, target: &Linked) -> bool {
        let handle_id = target.handle_id();
        match self.items.iter().position(|l| l.handle_id() == handle_id) {
            Some(index) => {
                self.touch();
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.touch();
        self.items.clear();
    }

    pub fn contains(&self, target: &Linked) -> bool {
        self.contains_identity(target.handle_id())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Linked] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Linked> {
        self.items.iter()
    }

    /// Targets present now but not at the last commit.
    pub fn get_added(&self) -> Vec<Linked> {
        match &self.snapshot {
            Some(snapshot) => self
                .items
                .iter()
                .filter(|l| !snapshot.iter().any(|s| s.handle_id() == l.handle_id()))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Targets present at the last commit but gone now.
    pub fn get_removed(&self) -> Vec<Linked> {
        match &self.snapshot {
            Some(snapshot) => snapshot
                .iter()
                .filter(|s| !self.contains_identity(s.handle_id()))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.get_added().is_empty() || !self.get_removed().is_empty()
    }

    /// Declare the current contents persisted.
    pub fn commit(&mut self) {
        self.snapshot = None;
    }
}
