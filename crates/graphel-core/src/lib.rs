//! Core object-model runtime for graphel.
//!
//! This crate provides the foundational types the save planner works on:
//!
//! - `Object` shared handles with change tracking
//! - `Proxy` link-property wrappers and the `Linked` reference enum
//! - `TrackedList` / `LinkSet` change-tracked multi-value containers
//! - `Pointer` / `ObjectType` static schema reflection
//! - `Value` scalars and `ObjectId` persisted identifiers
//! - EdgeQL identifier and literal quoting

pub mod error;
pub mod id;
pub mod meta;
pub mod object;
pub mod proxy;
pub mod quote;
pub mod tracked;
pub mod value;

pub use error::{
    DependencyError, Error, ParseIdError, Result, TypeError, UsageError, UsageErrorKind,
};
pub use id::ObjectId;
pub use meta::{Cardinality, ObjectType, Pointer, PointerKind};
pub use object::{FieldValue, Object};
pub use proxy::{Linked, Proxy};
pub use quote::{quote_ident, quote_literal, quote_type_name};
pub use tracked::{LinkSet, TrackedList};
pub use value::Value;
