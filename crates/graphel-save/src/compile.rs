//! EdgeQL statement compilation.
//!
//! Values never appear inline: every scalar and every link target id is
//! bound through a named parameter cast to its schema type. Parameter
//! names come from one monotonic [`ParamBuilder`] per save, so statement
//! text across a whole plan never reuses a name (the update filter's
//! `$id` being the one fixed exception, scoped per statement).

use std::collections::BTreeMap;

use serde::Serialize;

use graphel_core::{
    Error, FieldValue, Linked, Object, ObjectId, Pointer, Result, UsageErrorKind, Value,
    quote_ident, quote_type_name,
};

use crate::plan::{ChangeRecord, FieldChange};
use crate::tracker::IdTracker;

/// Parameters in name order, for deterministic wire encoding.
pub type Params = BTreeMap<String, Value>;

/// One executable statement with its bound parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub text: String,
    pub params: Params,
}

/// Monotonic `p_<n>` parameter name allocator.
#[derive(Debug, Default)]
pub struct ParamBuilder {
    next: usize,
}

impl ParamBuilder {
    pub fn new() -> Self {
        ParamBuilder { next: 0 }
    }

    pub fn fresh(&mut self) -> String {
        let name = format!("p_{}", self.next);
        self.next += 1;
        name
    }
}

/// The identifier of `obj`: its own if persisted, else the one the server
/// reported for it earlier in this save.
fn resolve_id(obj: &Object, ids: &IdTracker<ObjectId>) -> Result<ObjectId> {
    obj.id()
        .or_else(|| ids.get(obj).copied())
        .ok_or_else(|| {
            Error::usage(
                UsageErrorKind::UnresolvedIdentifier,
                format!("{} has no identifier yet", obj.describe()),
            )
        })
}

fn target_type_name(ptr: &'static Pointer) -> Result<String> {
    ptr.target
        .map(|t| quote_type_name(t.name))
        .ok_or_else(|| {
            Error::Custom(format!("link '{}' has no declared target type", ptr.name))
        })
}

/// One link target expression: `<Target><std::uuid>$p_n`, wrapped in a
/// subshape assigning `@prop` values when the reference carries changed
/// link properties.
fn link_element_expr(
    ptr: &'static Pointer,
    linked: &Linked,
    ids: &IdTracker<ObjectId>,
    pb: &mut ParamBuilder,
    params: &mut Params,
) -> Result<String> {
    let target_ty = target_type_name(ptr)?;
    let id = resolve_id(linked.object(), ids)?;
    let p = pb.fresh();
    params.insert(p.clone(), Value::Uuid(id));
    let base = format!("<{}><std::uuid>${}", target_ty, p);

    let props = linked
        .proxy()
        .map(|proxy| proxy.changed_props())
        .unwrap_or_default();
    if props.is_empty() {
        return Ok(base);
    }
    let mut assignments = Vec::with_capacity(props.len());
    for (name, value) in props {
        let cast = ptr
            .properties
            .iter()
            .find(|pp| pp.name == name)
            .map_or(value.type_name(), |pp| pp.typexpr);
        let pp_name = pb.fresh();
        assignments.push(format!("@{} := <{}>${}", quote_ident(name), cast, pp_name));
        params.insert(pp_name, value);
    }
    Ok(format!("(select {} {{ {} }})", base, assignments.join(", ")))
}

fn multi_prop_items(obj: &Object, name: &str) -> Option<(Vec<Value>, &'static str)> {
    obj.with_field(name, |field| match field {
        Some(FieldValue::MultiProperty(list)) if !list.is_empty() => {
            Some((list.items().to_vec(), list.element_type()))
        }
        _ => None,
    })
}

fn multi_link_items(obj: &Object, name: &str) -> Option<Vec<Linked>> {
    obj.with_field(name, |field| match field {
        Some(FieldValue::MultiLink(set)) if !set.is_empty() => {
            Some(set.iter().cloned().collect())
        }
        _ => None,
    })
}

/// Compile the insert statement for one new object: every present
/// property and every required link; optional links are deferred to the
/// follow-up update the planner recorded.
pub fn compile_insert(
    obj: &Object,
    ids: &IdTracker<ObjectId>,
    pb: &mut ParamBuilder,
) -> Result<Statement> {
    if obj.id().is_some() {
        return Err(Error::usage(
            UsageErrorKind::InsertPersisted,
            format!("{} is already persisted, refusing to insert", obj.describe()),
        ));
    }

    let mut parts: Vec<String> = Vec::new();
    let mut params = Params::new();

    for ptr in obj.ty().pointers_sorted() {
        if ptr.computed || ptr.readonly {
            continue;
        }
        if ptr.is_property() {
            if ptr.cardinality.is_multi() {
                if let Some((items, element_ty)) = multi_prop_items(obj, ptr.name) {
                    let p = pb.fresh();
                    parts.push(format!(
                        "{} := std::array_unpack(<array<{}>>${})",
                        quote_ident(ptr.name),
                        element_ty,
                        p
                    ));
                    params.insert(p, Value::Array(items));
                }
            } else if let Some(value) = obj.property(ptr.name) {
                let p = pb.fresh();
                parts.push(format!(
                    "{} := <{}>${}",
                    quote_ident(ptr.name),
                    ptr.typexpr,
                    p
                ));
                params.insert(p, value);
            }
        } else if !ptr.cardinality.is_optional() {
            if ptr.cardinality.is_multi() {
                if let Some(items) = multi_link_items(obj, ptr.name) {
                    let elements: Vec<String> = items
                        .iter()
                        .map(|linked| link_element_expr(ptr, linked, ids, pb, &mut params))
                        .collect::<Result<_>>()?;
                    parts.push(format!(
                        "{} := std::assert_distinct({{{}}})",
                        quote_ident(ptr.name),
                        elements.join(", ")
                    ));
                }
            } else if let Some(linked) = obj.link(ptr.name) {
                let expr = link_element_expr(ptr, &linked, ids, pb, &mut params)?;
                parts.push(format!("{} := {}", quote_ident(ptr.name), expr));
            }
        }
    }

    let type_name = quote_type_name(obj.ty().name);
    let text = if parts.is_empty() {
        format!("insert {}", type_name)
    } else {
        format!("insert {} {{ {} }}", type_name, parts.join(", "))
    };
    tracing::trace!(%text, "compiled insert");
    Ok(Statement { text, params })
}

/// Compile the update statement for one change record.
pub fn compile_update(
    record: &ChangeRecord,
    ids: &IdTracker<ObjectId>,
    pb: &mut ParamBuilder,
) -> Result<Statement> {
    let mut parts: Vec<String> = Vec::new();
    let mut params = Params::new();

    for change in &record.fields {
        match change {
            FieldChange::Property { pointer, value } => {
                let p = pb.fresh();
                parts.push(format!(
                    "{} := <{}>${}",
                    quote_ident(pointer.name),
                    pointer.typexpr,
                    p
                ));
                params.insert(p, value.clone());
            }
            FieldChange::SingleLink {
                pointer,
                target: Some(linked),
            } => {
                let expr = link_element_expr(pointer, linked, ids, pb, &mut params)?;
                parts.push(format!("{} := {}", quote_ident(pointer.name), expr));
            }
            FieldChange::SingleLink {
                pointer,
                target: None,
            } => {
                parts.push(format!(
                    "{} := <{}>{{}}",
                    quote_ident(pointer.name),
                    target_type_name(pointer)?
                ));
            }
        }
    }

    for delta in &record.multi_props {
        if !delta.added.is_empty() {
            let p = pb.fresh();
            parts.push(format!(
                "{} += std::array_unpack(<array<{}>>${})",
                quote_ident(delta.pointer.name),
                delta.pointer.typexpr,
                p
            ));
            params.insert(p, Value::Array(delta.added.clone()));
        }
        if !delta.removed.is_empty() {
            let p = pb.fresh();
            parts.push(format!(
                "{} -= std::array_unpack(<array<{}>>${})",
                quote_ident(delta.pointer.name),
                delta.pointer.typexpr,
                p
            ));
            params.insert(p, Value::Array(delta.removed.clone()));
        }
    }

    for delta in &record.multi_links {
        if !delta.added.is_empty() {
            let elements: Vec<String> = delta
                .added
                .iter()
                .map(|linked| link_element_expr(delta.pointer, linked, ids, pb, &mut params))
                .collect::<Result<_>>()?;
            parts.push(format!(
                "{} += std::assert_distinct({{{}}})",
                quote_ident(delta.pointer.name),
                elements.join(", ")
            ));
        }
        if !delta.removed.is_empty() {
            let removed_ids: Vec<Value> = delta
                .removed
                .iter()
                .map(|obj| resolve_id(obj, ids).map(Value::Uuid))
                .collect::<Result<_>>()?;
            let p = pb.fresh();
            parts.push(format!(
                "{} -= <{}>std::array_unpack(<array<std::uuid>>${})",
                quote_ident(delta.pointer.name),
                target_type_name(delta.pointer)?,
                p
            ));
            params.insert(p, Value::Array(removed_ids));
        }
    }

    if parts.is_empty() {
        return Err(Error::usage(
            UsageErrorKind::EmptyUpdate,
            format!("no changes to compile for {}", record.object.describe()),
        ));
    }

    let object_id = resolve_id(&record.object, ids)?;
    params.insert("id".to_string(), Value::Uuid(object_id));
    let text = format!(
        "update {} filter .id = <std::uuid>$id set {{ {} }}",
        quote_type_name(record.object.ty().name),
        parts.join(", ")
    );
    tracing::trace!(%text, "compiled update");
    Ok(Statement { text, params })
}
