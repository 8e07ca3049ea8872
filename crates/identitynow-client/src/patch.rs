//! JSON Patch construction
//!
//! Partial updates are sent as an array of `{op, path, value}` operations.
//! Entities that support "patch every populated field" implement
//! [`Patchable`] with a static list of `{name, accessor}` pairs; an accessor
//! returns `None` for a field that should be left out.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

/// One updatable field of `T`.
pub struct PatchField<T> {
    pub name: &'static str,
    pub accessor: fn(&T) -> Option<Value>,
}

impl<T> PatchField<T> {
    pub const fn new(name: &'static str, accessor: fn(&T) -> Option<Value>) -> Self {
        Self { name, accessor }
    }
}

pub trait Patchable: Sized + 'static {
    /// Wire names and accessors, in the order operations are emitted.
    const PATCH_FIELDS: &'static [PatchField<Self>];
}

/// One `op` per populated field, at `{prefix}/{name}`.
pub fn build_patch<T: Patchable>(entity: &T, op: PatchOp, prefix: &str) -> Vec<PatchOperation> {
    let prefix = prefix.trim_end_matches('/');
    T::PATCH_FIELDS
        .iter()
        .filter_map(|field| {
            (field.accessor)(entity).map(|value| {
                let path = format!("{prefix}/{}", field.name);
                match op {
                    PatchOp::Add => PatchOperation::add(path, value),
                    PatchOp::Replace => PatchOperation::replace(path, value),
                    PatchOp::Remove => PatchOperation::remove(path),
                }
            })
        })
        .collect()
}

/// Serialize `value`, treating null, `""`, `[]` and `{}` as unset.
///
/// `false` and `0` are kept so a field can be explicitly switched off.
pub fn non_empty<S: Serialize + ?Sized>(value: &S) -> Option<Value> {
    match serde_json::to_value(value).ok()? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other),
    }
}
