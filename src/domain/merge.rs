//! Pure patch algebra shared by every backup-store implementation.
//!
//! The PostgreSQL store expresses these operations as single `jsonb`
//! statements; the in-memory test store executes them here. Keeping the
//! semantics in one place is what makes the store properties (idempotent
//! snapshot merges, commuting list patches) testable without a database.

use serde_json::{Map, Value};

/// A list-field patch: append a value or remove a string element.
#[derive(Debug, Clone)]
pub enum ListPatch {
    /// Append the value to the list unless an equal element is already
    /// present. String ids and structured values (comment objects) both go
    /// through here; set semantics make redelivered events and the initial
    /// sweep's replays no-ops.
    Add(Value),
    /// Remove every element equal to the given string.
    Remove(String),
}

/// Shallow-merges `patch` into `existing`; patch fields win.
///
/// This is additive, never destructive: fields absent from `patch` are left
/// untouched, which is why snapshot payloads skip absent fields during
/// serialization.
pub fn shallow_merge(existing: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (field, value) in patch {
        existing.insert(field, value);
    }
}

/// Applies a seeded list patch and returns the resulting document.
///
/// Semantics, in order:
/// 1. start from `{field: []}`,
/// 2. overlay the event's own copy of the parent (`seed`), so a record
///    created by this patch starts from the freshest snapshot available,
/// 3. overlay the existing document, so an established record is never
///    clobbered by the seed,
/// 4. append to (skipping values already present) or remove from the list
///    at `field`.
#[must_use]
pub fn patch_list(
    existing: Option<&Map<String, Value>>,
    seed: &Map<String, Value>,
    field: &str,
    patch: &ListPatch,
) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert(field.to_string(), Value::Array(Vec::new()));
    shallow_merge(&mut doc, seed.clone());
    if let Some(existing) = existing {
        shallow_merge(&mut doc, existing.clone());
    }

    let mut list = match doc.get(field) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    match patch {
        ListPatch::Add(value) => {
            if !list.contains(value) {
                list.push(value.clone());
            }
        }
        ListPatch::Remove(target) => {
            list.retain(|item| item.as_str() != Some(target.as_str()));
        }
    }
    doc.insert(field.to_string(), Value::Array(list));
    doc
}
