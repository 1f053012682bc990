//! In-memory edits of JSON configuration documents.
//!
//! Documents are kept as open `serde_json::Value` trees so keys this installer
//! does not know about round-trip untouched. The helpers below only touch the
//! `provider`, `plugin`, and `dependencies` keys.

use serde_json::{Map, Value};

pub const PROVIDER_KEY: &str = "provider";
pub const PLUGIN_KEY: &str = "plugin";
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// An empty top-level object.
pub fn empty_document() -> Value {
    Value::Object(Map::new())
}

/// Set `provider[key] = spec`, creating (or replacing a non-object) `provider` section.
///
/// The previous entry under `key`, if any, is replaced wholesale.
pub fn upsert_provider(doc: &mut Value, key: &str, spec: Value) {
    if !doc.is_object() {
        *doc = empty_document();
    }
    let providers = &mut doc[PROVIDER_KEY];
    if !providers.is_object() {
        *providers = empty_document();
    }
    providers[key] = spec;
}

/// Remove `provider[key]`. Returns `true` if an entry was removed.
pub fn remove_provider(doc: &mut Value, key: &str) -> bool {
    doc.get_mut(PROVIDER_KEY)
        .and_then(Value::as_object_mut)
        .is_some_and(|providers| providers.shift_remove(key).is_some())
}

/// The `provider[key]` entry, if present.
pub fn provider<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    doc.get(PROVIDER_KEY)
        .and_then(Value::as_object)
        .and_then(|providers| providers.get(key))
}

/// True when the document has an object-valued `provider` section.
pub fn has_provider_section(doc: &Value) -> bool {
    doc.get(PROVIDER_KEY).is_some_and(Value::is_object)
}

/// Drop string entries of the `plugin` array that start with `prefix`.
///
/// Non-string entries are left in place. Returns the number of entries removed.
pub fn remove_plugins_with_prefix(doc: &mut Value, prefix: &str) -> usize {
    let Some(plugins) = doc.get_mut(PLUGIN_KEY).and_then(Value::as_array_mut) else {
        return 0;
    };
    let before = plugins.len();
    plugins.retain(|entry| !entry.as_str().is_some_and(|name| name.starts_with(prefix)));
    before - plugins.len()
}

/// Remove `dependencies[name]`. Returns `true` if an entry was removed.
pub fn remove_dependency(doc: &mut Value, name: &str) -> bool {
    doc.get_mut(DEPENDENCIES_KEY)
        .and_then(Value::as_object_mut)
        .is_some_and(|deps| deps.shift_remove(name).is_some())
}
