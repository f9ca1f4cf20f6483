//! Deterministic entity ids for mapped rows.

use super::Row;
use crate::utils::make_id;

/// Length of the namespace signature appended to signed ids.
const SIGNATURE_LENGTH: usize = 40;

/// Id of an entity from its schema and key property values.
///
/// Values of each key are sorted and deduplicated first, so the id depends on
/// the value sets only. Returns `None` when no key produced a value.
pub fn fingerprint(schema: &str, key_literal: Option<&str>, keys: &[(&str, Vec<String>)]) -> Option<String> {
    if keys.iter().all(|(_, values)| values.is_empty()) {
        return None;
    }
    let mut parts: Vec<String> = vec![schema.to_string(), key_literal.unwrap_or_default().to_string()];
    for (name, values) in keys {
        let mut values = values.clone();
        values.sort();
        values.dedup();
        parts.push(name.to_string());
        parts.extend(values);
    }
    Some(make_id(parts))
}

/// Fallback id derived from the full row content.
pub fn row_fingerprint(query: &str, entity: &str, key_literal: Option<&str>, row: &Row) -> String {
    let mut parts = vec![
        query.to_string(),
        entity.to_string(),
        key_literal.unwrap_or_default().to_string(),
    ];
    parts.extend(row.iter().map(|(column, value)| format!("{column}={value}")));
    make_id(parts)
}

/// Append a namespace signature: `{id}.{signature}`. Already signed ids are
/// left alone.
pub fn sign(namespace: &str, id: &str) -> String {
    if let Some((base, signature)) = id.rsplit_once('.') {
        if signature == signature_of(namespace, base) {
            return id.to_string();
        }
    }
    format!("{id}.{}", signature_of(namespace, id))
}

fn signature_of(namespace: &str, id: &str) -> String {
    let mut digest = make_id([namespace, id]);
    digest.truncate(SIGNATURE_LENGTH);
    digest
}
