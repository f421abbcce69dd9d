use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use lazy_static::lazy_static;
use serde_json::Value;

use crate::core::error::StoreError;
use crate::store::ndjson;
use crate::store::record::{
    new_record_id, wrap_date_ms, LinkedPlayer, Record, CUSTOMIZE_COLLECTION,
};

/// Customize slots stored as `customize3` records.
///
/// Each slot is identified by a `(category, pattern)` pair; the newest
/// `customize3` line per pair owned by the player's refid is the current
/// selection. Updates never edit prior lines: every change appends one new
/// line per slot.

/// `(category, pattern)` pair identifying a customize slot
pub type SlotKey = (i64, i64);

lazy_static! {
    /// Named slots exposed by the UI, mapped to their `(category, pattern)`
    /// pairs in the save file.
    pub static ref SLOTS: Vec<(&'static str, SlotKey)> = vec![
        ("appealBoardId", (1, 1)),
        ("characterP1Id", (2, 1)),
        ("characterP2Id", (2, 2)),
        ("gameBGSystemId", (3, 1)),
        ("gameBGPlayId", (3, 2)),
        ("laneBgSingleId", (4, 1)),
        ("laneBgDoubleId", (5, 1)),
        ("laneCoverSingleId", (6, 1)),
        ("laneCoverDoubleId", (7, 1)),
        ("songVidId", (8, 1)),
    ];
}

pub fn slot_for(name: &str) -> Option<SlotKey> {
    SLOTS.iter().find(|(n, _)| *n == name).map(|(_, key)| *key)
}

pub fn slot_name(key: SlotKey) -> Option<&'static str> {
    SLOTS.iter().find(|(_, k)| *k == key).map(|(name, _)| *name)
}

/// Slot keys below 1 are not valid selections; they collapse to 1.
fn normalize_key(value: i64) -> i64 {
    if value < 1 {
        1
    } else {
        value
    }
}

/// Current customize selections for the player: `{(category, pattern): key}`
/// from the last matching line per pair. Missing save file yields an empty
/// map.
pub fn read_customize(
    path: &Path,
    linked: &LinkedPlayer,
) -> Result<HashMap<SlotKey, i64>, StoreError> {
    let mut out = HashMap::new();
    if !path.exists() {
        return Ok(out);
    }

    for record in ndjson::read_records(path)? {
        if !linked.matches_customize(&record) {
            continue;
        }
        let category = record.int_field("category").unwrap_or(-1);
        let pattern = record.int_field("pattern").unwrap_or(0);
        let key = record.int_field("key").unwrap_or(0);
        // later lines overwrite earlier ones: last write wins
        out.insert((category, pattern), normalize_key(key));
    }

    Ok(out)
}

/// Apply slot changes by appending one fresh `customize3` line per slot,
/// written through the rewrite-with-append path. Requires a linked refid;
/// without one (or without a save file) this is a no-op returning an empty
/// map.
pub fn update_customize(
    path: &Path,
    linked: &LinkedPlayer,
    changes: &HashMap<SlotKey, i64>,
) -> Result<HashMap<SlotKey, i64>, StoreError> {
    let mut updated = HashMap::new();
    if !path.exists() {
        return Ok(updated);
    }
    let Some(refid) = linked.refid_trimmed() else {
        return Ok(updated);
    };
    if changes.is_empty() {
        return Ok(updated);
    }

    let now_ms = Utc::now().timestamp_millis();

    let mut new_records = Vec::with_capacity(changes.len());
    for (&(category, pattern), &key) in changes {
        let key = normalize_key(key);

        let mut record = Record::new();
        record.set(
            "collection",
            Value::String(CUSTOMIZE_COLLECTION.to_string()),
        );
        record.set("category", Value::from(category));
        record.set("pattern", Value::from(pattern));
        record.set("__s", Value::String("plugins_profile".to_string()));
        record.set("__refid", Value::String(refid.to_string()));
        record.set("key", Value::from(key));
        record.set("_id", Value::String(new_record_id()));
        record.set("createdAt", wrap_date_ms(now_ms));
        record.set("updatedAt", wrap_date_ms(now_ms));

        new_records.push(record);
        updated.insert((category, pattern), key);
    }

    ndjson::rewrite_with_appended(path, &new_records)?;

    Ok(updated)
}
