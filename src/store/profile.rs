use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Utc;
use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::core::error::StoreError;
use crate::store::ndjson;
use crate::store::record::{
    new_record_id, wrap_date_ms, LinkedPlayer, Record, PROFILE_COLLECTION,
};

/// Allow-listed `profile3` patching.
///
/// Profile edits are append-only and last-write-wins: the newest matching
/// `profile3` line is the player's current profile, an update copies it,
/// applies the patch, and appends the result as a brand-new line with fresh
/// id and timestamps. Prior lines are never modified, so the full edit
/// history stays in the file.

/// Expected kind for an allow-listed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Bool,
}

lazy_static! {
    /// The only fields a profile patch may touch.
    static ref ALLOWED_FIELDS: HashMap<&'static str, FieldKind> = {
        let mut fields = HashMap::new();
        // Basics
        fields.insert("dancerName", FieldKind::Str);
        fields.insert("weight", FieldKind::Int);
        fields.insert("isDispWeight", FieldKind::Bool);
        fields.insert("subscribed", FieldKind::Bool);
        // Play options
        fields.insert("opArrowDesign", FieldKind::Int);
        fields.insert("opGuideline", FieldKind::Int);
        fields.insert("opLaneFilter", FieldKind::Int);
        fields.insert("opJudgePriority", FieldKind::Int);
        fields.insert("opTimingDisp", FieldKind::Int);
        fields
    };

    /// Customize slot fields that must never appear on a `profile3` line.
    pub static ref CUSTOMIZE_FIELDS: HashSet<&'static str> = [
        "characterP1Id",
        "characterP2Id",
        "appealBoardId",
        "laneBgSingleId",
        "laneBgDoubleId",
        "laneCoverSingleId",
        "laneCoverDoubleId",
        "gameBGSystemId",
        "gameBGPlayId",
        "songVidId",
    ]
    .into_iter()
    .collect();
}

pub fn is_allowed_field(name: &str) -> bool {
    ALLOWED_FIELDS.contains_key(name)
}

pub fn is_customize_field(name: &str) -> bool {
    CUSTOMIZE_FIELDS.contains(name)
}

/// Coerce a patch value to the field's expected kind. Cross-kind values are
/// converted leniently; values that cannot be coerced yield `None` and are
/// dropped from the patch.
fn coerce(kind: FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::from),
            Value::Bool(b) => Some(Value::from(*b as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        FieldKind::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
            Value::String(s) => Some(Value::Bool(matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "true" | "t" | "yes" | "y" | "on"
            ))),
            _ => Some(Value::Bool(false)),
        },
        FieldKind::Str => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
    }
}

/// Keep only allow-listed fields, coerced to their expected kinds.
pub fn normalize_patch(patch: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::new();
    for (key, value) in patch {
        let Some(kind) = ALLOWED_FIELDS.get(key.as_str()) else {
            continue;
        };
        if let Some(coerced) = coerce(*kind, value) {
            normalized.insert(key.clone(), coerced);
        }
    }
    normalized
}

/// Snapshot of the last matching `profile3` line: allow-listed fields plus
/// the identifying ones. Returns `None` when the save file is missing or no
/// line matches the linked player.
pub fn read_profile_snapshot(
    path: &Path,
    linked: &LinkedPlayer,
) -> Result<Option<Map<String, Value>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let Some(mut last) = last_matching(path, linked)? else {
        return Ok(None);
    };

    for field in CUSTOMIZE_FIELDS.iter() {
        last.remove(field);
    }

    Ok(Some(snapshot_of(&last)))
}

/// Apply an allow-listed patch by appending a new `profile3` line.
///
/// The last matching line (if any) is the base; the normalized patch is
/// applied on top, customize fields are purged, and the result is appended
/// with a fresh `_id` and wrapped `createdAt`/`updatedAt`. Returns the
/// snapshot of the appended line, or `None` when the file is missing or the
/// patch normalizes to nothing.
pub fn update_profile_fields(
    path: &Path,
    linked: &LinkedPlayer,
    patch: &Map<String, Value>,
) -> Result<Option<Map<String, Value>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let normalized = normalize_patch(patch);
    if normalized.is_empty() {
        return Ok(None);
    }

    let mut record = last_matching(path, linked)?.unwrap_or_default();

    record.set("collection", Value::String(PROFILE_COLLECTION.to_string()));
    if let Some(refid) = linked.refid_trimmed() {
        record.set("__refid", Value::String(refid.to_string()));
    }
    if let Some(code) = linked.ddr_code {
        record.set("ddrCode", Value::from(code));
    }
    if let Some(name) = linked.dancer_name_trimmed() {
        record.set("dancerName", Value::String(name.to_string()));
    }

    for field in CUSTOMIZE_FIELDS.iter() {
        record.remove(field);
    }

    for (key, value) in &normalized {
        record.set(key, value.clone());
    }

    let now_ms = Utc::now().timestamp_millis();
    record.set("_id", Value::String(new_record_id()));
    record.set("createdAt", wrap_date_ms(now_ms));
    record.set("updatedAt", wrap_date_ms(now_ms));

    ndjson::append_records(path, std::slice::from_ref(&record))?;

    Ok(Some(snapshot_of(&record)))
}

/// Last `profile3` line matching the linked player, scanning the whole file
/// so that the newest match wins.
fn last_matching(path: &Path, linked: &LinkedPlayer) -> Result<Option<Record>, StoreError> {
    let mut last = None;
    for record in ndjson::read_records(path)? {
        if linked.matches_profile(&record) {
            last = Some(record);
        }
    }
    Ok(last)
}

fn snapshot_of(record: &Record) -> Map<String, Value> {
    let mut snapshot = Map::new();
    for key in ALLOWED_FIELDS.keys() {
        snapshot.insert(
            key.to_string(),
            record.get(key).cloned().unwrap_or(Value::Null),
        );
    }
    for key in ["dancerName", "__refid", "ddrCode"] {
        snapshot.insert(
            key.to_string(),
            record.get(key).cloned().unwrap_or(Value::Null),
        );
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        let nonce: u32 = rand::thread_rng().gen();
        std::env::temp_dir().join(format!("stepboard-profile-{}-{:08x}.db", tag, nonce))
    }

    fn linked() -> LinkedPlayer {
        LinkedPlayer {
            dancer_name: Some("YUKI".to_string()),
            refid: Some("R1".to_string()),
            pcbid: None,
            ddr_code: Some(1234),
        }
    }

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_coercion_table() {
        assert_eq!(coerce(FieldKind::Int, &json!(7)), Some(json!(7)));
        assert_eq!(coerce(FieldKind::Int, &json!(7.9)), Some(json!(7)));
        assert_eq!(coerce(FieldKind::Int, &json!(" 42 ")), Some(json!(42)));
        assert_eq!(coerce(FieldKind::Int, &json!(true)), Some(json!(1)));
        assert_eq!(coerce(FieldKind::Int, &json!("x")), None);

        assert_eq!(coerce(FieldKind::Bool, &json!(true)), Some(json!(true)));
        assert_eq!(coerce(FieldKind::Bool, &json!(0)), Some(json!(false)));
        assert_eq!(coerce(FieldKind::Bool, &json!("Yes")), Some(json!(true)));
        assert_eq!(coerce(FieldKind::Bool, &json!("off")), Some(json!(false)));
        assert_eq!(coerce(FieldKind::Bool, &json!([1])), Some(json!(false)));

        assert_eq!(coerce(FieldKind::Str, &json!("A")), Some(json!("A")));
        assert_eq!(coerce(FieldKind::Str, &json!(9)), Some(json!("9")));
        assert_eq!(coerce(FieldKind::Str, &json!({})), None);
    }

    #[test]
    fn test_normalize_patch_drops_unknown_and_uncoercible() {
        let normalized = normalize_patch(&patch(json!({
            "dancerName": "AKIRA",
            "weight": "60",
            "notAllowed": 1,
            "characterP1Id": 5,
            "opGuideline": "bogus",
        })));

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized.get("dancerName"), Some(&json!("AKIRA")));
        assert_eq!(normalized.get("weight"), Some(&json!(60)));
    }

    #[test]
    fn test_read_snapshot_takes_last_match() {
        let path = temp_path("read");
        fs::write(
            &path,
            concat!(
                "{\"collection\":\"profile3\",\"__refid\":\"R1\",\"dancerName\":\"YUKI\",\"weight\":50}\n",
                "{\"collection\":\"profile3\",\"__refid\":\"R2\",\"dancerName\":\"OTHER\",\"weight\":70}\n",
                "{\"collection\":\"profile3\",\"__refid\":\"R1\",\"dancerName\":\"YUKI\",\"weight\":55,\"characterP1Id\":9}\n",
            ),
        )
        .unwrap();

        let snapshot = read_profile_snapshot(&path, &linked()).unwrap().unwrap();
        assert_eq!(snapshot.get("weight"), Some(&json!(55)));
        assert_eq!(snapshot.get("__refid"), Some(&json!("R1")));
        // customize fields are purged from the snapshot
        assert!(!snapshot.contains_key("characterP1Id"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_snapshot_missing_file_or_player() {
        assert!(read_profile_snapshot(&temp_path("missing"), &linked())
            .unwrap()
            .is_none());

        let path = temp_path("nomatch");
        fs::write(
            &path,
            "{\"collection\":\"profile3\",\"__refid\":\"R9\",\"dancerName\":\"NOPE\"}\n",
        )
        .unwrap();
        assert!(read_profile_snapshot(&path, &linked()).unwrap().is_none());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_update_appends_new_line_and_preserves_history() {
        let path = temp_path("update");
        fs::write(
            &path,
            "{\"collection\":\"profile3\",\"__refid\":\"R1\",\"dancerName\":\"YUKI\",\"weight\":50,\"characterP1Id\":3}\n",
        )
        .unwrap();

        let snapshot = update_profile_fields(&path, &linked(), &patch(json!({"weight": 62})))
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.get("weight"), Some(&json!(62)));
        assert_eq!(snapshot.get("ddrCode"), Some(&json!(1234)));

        let records = ndjson::read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        // old line untouched
        assert_eq!(records[0].int_field("weight"), Some(50));
        // new line carries fresh id and timestamps, and no customize leakage
        let appended = &records[1];
        assert_eq!(appended.int_field("weight"), Some(62));
        assert_eq!(appended.str_field("_id").unwrap().len(), 16);
        assert!(crate::store::record::date_ms(appended.get("createdAt").unwrap()).is_some());
        assert!(appended.get("characterP1Id").is_none());

        // LWW: a fresh read now sees the appended line
        let reread = read_profile_snapshot(&path, &linked()).unwrap().unwrap();
        assert_eq!(reread.get("weight"), Some(&json!(62)));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_update_without_prior_profile_creates_one() {
        let path = temp_path("fresh");
        fs::write(&path, "{\"collection\":\"score3\",\"score\":1}\n").unwrap();

        let snapshot =
            update_profile_fields(&path, &linked(), &patch(json!({"dancerName": "AKIRA"})))
                .unwrap()
                .unwrap();
        assert_eq!(snapshot.get("dancerName"), Some(&json!("AKIRA")));
        assert_eq!(snapshot.get("__refid"), Some(&json!("R1")));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_update_empty_patch_is_noop() {
        let path = temp_path("noop");
        fs::write(
            &path,
            "{\"collection\":\"profile3\",\"__refid\":\"R1\",\"weight\":50}\n",
        )
        .unwrap();

        let result =
            update_profile_fields(&path, &linked(), &patch(json!({"unknownField": 1}))).unwrap();
        assert!(result.is_none());
        assert_eq!(ndjson::read_records(&path).unwrap().len(), 1);

        fs::remove_file(&path).unwrap();
    }
}
