use chrono::{SecondsFormat, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Collection tags used by the save file
pub const SCORES_COLLECTION: &str = "score3";
pub const HISCORES_COLLECTION: &str = "hiscore3";
pub const PROFILE_COLLECTION: &str = "profile3";
pub const CUSTOMIZE_COLLECTION: &str = "customize3";

/// One line of the NDJSON save file.
///
/// Records are heterogeneous JSON objects; the only convention they all share
/// is a `collection` field naming their logical record type. Accessors are
/// tolerant of missing or ill-typed fields and return `None` instead of
/// failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self {
            fields: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn collection(&self) -> Option<&str> {
        self.str_field("collection")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Integer view of a field, truncating floats.
    pub fn int_field(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// Trimmed string field, with blank strings treated as missing.
    pub fn trimmed_field(&self, key: &str) -> Option<String> {
        let trimmed = self.str_field(key)?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Player reference id: `__refid` with `refid` as a legacy fallback.
    pub fn refid(&self) -> Option<String> {
        self.trimmed_field("__refid")
            .or_else(|| self.trimmed_field("refid"))
    }

    pub fn pcbid(&self) -> Option<String> {
        self.trimmed_field("pcbid")
    }

    pub fn dancer_name(&self) -> Option<String> {
        self.trimmed_field("dancerName")
    }

    pub fn song_id(&self) -> Option<&Value> {
        self.fields.get("songId")
    }
}

/// Wrap a unix-millisecond timestamp in the save file's NeDB date shape.
pub fn wrap_date_ms(ms: i64) -> Value {
    json!({ "$$date": ms })
}

/// Extract the millisecond value from a wrapped date, if present.
pub fn date_ms(value: &Value) -> Option<i64> {
    value.get("$$date")?.as_i64()
}

/// Turn a wrapped date into a UTC ISO-8601 string with a trailing `Z`.
/// Anything that is not a wrapped date passes through unchanged.
pub fn normalize_date(value: &Value) -> Value {
    match date_ms(value) {
        Some(ms) => match Utc.timestamp_millis_opt(ms) {
            chrono::LocalResult::Single(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            _ => value.clone(),
        },
        None => value.clone(),
    }
}

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh record id in the save file's 16-char alphanumeric shape.
pub fn new_record_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// The in-game player identity tied to a web account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkedPlayer {
    #[serde(rename = "dancerName", default, skip_serializing_if = "Option::is_none")]
    pub dancer_name: Option<String>,

    #[serde(
        rename = "__refid",
        alias = "refid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub refid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcbid: Option<String>,

    #[serde(rename = "ddrCode", default, skip_serializing_if = "Option::is_none")]
    pub ddr_code: Option<i64>,
}

impl LinkedPlayer {
    pub fn refid_trimmed(&self) -> Option<&str> {
        let trimmed = self.refid.as_deref()?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn dancer_name_trimmed(&self) -> Option<&str> {
        let trimmed = self.dancer_name.as_deref()?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.refid_trimmed().is_none()
            && self.ddr_code.is_none()
            && self.dancer_name_trimmed().is_none()
    }

    /// Whether a `profile3` record belongs to this player.
    /// Matching priority: `__refid`, then `ddrCode`, then `dancerName`.
    pub fn matches_profile(&self, record: &Record) -> bool {
        if record.collection() != Some(PROFILE_COLLECTION) {
            return false;
        }

        if let Some(refid) = self.refid_trimmed() {
            if record.trimmed_field("__refid").as_deref() == Some(refid) {
                return true;
            }
        }

        if let Some(code) = self.ddr_code {
            if record.int_field("ddrCode") == Some(code) {
                return true;
            }
        }

        if let Some(name) = self.dancer_name_trimmed() {
            if record.dancer_name().as_deref() == Some(name) {
                return true;
            }
        }

        false
    }

    /// Whether a `customize3` record belongs to this player.
    /// Customize ownership matches on `__refid` only.
    pub fn matches_customize(&self, record: &Record) -> bool {
        if record.collection() != Some(CUSTOMIZE_COLLECTION) {
            return false;
        }
        match self.refid_trimmed() {
            Some(refid) => record.trimmed_field("__refid").as_deref() == Some(refid),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_from(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_record_accessors_tolerate_bad_types() {
        let record = record_from(json!({
            "collection": "score3",
            "score": 990123,
            "rank": "not-a-number",
            "dancerName": "   ",
        }));

        assert_eq!(record.collection(), Some("score3"));
        assert_eq!(record.int_field("score"), Some(990123));
        assert_eq!(record.int_field("rank"), None);
        assert_eq!(record.dancer_name(), None);
        assert_eq!(record.int_field("missing"), None);
    }

    #[test]
    fn test_refid_falls_back_to_legacy_field() {
        let record = record_from(json!({"refid": " ABC123 "}));
        assert_eq!(record.refid(), Some("ABC123".to_string()));

        let record = record_from(json!({"__refid": "X1", "refid": "X2"}));
        assert_eq!(record.refid(), Some("X1".to_string()));
    }

    #[test]
    fn test_wrapped_dates() {
        let wrapped = wrap_date_ms(1_700_000_000_000);
        assert_eq!(date_ms(&wrapped), Some(1_700_000_000_000));

        let normalized = normalize_date(&wrapped);
        let text = normalized.as_str().unwrap();
        assert!(text.starts_with("2023-11-14T"));
        assert!(text.ends_with('Z'));

        // Non-wrapped values pass through unchanged
        let plain = json!("2024-01-01");
        assert_eq!(normalize_date(&plain), plain);
        assert_eq!(normalize_date(&Value::Null), Value::Null);
    }

    #[test]
    fn test_record_id_shape() {
        let id = new_record_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, new_record_id());
    }

    #[test]
    fn test_profile_match_priority() {
        let linked = LinkedPlayer {
            dancer_name: Some("YUKI".to_string()),
            refid: Some("REF1".to_string()),
            pcbid: None,
            ddr_code: Some(1234),
        };

        // refid wins even when the name differs
        let by_refid = record_from(json!({
            "collection": "profile3", "__refid": "REF1", "dancerName": "OTHER"
        }));
        assert!(linked.matches_profile(&by_refid));

        let by_code = record_from(json!({
            "collection": "profile3", "ddrCode": 1234
        }));
        assert!(linked.matches_profile(&by_code));

        let by_name = record_from(json!({
            "collection": "profile3", "dancerName": " YUKI "
        }));
        assert!(linked.matches_profile(&by_name));

        let other = record_from(json!({
            "collection": "profile3", "__refid": "REF2", "dancerName": "NOPE"
        }));
        assert!(!linked.matches_profile(&other));

        // wrong collection never matches
        let score = record_from(json!({"collection": "score3", "__refid": "REF1"}));
        assert!(!linked.matches_profile(&score));
    }

    #[test]
    fn test_customize_match_requires_refid() {
        let record = record_from(json!({"collection": "customize3", "__refid": "REF1"}));

        let linked = LinkedPlayer {
            refid: Some("REF1".to_string()),
            ..Default::default()
        };
        assert!(linked.matches_customize(&record));

        let unlinked = LinkedPlayer {
            dancer_name: Some("YUKI".to_string()),
            ..Default::default()
        };
        assert!(!unlinked.matches_customize(&record));
    }
}
