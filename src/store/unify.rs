use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{json, Value};

use crate::store::record::{normalize_date, Record, SCORES_COLLECTION};
use crate::store::songs::SongIndex;

/// Unified score rows with strong dedup.
///
/// Consumes only `score3` records, fills missing dancer names from profile
/// records, attaches song metadata, sorts best-first, and then deduplicates
/// so each player keeps one row per chart. Sorting happens before dedup, so
/// dedup never drops a strictly better score.

/// Style label used by unified rows: 0 is single, 1 is double, anything
/// else passes through as its number.
pub fn map_style_label(style: Option<i64>) -> Option<String> {
    style.map(|s| match s {
        0 => "S".to_string(),
        1 => "D".to_string(),
        other => other.to_string(),
    })
}

/// One unified score row
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedScore {
    pub source: String,
    #[serde(rename = "songId")]
    pub song_id: Value,
    pub style: Option<i64>,
    pub mode: Option<String>,
    pub difficulty: Option<i64>,
    #[serde(rename = "dancerName")]
    pub dancer_name: String,
    pub score: Value,
    pub rank: Option<i64>,
    #[serde(rename = "clearKind")]
    pub clear_kind: Option<i64>,
    #[serde(rename = "exScore")]
    pub ex_score: Value,
    #[serde(rename = "maxCombo")]
    pub max_combo: Value,
    pub country: Value,
    pub region: Value,
    #[serde(rename = "createdAt")]
    pub created_at: Value,
    #[serde(rename = "updatedAt")]
    pub updated_at: Value,
    #[serde(rename = "songMeta")]
    pub song_meta: Value,
    pub grade: Option<String>,
    pub raw: Value,
}

/// Build the unified, deduplicated score list. The name fallback index is
/// built from `profiles`, so score records that carry only a refid or pcbid
/// still resolve to a dancer name.
pub fn unify_records(
    scores: &[Record],
    profiles: &[Record],
    songs: &SongIndex,
) -> Vec<UnifiedScore> {
    let (names_by_refid, names_by_pcbid) = profile_name_index(profiles);

    let mut rows: Vec<UnifiedScore> = scores
        .iter()
        .filter(|r| r.collection() == Some(SCORES_COLLECTION))
        .map(|record| unified_row(record, songs, &names_by_refid, &names_by_pcbid))
        .collect();

    rows.sort_by(|a, b| {
        let key_a = (score_value(&a.score), created_key(a));
        let key_b = (score_value(&b.score), created_key(b));
        key_b
            .0
            .total_cmp(&key_a.0)
            .then_with(|| key_b.1.cmp(&key_a.1))
    });

    dedup(rows)
}

/// Dancer-name fallback index from profile records: first name seen per
/// refid/pcbid wins.
fn profile_name_index(
    profiles: &[Record],
) -> (HashMap<String, String>, HashMap<String, String>) {
    let mut by_refid = HashMap::new();
    let mut by_pcbid = HashMap::new();

    for record in profiles {
        if !matches!(record.collection(), Some("profile3") | Some("profile")) {
            continue;
        }
        let name = record
            .dancer_name()
            .or_else(|| record.trimmed_field("player"))
            .or_else(|| record.trimmed_field("name"));
        let Some(name) = name else {
            continue;
        };
        if let Some(refid) = record.trimmed_field("__refid") {
            by_refid.entry(refid).or_insert_with(|| name.clone());
        }
        if let Some(pcbid) = record.pcbid() {
            by_pcbid.entry(pcbid).or_insert(name);
        }
    }

    (by_refid, by_pcbid)
}

fn unified_row(
    record: &Record,
    songs: &SongIndex,
    names_by_refid: &HashMap<String, String>,
    names_by_pcbid: &HashMap<String, String>,
) -> UnifiedScore {
    let style = record.int_field("style");

    let dancer_name = record
        .dancer_name()
        .or_else(|| record.trimmed_field("player"))
        .or_else(|| {
            record
                .trimmed_field("__refid")
                .and_then(|refid| names_by_refid.get(&refid).cloned())
        })
        .or_else(|| {
            record
                .pcbid()
                .and_then(|pcbid| names_by_pcbid.get(&pcbid).cloned())
        })
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let song_id = record.song_id().cloned().unwrap_or(Value::Null);
    let meta = songs.get(&song_id);

    let meta_get = |key: &str| -> Value {
        meta.and_then(|m| m.get(key)).cloned().unwrap_or(Value::Null)
    };
    let meta_first = |keys: &[&str]| -> Value {
        for key in keys {
            let value = meta_get(key);
            if !value.is_null() {
                return value;
            }
        }
        Value::Null
    };

    let name = match meta_first(&["name", "title"]) {
        Value::Null => match &song_id {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        },
        value => value,
    };

    let song_meta = json!({
        "name": name,
        "artist": if meta_get("artist").is_null() { json!("") } else { meta_get("artist") },
        "series": if meta_get("series").is_null() { json!("") } else { meta_get("series") },
        "bpm": meta_get("bpm"),
        "imageUrl": meta_first(&["imageUrl", "image_url"]),
        "imageBasename": meta_first(&["imageBasename", "image_basename", "basename", "image", "cover"]),
        "levelInfo": meta_first(&["levelInfo", "diffLv"]),
    });

    UnifiedScore {
        source: SCORES_COLLECTION.to_string(),
        song_id,
        style,
        mode: map_style_label(style),
        difficulty: record.int_field("difficulty"),
        dancer_name,
        score: record.get("score").cloned().unwrap_or(Value::Null),
        rank: record.int_field("rank"),
        clear_kind: record.int_field("clearKind"),
        ex_score: record.get("exScore").cloned().unwrap_or(Value::Null),
        max_combo: record.get("maxCombo").cloned().unwrap_or(Value::Null),
        country: record.get("country").cloned().unwrap_or(Value::Null),
        region: record.get("region").cloned().unwrap_or(Value::Null),
        created_at: record
            .get("createdAt")
            .map(normalize_date)
            .unwrap_or(Value::Null),
        updated_at: record
            .get("updatedAt")
            .map(normalize_date)
            .unwrap_or(Value::Null),
        song_meta,
        grade: None,
        raw: serde_json::to_value(record).unwrap_or(Value::Null),
    }
}

pub(crate) fn score_value(score: &Value) -> f64 {
    score.as_f64().unwrap_or(0.0)
}

fn created_key(row: &UnifiedScore) -> String {
    row.created_at.as_str().unwrap_or("").to_string()
}

/// Drop duplicate rows, keeping the first (best, since rows are sorted)
/// occurrence per chart and player. Three keys guard against partially
/// filled records:
/// - `(songId, mode, difficulty, dancer)` when difficulty is present,
/// - `(songId, mode, dancer)` when it is not,
/// - `(songId, dancer, score)` always.
fn dedup(rows: Vec<UnifiedScore>) -> Vec<UnifiedScore> {
    let mut seen_primary = HashSet::new();
    let mut seen_fallback = HashSet::new();
    let mut seen_same_score = HashSet::new();

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let song_key = row.song_id.to_string();
        let mode_key = row.mode.clone().unwrap_or_default();

        let primary = row
            .difficulty
            .map(|d| format!("{}|{}|{}|{}", song_key, mode_key, d, row.dancer_name));
        let fallback = format!("{}|{}|{}", song_key, mode_key, row.dancer_name);
        let same_score = format!("{}|{}|{}", song_key, row.dancer_name, row.score);

        if let Some(key) = &primary {
            if seen_primary.contains(key) {
                continue;
            }
        }
        if primary.is_none() && seen_fallback.contains(&fallback) {
            continue;
        }
        if seen_same_score.contains(&same_score) {
            continue;
        }

        match primary {
            Some(key) => {
                seen_primary.insert(key);
            }
            None => {
                seen_fallback.insert(fallback);
            }
        }
        seen_same_score.insert(same_score);

        out.push(row);
    }

    out
}
