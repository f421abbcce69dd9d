pub mod cache;
pub mod customize;
pub mod ndjson;
pub mod profile;
pub mod record;
pub mod songs;
pub mod unify;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::Settings;
use crate::core::error::StoreError;
use crate::store::cache::ScoreboardCache;
use crate::store::customize::SlotKey;
use crate::store::record::{LinkedPlayer, Record};
use crate::store::unify::{score_value, UnifiedScore};

/// Which record list a score query reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreSource {
    #[serde(rename = "score3")]
    Score3,
    #[serde(rename = "hiscore3")]
    Hiscore3,
}

impl Default for ScoreSource {
    fn default() -> Self {
        ScoreSource::Score3
    }
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Score3 => "score3",
            ScoreSource::Hiscore3 => "hiscore3",
        }
    }
}

/// Song metadata attached to score rows
#[derive(Debug, Clone, Serialize)]
pub struct SongMetaRow {
    pub title: Value,
    pub name: Value,
    pub basename: Value,
    pub series: Value,
    pub bpm: Value,
    #[serde(rename = "diffLv")]
    pub diff_lv: Value,
}

/// One enriched score row
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRow {
    pub source: String,
    #[serde(rename = "songId")]
    pub song_id: Value,
    pub style: Option<i64>,
    pub mode: String,
    pub difficulty: Option<i64>,
    #[serde(rename = "dancerName")]
    pub dancer_name: String,
    pub score: Value,
    #[serde(rename = "clearKind")]
    pub clear_kind: Option<i64>,
    #[serde(rename = "exScore")]
    pub ex_score: Value,
    #[serde(rename = "maxCombo")]
    pub max_combo: Value,
    pub rank: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: Value,
    #[serde(rename = "updatedAt")]
    pub updated_at: Value,
    #[serde(rename = "songMeta")]
    pub song_meta: Option<SongMetaRow>,
}

/// One entry in a per-song ranking
#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub mode: String,
    #[serde(rename = "dancerName")]
    pub dancer_name: String,
    pub score: f64,
    #[serde(rename = "clearKind")]
    pub clear_kind: Option<i64>,
    pub rank: Option<i64>,
    pub difficulty: Option<i64>,
}

/// Per-song ranking: top N single and top N double
#[derive(Debug, Clone, Serialize)]
pub struct SongRanking {
    #[serde(rename = "songId")]
    pub song_id: Value,
    #[serde(rename = "songMeta")]
    pub song_meta: SongMetaRow,
    pub single: Vec<RankingEntry>,
    pub double: Vec<RankingEntry>,
}

/// Per-dancer clear totals
#[derive(Debug, Clone, Serialize)]
pub struct DancerTotals {
    #[serde(rename = "dancerName")]
    pub dancer_name: String,
    pub total: u64,
    #[serde(rename = "AAA")]
    pub aaa: u64,
    #[serde(rename = "FC")]
    pub fc: u64,
    #[serde(rename = "GFC")]
    pub gfc: u64,
    #[serde(rename = "PFC")]
    pub pfc: u64,
    #[serde(rename = "MFC")]
    pub mfc: u64,
}

/// Dancers summary response
#[derive(Debug, Clone, Serialize)]
pub struct DancersSummary {
    pub total_dancers: usize,
    pub rows: Vec<DancerTotals>,
}

// clearKind values for the full-combo tiers
const CK_FC: i64 = 7;
const CK_GFC: i64 = 8;
const CK_PFC: i64 = 9;
const CK_MFC: i64 = 10;
// index of "AAA" in the game's rank table
const RANK_AAA_IDX: i64 = 0;

/// Router-facing mode label: style 1 is double, everything else single.
fn mode_from_style(style: Option<i64>) -> &'static str {
    if style == Some(1) {
        "D"
    } else {
        "S"
    }
}

/// The scoreboard service: the read cache plus the append-only writers,
/// shared behind one coarse `Arc<RwLock>` in the web layer. There is no
/// finer-grained coordination; every operation runs under the single lock.
#[derive(Debug)]
pub struct ScoreboardService {
    cache: ScoreboardCache,
    ndjson_path: PathBuf,
}

impl ScoreboardService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cache: ScoreboardCache::new(&settings.ndjson_path, &settings.songs_path),
            ndjson_path: settings.ndjson_path.clone(),
        }
    }

    /// Unconditional initial load.
    pub fn warm_up(&mut self) -> Result<(), StoreError> {
        self.cache.force_reload()
    }

    /// Conditional reload driven by file mtimes. Called at the top of every
    /// request handler.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.cache.load_if_changed()
    }

    fn rows_for(&self, source: ScoreSource) -> &[Record] {
        match source {
            ScoreSource::Score3 => &self.cache.scores,
            ScoreSource::Hiscore3 => &self.cache.hiscores,
        }
    }

    fn song_meta_row(&self, song_id: &Value) -> Option<SongMetaRow> {
        let meta = self.cache.song_meta(song_id)?;
        let get = |key: &str| meta.get(key).cloned().unwrap_or(Value::Null);
        Some(SongMetaRow {
            title: get("title"),
            name: match get("name") {
                Value::Null => get("title"),
                value => value,
            },
            basename: get("basename"),
            series: get("series"),
            bpm: get("bpm"),
            diff_lv: get("diffLv"),
        })
    }

    /// Enriched score rows with song metadata and resolved dancer names,
    /// optionally filtered by dancer, sorted by score descending.
    pub fn list_scores(
        &self,
        source: ScoreSource,
        dancer: Option<&str>,
        limit: usize,
    ) -> Vec<ScoreRow> {
        let mut out = Vec::new();

        for record in self.rows_for(source) {
            let dancer_name = self
                .cache
                .dancer_name_for(record)
                .unwrap_or_else(|| "UNKNOWN".to_string());
            if let Some(filter) = dancer {
                if dancer_name != filter {
                    continue;
                }
            }

            let song_id = record.song_id().cloned().unwrap_or(Value::Null);
            let style = record.int_field("style");

            out.push(ScoreRow {
                source: source.as_str().to_string(),
                song_meta: self.song_meta_row(&song_id),
                song_id,
                style,
                mode: mode_from_style(style).to_string(),
                difficulty: record.int_field("difficulty"),
                dancer_name,
                score: record.get("score").cloned().unwrap_or(Value::Null),
                clear_kind: record.int_field("clearKind"),
                ex_score: record.get("exScore").cloned().unwrap_or(Value::Null),
                max_combo: record.get("maxCombo").cloned().unwrap_or(Value::Null),
                rank: record.int_field("rank"),
                created_at: record.get("createdAt").cloned().unwrap_or(Value::Null),
                updated_at: record.get("updatedAt").cloned().unwrap_or(Value::Null),
            });

            if out.len() >= limit {
                break;
            }
        }

        out.sort_by(|a, b| score_value(&b.score).total_cmp(&score_value(&a.score)));
        out
    }

    /// Ranking for one song: each player's best score per mode, split into
    /// top-N single and top-N double.
    pub fn song_ranking(&self, song_id: &str, source: ScoreSource, limit: usize) -> SongRanking {
        let mut best_by_player: HashMap<String, RankingEntry> = HashMap::new();

        for record in self.rows_for(source) {
            let same_song = record
                .song_id()
                .map(|v| id_as_string(v) == song_id)
                .unwrap_or(false);
            if !same_song {
                continue;
            }

            let mode = mode_from_style(record.int_field("style"));
            let dancer_name = self
                .cache
                .dancer_name_for(record)
                .unwrap_or_else(|| "UNKNOWN".to_string());
            let key = format!("{}|{}", mode, dancer_name);

            let score = record
                .get("score")
                .map(score_value)
                .unwrap_or(0.0);

            let better = best_by_player
                .get(&key)
                .map(|prev| score > prev.score)
                .unwrap_or(true);
            if better {
                best_by_player.insert(
                    key,
                    RankingEntry {
                        mode: mode.to_string(),
                        dancer_name,
                        score,
                        clear_kind: record.int_field("clearKind"),
                        rank: record.int_field("rank"),
                        difficulty: record.int_field("difficulty"),
                    },
                );
            }
        }

        let mut single: Vec<RankingEntry> = Vec::new();
        let mut double: Vec<RankingEntry> = Vec::new();
        for entry in best_by_player.into_values() {
            if entry.mode == "D" {
                double.push(entry);
            } else {
                single.push(entry);
            }
        }
        single.sort_by(|a, b| b.score.total_cmp(&a.score));
        double.sort_by(|a, b| b.score.total_cmp(&a.score));
        single.truncate(limit);
        double.truncate(limit);

        let song_id_value = Value::String(song_id.to_string());
        let song_meta = self
            .song_meta_row(&song_id_value)
            .map(|mut meta| {
                // ranking payloads prefer title, falling back to name
                if meta.title.is_null() {
                    meta.title = meta.name.clone();
                }
                meta
            })
            .unwrap_or(SongMetaRow {
                title: Value::Null,
                name: Value::Null,
                basename: Value::Null,
                series: Value::Null,
                bpm: Value::Null,
                diff_lv: Value::Null,
            });

        SongRanking {
            song_id: song_id_value,
            song_meta,
            single,
            double,
        }
    }

    /// Per-dancer totals over `score3`: total plays, AAA count, and the
    /// four full-combo tiers, sorted by (AAA, total) descending.
    pub fn dancers_summary(&self) -> DancersSummary {
        let mut agg: HashMap<String, DancerTotals> = HashMap::new();

        for record in &self.cache.scores {
            let name = self
                .cache
                .dancer_name_for(record)
                .unwrap_or_else(|| "UNKNOWN".to_string());

            let totals = agg.entry(name.clone()).or_insert_with(|| DancerTotals {
                dancer_name: name,
                total: 0,
                aaa: 0,
                fc: 0,
                gfc: 0,
                pfc: 0,
                mfc: 0,
            });

            totals.total += 1;

            if record.int_field("rank") == Some(RANK_AAA_IDX) {
                totals.aaa += 1;
            }

            match record.int_field("clearKind") {
                Some(CK_FC) => totals.fc += 1,
                Some(CK_GFC) => totals.gfc += 1,
                Some(CK_PFC) => totals.pfc += 1,
                Some(CK_MFC) => totals.mfc += 1,
                _ => {}
            }
        }

        let mut rows: Vec<DancerTotals> = agg.into_values().collect();
        rows.sort_by(|a, b| (b.aaa, b.total).cmp(&(a.aaa, a.total)));

        DancersSummary {
            total_dancers: rows.len(),
            rows,
        }
    }

    /// Song catalog rows filtered case-insensitively on name/artist,
    /// sorted by name.
    pub fn list_songs(&self, query: Option<&str>) -> Vec<Map<String, Value>> {
        let needle = query.map(str::to_lowercase);

        let mut items: Vec<Map<String, Value>> = Vec::new();
        for (key, song) in self.cache.songs.iter() {
            let name = song
                .get("name")
                .or_else(|| song.get("title"))
                .and_then(Value::as_str)
                .unwrap_or(key);
            let artist = song.get("artist").and_then(Value::as_str).unwrap_or("");

            if let Some(needle) = &needle {
                if !name.to_lowercase().contains(needle)
                    && !artist.to_lowercase().contains(needle)
                {
                    continue;
                }
            }

            let mut row = Map::new();
            row.insert("id".to_string(), Value::String(key.clone()));
            for (field, value) in song {
                row.insert(field.clone(), value.clone());
            }
            items.push(row);
        }

        items.sort_by_key(|row| {
            row.get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        });
        items
    }

    /// Unified, deduplicated score rows over the live cache. Profile records
    /// feed the dancer-name fallback index.
    pub fn unified_scores(&self) -> Vec<UnifiedScore> {
        unify::unify_records(&self.cache.scores, &self.cache.profiles, &self.cache.songs)
    }

    // ----- profile / customize pass-throughs (read the file directly; the
    // cache picks the appended lines up on its next mtime check) -----

    pub fn read_profile(
        &self,
        linked: &LinkedPlayer,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        profile::read_profile_snapshot(&self.ndjson_path, linked)
    }

    pub fn update_profile(
        &mut self,
        linked: &LinkedPlayer,
        patch: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        profile::update_profile_fields(&self.ndjson_path, linked, patch)
    }

    pub fn read_customize(
        &self,
        linked: &LinkedPlayer,
    ) -> Result<HashMap<SlotKey, i64>, StoreError> {
        customize::read_customize(&self.ndjson_path, linked)
    }

    pub fn update_customize(
        &mut self,
        linked: &LinkedPlayer,
        changes: &HashMap<SlotKey, i64>,
    ) -> Result<HashMap<SlotKey, i64>, StoreError> {
        customize::update_customize(&self.ndjson_path, linked, changes)
    }
}

fn id_as_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    struct Fixture {
        settings: Settings,
        ndjson: PathBuf,
        songs: PathBuf,
    }

    impl Fixture {
        fn new(tag: &str, ndjson_lines: &str, songs: Value) -> Self {
            let nonce: u32 = rand::thread_rng().gen();
            let dir = std::env::temp_dir();
            let ndjson = dir.join(format!("stepboard-service-{}-{:08x}.db", tag, nonce));
            let songs_path = dir.join(format!("stepboard-service-{}-{:08x}.json", tag, nonce));
            fs::write(&ndjson, ndjson_lines).unwrap();
            fs::write(&songs_path, serde_json::to_string(&songs).unwrap()).unwrap();
            Self {
                settings: Settings {
                    ndjson_path: ndjson.clone(),
                    songs_path: songs_path.clone(),
                    bind_addr: "127.0.0.1:0".to_string(),
                },
                ndjson,
                songs: songs_path,
            }
        }

        fn service(&self) -> ScoreboardService {
            let mut service = ScoreboardService::new(&self.settings);
            service.warm_up().unwrap();
            service
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.ndjson);
            let _ = fs::remove_file(&self.songs);
        }
    }

    fn score_line(song_id: i64, style: i64, dancer: &str, score: i64, rank: i64, ck: i64) -> String {
        format!(
            "{{\"collection\":\"score3\",\"songId\":{},\"style\":{},\"dancerName\":\"{}\",\"score\":{},\"rank\":{},\"clearKind\":{}}}\n",
            song_id, style, dancer, score, rank, ck
        )
    }

    #[test]
    fn test_list_scores_enriches_filters_and_sorts() {
        let lines = [
            score_line(100, 0, "YUKI", 850000, 2, 0),
            score_line(100, 1, "YUKI", 990000, 0, 9),
            score_line(100, 0, "AKIRA", 920000, 1, 7),
        ]
        .concat();
        let fixture = Fixture::new(
            "list",
            &lines,
            json!([{"mcode": 100, "title": "PARANOiA", "basename": "paranoia"}]),
        );
        let service = fixture.service();

        let rows = service.list_scores(ScoreSource::Score3, None, 200);
        assert_eq!(rows.len(), 3);
        // sorted by score descending
        assert_eq!(score_value(&rows[0].score), 990000.0);
        assert_eq!(rows[0].mode, "D");
        let meta = rows[0].song_meta.as_ref().unwrap();
        assert_eq!(meta.name, json!("PARANOiA"));
        assert_eq!(meta.basename, json!("paranoia"));

        let filtered = service.list_scores(ScoreSource::Score3, Some("AKIRA"), 200);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].dancer_name, "AKIRA");

        let limited = service.list_scores(ScoreSource::Score3, None, 2);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_list_scores_hiscore_source() {
        let fixture = Fixture::new(
            "hiscore",
            "{\"collection\":\"hiscore3\",\"songId\":100,\"style\":0,\"dancerName\":\"YUKI\",\"score\":999000}\n",
            json!([]),
        );
        let service = fixture.service();

        assert!(service.list_scores(ScoreSource::Score3, None, 10).is_empty());
        let rows = service.list_scores(ScoreSource::Hiscore3, None, 10);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, "hiscore3");
        assert!(rows[0].song_meta.is_none());
    }

    #[test]
    fn test_song_ranking_best_per_player_per_mode() {
        let lines = [
            score_line(100, 0, "YUKI", 850000, 2, 0),
            score_line(100, 0, "YUKI", 920000, 1, 0),
            score_line(100, 0, "AKIRA", 900000, 1, 0),
            score_line(100, 1, "AKIRA", 880000, 1, 0),
            score_line(200, 0, "YUKI", 999999, 0, 10),
        ]
        .concat();
        let fixture = Fixture::new("ranking", &lines, json!([{"mcode": 100, "title": "MAX 300"}]));
        let service = fixture.service();

        let ranking = service.song_ranking("100", ScoreSource::Score3, 5);
        assert_eq!(ranking.single.len(), 2);
        assert_eq!(ranking.double.len(), 1);
        // best score per player, other song excluded
        assert_eq!(ranking.single[0].dancer_name, "YUKI");
        assert_eq!(ranking.single[0].score, 920000.0);
        assert_eq!(ranking.single[1].dancer_name, "AKIRA");
        assert_eq!(ranking.song_meta.title, json!("MAX 300"));

        let top1 = service.song_ranking("100", ScoreSource::Score3, 1);
        assert_eq!(top1.single.len(), 1);
    }

    #[test]
    fn test_dancers_summary_counts_and_order() {
        let lines = [
            score_line(100, 0, "YUKI", 990000, 0, 9),
            score_line(101, 0, "YUKI", 980000, 0, 7),
            score_line(102, 0, "YUKI", 970000, 1, 8),
            score_line(100, 0, "AKIRA", 960000, 0, 10),
        ]
        .concat();
        let fixture = Fixture::new("summary", &lines, json!([]));
        let service = fixture.service();

        let summary = service.dancers_summary();
        assert_eq!(summary.total_dancers, 2);

        let yuki = &summary.rows[0];
        assert_eq!(yuki.dancer_name, "YUKI");
        assert_eq!(yuki.total, 3);
        assert_eq!(yuki.aaa, 2);
        assert_eq!(yuki.pfc, 1);
        assert_eq!(yuki.fc, 1);
        assert_eq!(yuki.gfc, 1);

        let akira = &summary.rows[1];
        assert_eq!(akira.aaa, 1);
        assert_eq!(akira.mfc, 1);
    }

    #[test]
    fn test_list_songs_filter_and_sort() {
        let fixture = Fixture::new(
            "songs",
            "",
            json!([
                {"mcode": 1, "title": "PARANOiA", "artist": "180"},
                {"mcode": 2, "title": "Butterfly", "artist": "smile.dk"},
                {"mcode": 3, "title": "MAX 300", "artist": "Omega"}
            ]),
        );
        let service = fixture.service();

        let all = service.list_songs(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].get("name"), Some(&json!("Butterfly")));

        let by_name = service.list_songs(Some("max"));
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].get("id"), Some(&json!("3")));

        let by_artist = service.list_songs(Some("SMILE"));
        assert_eq!(by_artist.len(), 1);
        assert_eq!(by_artist[0].get("name"), Some(&json!("Butterfly")));
    }

    #[test]
    fn test_profile_roundtrip_through_service() {
        let fixture = Fixture::new(
            "profile",
            "{\"collection\":\"profile3\",\"__refid\":\"R1\",\"dancerName\":\"YUKI\",\"weight\":50}\n",
            json!([]),
        );
        let mut service = fixture.service();

        let linked = LinkedPlayer {
            refid: Some("R1".to_string()),
            ..Default::default()
        };

        let mut patch = Map::new();
        patch.insert("weight".to_string(), json!(61));
        let snapshot = service.update_profile(&linked, &patch).unwrap().unwrap();
        assert_eq!(snapshot.get("weight"), Some(&json!(61)));

        let reread = service.read_profile(&linked).unwrap().unwrap();
        assert_eq!(reread.get("weight"), Some(&json!(61)));
    }

    #[test]
    fn test_unified_scores_resolve_names_from_profiles() {
        let fixture = Fixture::new(
            "unified",
            concat!(
                "{\"collection\":\"profile3\",\"__refid\":\"R1\",\"dancerName\":\"YUKI\"}\n",
                "{\"collection\":\"score3\",\"songId\":100,\"style\":0,\"difficulty\":2,\"score\":900000,\"__refid\":\"R1\"}\n",
                "{\"collection\":\"score3\",\"songId\":100,\"style\":0,\"difficulty\":3,\"score\":800000}\n",
            ),
            json!([{"mcode": 100, "title": "PARANOiA"}]),
        );
        let service = fixture.service();

        let rows = service.unified_scores();
        assert_eq!(rows.len(), 2);
        // the nameless score resolves through the profile3 line
        assert_eq!(rows[0].dancer_name, "YUKI");
        assert_eq!(rows[1].dancer_name, "UNKNOWN");
        assert_eq!(rows[0].song_meta["name"], json!("PARANOiA"));
    }
}
