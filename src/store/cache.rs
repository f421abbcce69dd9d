use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::info;
use serde_json::{Map, Value};

use crate::core::error::StoreError;
use crate::store::ndjson;
use crate::store::record::{
    Record, HISCORES_COLLECTION, PROFILE_COLLECTION, SCORES_COLLECTION,
};
use crate::store::songs::SongIndex;

/// In-memory read cache over the save file and the song catalog.
///
/// The cache holds the parsed `score3`/`hiscore3` record lists, profile
/// indexes for dancer-name resolution, and the song index. Reloads are
/// driven by file modification times: `load_if_changed` re-reads a file only
/// when its mtime differs from the one recorded at the previous load, so a
/// cache serving requests is never older than the last observed mtime.
#[derive(Debug)]
pub struct ScoreboardCache {
    ndjson_path: PathBuf,
    songs_path: PathBuf,

    /// Song catalog index
    pub songs: SongIndex,

    /// Raw score3 records
    pub scores: Vec<Record>,
    /// Raw hiscore3 records
    pub hiscores: Vec<Record>,

    /// Raw profile records, in file order
    pub profiles: Vec<Record>,

    /// Profile indexes for dancer-name resolution
    pub profiles_by_refid: HashMap<String, Record>,
    pub profiles_by_pcbid: HashMap<String, Record>,

    // mtimes recorded at the last load, for conditional reloads
    songs_mtime: Option<SystemTime>,
    ndjson_mtime: Option<SystemTime>,
}

impl ScoreboardCache {
    pub fn new(ndjson_path: &Path, songs_path: &Path) -> Self {
        Self {
            ndjson_path: ndjson_path.to_path_buf(),
            songs_path: songs_path.to_path_buf(),
            songs: SongIndex::new(),
            scores: Vec::new(),
            hiscores: Vec::new(),
            profiles: Vec::new(),
            profiles_by_refid: HashMap::new(),
            profiles_by_pcbid: HashMap::new(),
            songs_mtime: None,
            ndjson_mtime: None,
        }
    }

    /// Reload everything unconditionally and record the current mtimes.
    pub fn force_reload(&mut self) -> Result<(), StoreError> {
        self.load_songs()?;
        self.load_ndjson()?;
        self.songs_mtime = ndjson::file_mtime(&self.songs_path);
        self.ndjson_mtime = ndjson::file_mtime(&self.ndjson_path);
        Ok(())
    }

    /// Reload only the files whose on-disk mtime changed since the last
    /// load. A file that has never been loaded is always (re)loaded.
    pub fn load_if_changed(&mut self) -> Result<(), StoreError> {
        let cur_songs = ndjson::file_mtime(&self.songs_path);
        let cur_ndjson = ndjson::file_mtime(&self.ndjson_path);

        if self.songs_mtime.is_none() || (cur_songs.is_some() && cur_songs != self.songs_mtime) {
            self.load_songs()?;
            self.songs_mtime = cur_songs;
        }

        if self.ndjson_mtime.is_none() || (cur_ndjson.is_some() && cur_ndjson != self.ndjson_mtime)
        {
            self.load_ndjson()?;
            self.ndjson_mtime = cur_ndjson;
        }

        Ok(())
    }

    /// Song catalog metadata for a song id (int or string).
    pub fn song_meta(&self, song_id: &Value) -> Option<&Map<String, Value>> {
        self.songs.get(song_id)
    }

    /// Resolve the dancer name for a score/hiscore record:
    /// 1) the record's own `dancerName` if non-blank,
    /// 2) the `profile3` index by refid,
    /// 3) the `profile3` index by pcbid.
    pub fn dancer_name_for(&self, record: &Record) -> Option<String> {
        if let Some(name) = record.dancer_name() {
            return Some(name);
        }

        if let Some(refid) = record.refid() {
            if let Some(profile) = self.profiles_by_refid.get(&refid) {
                if let Some(name) = profile.dancer_name() {
                    return Some(name);
                }
            }
        }

        if let Some(pcbid) = record.pcbid() {
            if let Some(profile) = self.profiles_by_pcbid.get(&pcbid) {
                if let Some(name) = profile.dancer_name() {
                    return Some(name);
                }
            }
        }

        None
    }

    fn load_songs(&mut self) -> Result<(), StoreError> {
        self.songs = SongIndex::load(&self.songs_path)?;
        info!("Loaded {} songs from {}", self.songs.len(), self.songs_path.display());
        Ok(())
    }

    fn load_ndjson(&mut self) -> Result<(), StoreError> {
        let records = ndjson::read_records(&self.ndjson_path)?;

        let mut scores = Vec::new();
        let mut hiscores = Vec::new();
        let mut profiles = Vec::new();
        let mut by_refid = HashMap::new();
        let mut by_pcbid = HashMap::new();

        for record in records {
            match record.collection() {
                Some(SCORES_COLLECTION) => scores.push(record),
                Some(HISCORES_COLLECTION) => hiscores.push(record),
                Some(PROFILE_COLLECTION) => {
                    if let Some(refid) = record.refid() {
                        by_refid.insert(refid, record.clone());
                    }
                    if let Some(pcbid) = record.pcbid() {
                        by_pcbid.insert(pcbid, record.clone());
                    }
                    profiles.push(record);
                }
                _ => {}
            }
        }

        info!(
            "Loaded {} score3, {} hiscore3, {} profiles from {}",
            scores.len(),
            hiscores.len(),
            by_refid.len(),
            self.ndjson_path.display()
        );

        self.scores = scores;
        self.hiscores = hiscores;
        self.profiles = profiles;
        self.profiles_by_refid = by_refid;
        self.profiles_by_pcbid = by_pcbid;

        Ok(())
    }
}
