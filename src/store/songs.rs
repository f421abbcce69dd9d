use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::{Map, Value};

use crate::core::error::StoreError;

/// Song catalog index keyed by mcode.
///
/// The catalog file is accepted in either of the two shapes seen in the
/// wild: a JSON array of song objects carrying an `mcode` field, or an
/// object keyed by mcode. Keys are normalized to their string form so that
/// integer and string song ids resolve to the same entry.
#[derive(Debug, Default)]
pub struct SongIndex {
    by_mcode: HashMap<String, Map<String, Value>>,
}

impl SongIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and index the catalog file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        let raw: Value = serde_json::from_reader(BufReader::new(file))?;

        let mut by_mcode = HashMap::new();
        match raw {
            Value::Array(items) => {
                for item in items {
                    let Value::Object(mut song) = item else {
                        continue;
                    };
                    let Some(key) = song.get("mcode").and_then(id_key) else {
                        continue;
                    };
                    normalize_name(&mut song);
                    by_mcode.insert(key, song);
                }
            }
            Value::Object(entries) => {
                for (key, value) in entries {
                    let Value::Object(mut song) = value else {
                        continue;
                    };
                    normalize_name(&mut song);
                    by_mcode.insert(key, song);
                }
            }
            _ => {}
        }

        Ok(Self { by_mcode })
    }

    /// Look up song metadata by id, tolerating int or string forms.
    pub fn get(&self, id: &Value) -> Option<&Map<String, Value>> {
        self.by_mcode.get(&id_key(id)?)
    }

    pub fn get_str(&self, id: &str) -> Option<&Map<String, Value>> {
        self.by_mcode.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Map<String, Value>)> {
        self.by_mcode.iter()
    }

    pub fn len(&self) -> usize {
        self.by_mcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mcode.is_empty()
    }
}

fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_name(song: &mut Map<String, Value>) {
    if !song.contains_key("name") {
        if let Some(title) = song.get("title").cloned() {
            song.insert("name".to_string(), title);
        }
    }
}
