use std::env;
use std::path::PathBuf;

/// Runtime settings for the scoreboard backend.
///
/// Everything is read from the environment with sensible local-dev defaults:
/// - `SCOREBOARD_NDJSON_PATH`: the game's NDJSON save file (one JSON record
///   per line, tagged with a `collection` field)
/// - `SCOREBOARD_SONGS_PATH`: the song catalog (`songs.json`, array or
///   object keyed by mcode)
/// - `SCOREBOARD_BIND_ADDR`: address the HTTP server binds to
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the NDJSON save file
    pub ndjson_path: PathBuf,

    /// Path to the song catalog JSON
    pub songs_path: PathBuf,

    /// Bind address for the web server
    pub bind_addr: String,
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            ndjson_path: env::var("SCOREBOARD_NDJSON_PATH")
                .unwrap_or_else(|_| "data/savedata.db".to_string())
                .into(),
            songs_path: env::var("SCOREBOARD_SONGS_PATH")
                .unwrap_or_else(|_| "data/songs.json".to_string())
                .into(),
            bind_addr: env::var("SCOREBOARD_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}
