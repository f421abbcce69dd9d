use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::record::LinkedPlayer;
use crate::store::ScoreSource;

/// Query parameters for `GET /api/scores`
#[derive(Debug, Deserialize)]
pub struct ScoresQuery {
    pub limit: Option<usize>,
    pub dancer: Option<String>,
    pub source: Option<ScoreSource>,
}

/// Query parameters for `GET /api/scores/ranking`
#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    #[serde(rename = "songId")]
    pub song_id: String,
    pub source: Option<ScoreSource>,
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/songs`
#[derive(Debug, Deserialize)]
pub struct SongsQuery {
    pub q: Option<String>,
}

/// Linked-player identity passed in query strings. Authentication lives
/// outside this service, so callers supply the identity their session layer
/// resolved.
#[derive(Debug, Deserialize)]
pub struct LinkedQuery {
    #[serde(rename = "dancerName")]
    pub dancer_name: Option<String>,
    pub refid: Option<String>,
    pub pcbid: Option<String>,
    #[serde(rename = "ddrCode")]
    pub ddr_code: Option<i64>,
}

impl LinkedQuery {
    pub fn into_linked(self) -> LinkedPlayer {
        LinkedPlayer {
            dancer_name: self.dancer_name,
            refid: self.refid,
            pcbid: self.pcbid,
            ddr_code: self.ddr_code,
        }
    }
}

/// Body of `PUT /api/profile`. The patch may mix core profile fields and
/// customize slot fields; the handler splits them the way the original
/// profile endpoint did.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub linked: LinkedPlayer,
    pub patch: Map<String, Value>,
}

/// Body of `PUT /api/customize`: named slot -> selection key
#[derive(Debug, Deserialize)]
pub struct CustomizeUpdateRequest {
    pub linked: LinkedPlayer,
    pub slots: Map<String, Value>,
}

/// Generic response
#[derive(Serialize)]
pub struct GenericResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, error_code: &str) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_code: error_code.to_string(),
        }
    }
}
