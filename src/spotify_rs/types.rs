use serde::{Deserialize, Serialize};

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Offset-based paging envelope used by every collection endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPage<T> {
    pub items: Vec<T>,
}

impl<T> Default for SpotifyPage<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

/// Entry of `GET /me/albums`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifySavedAlbum {
    pub album: SpotifyAlbum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub total_tracks: u32,
    #[serde(default)]
    pub tracks: SpotifyPage<SpotifySimplifiedTrack>,
}

/// Track as embedded in an album, without album details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifySimplifiedTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAlbumRef {
    pub name: String,
}

/// Full track as returned inside playlist items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub album: Option<SpotifyAlbumRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyOwner {
    pub id: String,
}

/// Spotify playlist from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub owner: SpotifyOwner,
}

/// Entry of `GET /playlists/{id}/tracks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistItem {
    pub track: Option<SpotifyTrack>,
}

/// One entry of `GET /audio-features`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAudioFeatures {
    pub tempo: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub loudness: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAudioFeaturesResponse {
    pub audio_features: Vec<Option<SpotifyAudioFeatures>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub public: bool,
    pub description: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddItemsRequest<'a> {
    pub uris: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySnapshot {
    pub snapshot_id: String,
}

/// PKCE OAuth session data
#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub code_verifier: String,
    pub state: String,
}
