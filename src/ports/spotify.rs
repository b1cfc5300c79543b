use color_eyre::eyre::Result;

use crate::library::track::AudioFeatures;

/// Decoupled representation of a saved album from the API, including the first
/// page of its tracks.
#[derive(Debug, Clone)]
pub struct ApiAlbum {
    pub id: String,
    pub name: String,
    /// Primary album artist
    pub artist: String,
    pub total_tracks: u32,
    pub tracks: Vec<ApiTrack>,
}

/// Decoupled representation of a playlist from the API.
#[derive(Debug, Clone)]
pub struct ApiPlaylist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// Decoupled representation of a track from the API.
///
/// Local files and unavailable tracks come back without an id.
#[derive(Debug, Clone)]
pub struct ApiTrack {
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: u64,
    pub explicit: bool,
    pub track_number: u32,
    /// Primary track artist
    pub artist: Option<String>,
    pub album_name: Option<String>,
}

/// Port trait wrapping the Spotify API capabilities used by business logic.
///
/// Implementations live in `services::spotify::client` (production) or test mocks.
/// Paged methods return a single page; callers drive `limit`/`offset`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user_id(&self) -> Result<String>;

    async fn saved_albums(&self, limit: u32, offset: u32) -> Result<Vec<ApiAlbum>>;

    async fn album_tracks(&self, album_id: &str, limit: u32, offset: u32)
    -> Result<Vec<ApiTrack>>;

    async fn current_user_playlists(&self, limit: u32, offset: u32) -> Result<Vec<ApiPlaylist>>;

    /// Entries whose track was removed from the catalog are `None`.
    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Option<ApiTrack>>>;

    async fn audio_features(&self, track_id: &str) -> Result<Option<AudioFeatures>>;

    /// Returns the id of the new playlist.
    async fn create_playlist(&self, user_id: &str, name: &str, public: bool) -> Result<String>;

    async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: Vec<String>) -> Result<()>;
}
