use color_eyre::eyre::{Result, WrapErr, bail};

use crate::library::track::AudioFeatures;
use crate::ports::spotify::{ApiAlbum, ApiPlaylist, ApiTrack, SpotifyClient};
use crate::spotify_rs::auth::refresh_access_token;
use crate::spotify_rs::client::SpotifyClient as SpotifyApi;
use crate::spotify_rs::types::{
    SpotifyAlbum, SpotifyArtist, SpotifyAudioFeatures, SpotifyPlaylist, SpotifySimplifiedTrack,
    SpotifyTrack,
};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyApiCredentials {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

/// Production adapter of the [`SpotifyClient`] port over the Web API wrapper.
pub struct SpotifyApiClient {
    api: SpotifyApi,
}

impl SpotifyApiClient {
    pub fn new(access_token: String) -> Self {
        Self {
            api: SpotifyApi::new(access_token),
        }
    }

    /// Use `access_token` when given, otherwise trade the refresh token for a fresh one.
    pub async fn connect(
        credentials: Option<&SpotifyApiCredentials>,
        refresh_token: Option<&str>,
        access_token: Option<String>,
    ) -> Result<Self> {
        if let Some(access_token) = access_token {
            return Ok(Self::new(access_token));
        }

        let (Some(credentials), Some(refresh_token)) = (credentials, refresh_token) else {
            bail!(
                "No Spotify access token available. Run `login` or pass --access-token"
            );
        };

        tracing::debug!("Refreshing Spotify access token");
        let token = refresh_access_token(
            credentials.client_id(),
            credentials.client_secret(),
            refresh_token,
        )
        .await
        .wrap_err("Failed to refresh Spotify access token")?;

        Ok(Self::new(token.access_token))
    }
}

fn primary_artist(artists: &[SpotifyArtist]) -> Option<String> {
    artists.first().map(|artist| artist.name.clone())
}

fn from_simplified_track(track: SpotifySimplifiedTrack, album_name: Option<&str>) -> ApiTrack {
    ApiTrack {
        artist: primary_artist(&track.artists),
        id: track.id,
        name: track.name,
        duration_ms: track.duration_ms,
        explicit: track.explicit,
        track_number: track.track_number,
        album_name: album_name.map(str::to_string),
    }
}

fn from_track(track: SpotifyTrack) -> ApiTrack {
    ApiTrack {
        artist: primary_artist(&track.artists),
        id: track.id,
        name: track.name,
        duration_ms: track.duration_ms,
        explicit: track.explicit,
        track_number: track.track_number,
        album_name: track.album.map(|album| album.name),
    }
}

fn from_album(album: SpotifyAlbum) -> ApiAlbum {
    let tracks = album
        .tracks
        .items
        .into_iter()
        .map(|track| from_simplified_track(track, Some(album.name.as_str())))
        .collect();

    ApiAlbum {
        artist: primary_artist(&album.artists).unwrap_or_default(),
        id: album.id,
        name: album.name,
        total_tracks: album.total_tracks,
        tracks,
    }
}

fn from_playlist(playlist: SpotifyPlaylist) -> ApiPlaylist {
    ApiPlaylist {
        id: playlist.id,
        name: playlist.name,
        owner_id: playlist.owner.id,
    }
}

fn from_features(features: SpotifyAudioFeatures) -> AudioFeatures {
    AudioFeatures {
        tempo: features.tempo,
        energy: features.energy,
        danceability: features.danceability,
        loudness: features.loudness,
        extra: features.extra,
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyApiClient {
    async fn current_user_id(&self) -> Result<String> {
        Ok(self.api.get_current_user().await?.id)
    }

    async fn saved_albums(&self, limit: u32, offset: u32) -> Result<Vec<ApiAlbum>> {
        let page = self.api.get_saved_albums(limit, offset).await?;
        Ok(page
            .items
            .into_iter()
            .map(|saved| from_album(saved.album))
            .collect())
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ApiTrack>> {
        let page = self.api.get_album_tracks(album_id, limit, offset).await?;
        Ok(page
            .items
            .into_iter()
            .map(|track| from_simplified_track(track, None))
            .collect())
    }

    async fn current_user_playlists(&self, limit: u32, offset: u32) -> Result<Vec<ApiPlaylist>> {
        let page = self.api.get_current_user_playlists(limit, offset).await?;
        Ok(page.items.into_iter().map(from_playlist).collect())
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Option<ApiTrack>>> {
        let page = self
            .api
            .get_playlist_tracks(playlist_id, limit, offset)
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|item| item.track.map(from_track))
            .collect())
    }

    async fn audio_features(&self, track_id: &str) -> Result<Option<AudioFeatures>> {
        Ok(self
            .api
            .get_track_audio_features(track_id)
            .await?
            .map(from_features))
    }

    async fn create_playlist(&self, user_id: &str, name: &str, public: bool) -> Result<String> {
        let playlist = self.api.create_playlist(user_id, name, public, "").await?;
        Ok(playlist.id)
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, uris: Vec<String>) -> Result<()> {
        self.api.add_items_to_playlist(playlist_id, &uris).await?;
        Ok(())
    }
}
