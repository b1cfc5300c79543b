use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::de::DeserializeOwned;

use crate::spotify_rs::types::{
    AddItemsRequest, CreatePlaylistRequest, SpotifyAudioFeatures, SpotifyAudioFeaturesResponse,
    SpotifyPage, SpotifyPlaylist, SpotifyPlaylistItem, SpotifySavedAlbum, SpotifySimplifiedTrack,
    SpotifySnapshot, SpotifyUser,
};

pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Maximum number of items `POST /playlists/{id}/tracks` accepts per call.
pub const MAX_ITEMS_PER_ADD: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Spotify API client
pub struct SpotifyClient {
    access_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, SPOTIFY_API_URL)
    }

    pub fn with_base_url(access_token: String, base_url: impl Into<String>) -> Self {
        Self {
            access_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        response
            .json()
            .await
            .wrap_err_with(|| format!("Failed to deserialize response of GET {}", path))
    }

    fn page_query(limit: u32, offset: u32) -> [(&'static str, String); 2] {
        [("limit", limit.to_string()), ("offset", offset.to_string())]
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser> {
        self.get_json("/me", &[]).await
    }

    /// Get one page of the albums saved in the user's library
    pub async fn get_saved_albums(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifySavedAlbum>> {
        self.get_json("/me/albums", &Self::page_query(limit, offset))
            .await
    }

    /// Get one page of an album's tracks
    pub async fn get_album_tracks(
        &self,
        album_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifySimplifiedTrack>> {
        self.get_json(
            &format!("/albums/{}/tracks", urlencoding::encode(album_id)),
            &Self::page_query(limit, offset),
        )
        .await
    }

    /// Get one page of the playlists owned or followed by the user
    pub async fn get_current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyPlaylist>> {
        self.get_json("/me/playlists", &Self::page_query(limit, offset))
            .await
    }

    /// Get one page of a playlist's items
    pub async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyPlaylistItem>> {
        self.get_json(
            &format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)),
            &Self::page_query(limit, offset),
        )
        .await
    }

    /// Get audio features for several tracks. Entries are `None` for tracks the
    /// analysis service knows nothing about.
    pub async fn get_audio_features(
        &self,
        track_ids: &[&str],
    ) -> Result<Vec<Option<SpotifyAudioFeatures>>> {
        let response: SpotifyAudioFeaturesResponse = self
            .get_json("/audio-features", &[("ids", track_ids.join(","))])
            .await?;
        Ok(response.audio_features)
    }

    /// Create a playlist owned by `user_id`
    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> Result<SpotifyPlaylist> {
        let response = self
            .client
            .post(self.url(&format!("/users/{}/playlists", urlencoding::encode(user_id))))
            .bearer_auth(&self.access_token)
            .json(&CreatePlaylistRequest {
                name,
                public,
                description,
            })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        response
            .json()
            .await
            .wrap_err("Failed to deserialize created playlist")
    }

    /// Append items to a playlist. At most [`MAX_ITEMS_PER_ADD`] uris per call.
    pub async fn add_items_to_playlist(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String> {
        if uris.len() > MAX_ITEMS_PER_ADD {
            color_eyre::eyre::bail!(
                "Cannot add {} items in one request (max {})",
                uris.len(),
                MAX_ITEMS_PER_ADD
            );
        }

        let response = self
            .client
            .post(self.url(&format!(
                "/playlists/{}/tracks",
                urlencoding::encode(playlist_id)
            )))
            .bearer_auth(&self.access_token)
            .json(&AddItemsRequest { uris })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let snapshot: SpotifySnapshot = response
            .json()
            .await
            .wrap_err("Failed to deserialize playlist snapshot")?;
        Ok(snapshot.snapshot_id)
    }

    /// Audio features for a single track
    pub async fn get_track_audio_features(
        &self,
        track_id: &str,
    ) -> Result<Option<SpotifyAudioFeatures>> {
        let features = self.get_audio_features(&[track_id]).await?;
        Ok(features.into_iter().next().flatten())
    }
}
