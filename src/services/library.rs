use color_eyre::eyre::{Result, WrapErr};

use crate::library::cache::{ContainerKind, DiskCache};
use crate::library::session::LibrarySession;
use crate::library::track::{AudioFeatures, Track};
use crate::ports::spotify::{ApiAlbum, ApiPlaylist, ApiTrack, SpotifyClient};

/// Page size for every paginated library call.
pub const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Re-list a container's tracks even if it is already cached.
    pub containers: bool,
    /// Look up audio features even for tracks that already have them.
    pub audio_features: bool,
}

/// Builds the track table: loads the disk cache, walks the user's saved albums
/// and own playlists, enriches tracks with audio features and writes each
/// container back to disk.
pub struct LibraryService<C: SpotifyClient> {
    client: C,
    cache: DiskCache,
    session: LibrarySession,
    current_user_id: Option<String>,
}

impl<C: SpotifyClient> LibraryService<C> {
    pub fn new(client: C, cache: DiskCache) -> Self {
        Self {
            client,
            cache,
            session: LibrarySession::new(),
            current_user_id: None,
        }
    }

    pub fn session(&self) -> &LibrarySession {
        &self.session
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The authenticated user's id, fetched once per service.
    pub async fn current_user_id(&mut self) -> Result<String> {
        if let Some(user_id) = &self.current_user_id {
            return Ok(user_id.clone());
        }

        let user_id = self
            .client
            .current_user_id()
            .await
            .wrap_err("Failed to get current user")?;
        self.current_user_id = Some(user_id.clone());
        Ok(user_id)
    }

    /// Read both cache directories into the session without touching the API.
    pub fn load_disk_cache(&mut self) -> Result<()> {
        for kind in [ContainerKind::Album, ContainerKind::Playlist] {
            let containers = self
                .cache
                .load_all(kind)
                .wrap_err_with(|| format!("Failed to load {} cache", kind))?;

            for (id, tracks) in containers {
                self.session.insert_container(kind, id, tracks);
            }

            tracing::info!(
                "Loaded {} {}s from cache",
                self.session.container_count(kind),
                kind
            );
        }
        Ok(())
    }

    /// Load the disk cache, fetching albums and playlists from Spotify when
    /// their cache is empty.
    pub async fn load_caches(&mut self) -> Result<()> {
        self.load_disk_cache()?;

        if self.session.container_count(ContainerKind::Album) == 0 {
            tracing::info!("No album cache found, loading from Spotify...");
            self.fetch_all_albums(RefreshOptions::default()).await?;
        }
        if self.session.container_count(ContainerKind::Playlist) == 0 {
            tracing::info!("No playlist cache found, loading from Spotify...");
            self.fetch_all_playlists(RefreshOptions::default()).await?;
        }

        tracing::info!("{} tracks in library", self.session.track_count());
        Ok(())
    }

    /// Re-list every album and playlist and rewrite their cache files.
    pub async fn update_cache(&mut self, force_audio_features: bool) -> Result<()> {
        if force_audio_features {
            tracing::info!("Forcing update of audio features for all tracks...");
        }

        let options = RefreshOptions {
            containers: true,
            audio_features: force_audio_features,
        };
        self.fetch_all_albums(options).await?;
        self.fetch_all_playlists(options).await?;

        tracing::info!("{} tracks in library", self.session.track_count());
        Ok(())
    }

    pub async fn fetch_all_albums(&mut self, options: RefreshOptions) -> Result<()> {
        let mut offset = 0;
        loop {
            let albums = self
                .client
                .saved_albums(PAGE_SIZE, offset)
                .await
                .wrap_err("Failed to fetch saved albums")?;
            let count = albums.len();
            tracing::info!("Got {} albums. offset={}", count, offset);

            for album in &albums {
                self.enrich_album(album, options).await?;
            }

            if count < PAGE_SIZE as usize {
                break;
            }
            offset += PAGE_SIZE;
        }
        Ok(())
    }

    /// Only playlists owned by the current user are descended into.
    pub async fn fetch_all_playlists(&mut self, options: RefreshOptions) -> Result<()> {
        let user_id = self.current_user_id().await?;

        let mut offset = 0;
        loop {
            let playlists = self
                .client
                .current_user_playlists(PAGE_SIZE, offset)
                .await
                .wrap_err("Failed to fetch playlists")?;
            let count = playlists.len();
            tracing::info!("Got {} playlists. offset={}", count, offset);

            for playlist in &playlists {
                if playlist.owner_id != user_id {
                    tracing::debug!(
                        "Skipping playlist {} owned by {}",
                        playlist.name,
                        playlist.owner_id
                    );
                    continue;
                }
                self.enrich_playlist(playlist, options).await?;
            }

            if count < PAGE_SIZE as usize {
                break;
            }
            offset += PAGE_SIZE;
        }
        Ok(())
    }

    pub async fn enrich_album(
        &mut self,
        album: &ApiAlbum,
        options: RefreshOptions,
    ) -> Result<Vec<Track>> {
        if !options.containers {
            if let Some(tracks) = self.session.container(ContainerKind::Album, &album.id) {
                tracing::info!("Found cached tracks for album {} in memory cache", album.name);
                return Ok(tracks.to_vec());
            }
        }

        let api_tracks = self.album_tracks(album).await?;

        let mut tracks = Vec::with_capacity(api_tracks.len());
        for api_track in &api_tracks {
            if let Some(track) = self
                .enrich_track(api_track, &album.artist, &album.name, None, options)
                .await?
            {
                tracks.push(track);
            }
        }

        self.store(ContainerKind::Album, &album.id, tracks)
    }

    pub async fn enrich_playlist(
        &mut self,
        playlist: &ApiPlaylist,
        options: RefreshOptions,
    ) -> Result<Vec<Track>> {
        if !options.containers {
            if let Some(tracks) = self.session.container(ContainerKind::Playlist, &playlist.id) {
                tracing::info!(
                    "Found cached tracks for playlist {} in memory cache",
                    playlist.name
                );
                return Ok(tracks.to_vec());
            }
        }

        let api_tracks = self.playlist_tracks(playlist).await?;

        let mut tracks = Vec::with_capacity(api_tracks.len());
        for api_track in &api_tracks {
            let artist = api_track.artist.clone().unwrap_or_default();
            let album = api_track.album_name.clone().unwrap_or_default();
            if let Some(track) = self
                .enrich_track(api_track, &artist, &album, Some(&playlist.name), options)
                .await?
            {
                tracks.push(track);
            }
        }

        self.store(ContainerKind::Playlist, &playlist.id, tracks)
    }

    /// The embedded track page may be shorter than the album. Keep paging until
    /// the reported total is reached or a page comes back empty.
    async fn album_tracks(&self, album: &ApiAlbum) -> Result<Vec<ApiTrack>> {
        let mut tracks = album.tracks.clone();
        let total = album.total_tracks as usize;

        if tracks.len() != total {
            tracing::info!(
                "Album {} has {} tracks, but total tracks is {}",
                album.name,
                tracks.len(),
                total
            );
        }

        while tracks.len() < total {
            tracing::info!("Getting tracks for album {}...", album.name);
            let page = self
                .client
                .album_tracks(&album.id, PAGE_SIZE, tracks.len() as u32)
                .await
                .wrap_err_with(|| format!("Failed to fetch tracks for album {}", album.name))?;
            if page.is_empty() {
                break;
            }
            tracks.extend(page);
        }

        Ok(tracks)
    }

    async fn playlist_tracks(&self, playlist: &ApiPlaylist) -> Result<Vec<ApiTrack>> {
        let mut tracks = Vec::new();
        let mut offset = 0;
        loop {
            tracing::info!(
                "Getting tracks for playlist {} with offset {}...",
                playlist.name,
                offset
            );
            let page = self
                .client
                .playlist_tracks(&playlist.id, PAGE_SIZE, offset)
                .await
                .wrap_err_with(|| {
                    format!("Failed to fetch tracks for playlist {}", playlist.name)
                })?;
            let count = page.len();

            for item in page {
                match item {
                    Some(track) => tracks.push(track),
                    None => tracing::debug!("Playlist {} has an unavailable item", playlist.name),
                }
            }

            if count < PAGE_SIZE as usize {
                break;
            }
            offset += PAGE_SIZE;
        }
        Ok(tracks)
    }

    /// `None` for tracks without an id; those are never stored.
    async fn enrich_track(
        &self,
        api_track: &ApiTrack,
        artist: &str,
        album: &str,
        playlist: Option<&str>,
        options: RefreshOptions,
    ) -> Result<Option<Track>> {
        let Some(track_id) = api_track.id.as_deref() else {
            tracing::warn!("Track {} has no id, skipping...", api_track.name);
            return Ok(None);
        };

        let features = self
            .resolve_features(track_id, &api_track.name, options)
            .await?;

        let bpm = features.as_ref().and_then(|features| features.tempo);
        if bpm.is_none() {
            tracing::warn!("No features found for track {}", track_id);
        }

        Ok(Some(Track {
            id: track_id.to_string(),
            name: api_track.name.clone(),
            duration_ms: api_track.duration_ms,
            explicit: api_track.explicit,
            track_number: api_track.track_number,
            artist: artist.to_string(),
            album: album.to_string(),
            playlist: playlist.map(str::to_string),
            bpm,
            features,
        }))
    }

    async fn resolve_features(
        &self,
        track_id: &str,
        track_name: &str,
        options: RefreshOptions,
    ) -> Result<Option<AudioFeatures>> {
        if !options.audio_features {
            let cached = self
                .session
                .track(track_id)
                .and_then(|track| track.features.clone());
            if cached.is_some() {
                return Ok(cached);
            }
        }

        tracing::info!("Getting features for track {} - {}...", track_id, track_name);
        self.client
            .audio_features(track_id)
            .await
            .wrap_err_with(|| format!("Failed to get audio features for track {}", track_id))
    }

    fn store(&mut self, kind: ContainerKind, id: &str, tracks: Vec<Track>) -> Result<Vec<Track>> {
        self.cache
            .save(kind, id, &tracks)
            .wrap_err_with(|| format!("Failed to write {} cache for {}", kind, id))?;
        self.session
            .insert_container(kind, id.to_string(), tracks.clone());
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::spotify::MockSpotifyClient;
    use crate::test_utils::{api_album, api_track, tempo_features, track};

    fn service(client: MockSpotifyClient, dir: &tempfile::TempDir) -> LibraryService<MockSpotifyClient> {
        LibraryService::new(client, DiskCache::new(dir.path()))
    }

    fn playlist(id: &str, owner: &str) -> ApiPlaylist {
        ApiPlaylist {
            id: id.to_string(),
            name: format!("Playlist {}", id),
            owner_id: owner.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_cache_fetches_albums_and_playlists_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client
            .expect_saved_albums()
            .times(1)
            .returning(|_, _| Ok(vec![api_album("al1", 1, vec![api_track(Some("t1"), 1)])]));
        client
            .expect_audio_features()
            .times(1)
            .returning(|_| Ok(Some(tempo_features(170.0))));
        client
            .expect_current_user_id()
            .times(1)
            .returning(|| Ok("me".to_string()));
        client
            .expect_current_user_playlists()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let mut service = service(client, &dir);
        service.load_caches().await.unwrap();

        let track = service.session().track("t1").unwrap();
        assert_eq!(track.bpm, Some(170.0));
        assert_eq!(track.artist, "Album Artist");
        assert_eq!(track.album, "Album al1");
        assert!(track.playlist.is_none());
        assert!(dir.path().join("album").join("al1").is_file());
    }

    #[tokio::test]
    async fn test_populated_cache_makes_no_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache
            .save(ContainerKind::Album, "al1", &[track("t1", Some(120.0))])
            .unwrap();
        cache
            .save(ContainerKind::Playlist, "pl1", &[track("t2", Some(170.0))])
            .unwrap();

        let mut service = service(MockSpotifyClient::new(), &dir);
        service.load_caches().await.unwrap();

        assert_eq!(service.session().track_count(), 2);
        assert_eq!(service.session().container_count(ContainerKind::Album), 1);
        assert_eq!(service.session().container_count(ContainerKind::Playlist), 1);
    }

    #[tokio::test]
    async fn test_cached_container_is_returned_without_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cached = vec![track("t1", Some(120.0)), track("t2", None)];
        DiskCache::new(dir.path())
            .save(ContainerKind::Album, "al1", &cached)
            .unwrap();

        let mut service = service(MockSpotifyClient::new(), &dir);
        service.load_disk_cache().unwrap();

        let album = api_album("al1", 5, vec![api_track(Some("other"), 1)]);
        let tracks = service
            .enrich_album(&album, RefreshOptions::default())
            .await
            .unwrap();
        assert_eq!(tracks, cached);
    }

    #[tokio::test]
    async fn test_album_track_count_mismatch_pages_until_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client
            .expect_album_tracks()
            .withf(|album_id, _, offset| album_id == "al1" && *offset == 1)
            .times(1)
            .returning(|_, _, _| Ok(vec![api_track(Some("t2"), 2), api_track(Some("t3"), 3)]));
        client
            .expect_audio_features()
            .times(3)
            .returning(|_| Ok(Some(tempo_features(128.0))));

        let mut service = service(client, &dir);
        let album = api_album("al1", 3, vec![api_track(Some("t1"), 1)]);
        let tracks = service
            .enrich_album(&album, RefreshOptions::default())
            .await
            .unwrap();

        let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_album_track_count_mismatch_stops_on_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        let mut calls = mockall::Sequence::new();
        client
            .expect_album_tracks()
            .times(1)
            .in_sequence(&mut calls)
            .returning(|_, _, _| Ok(vec![api_track(Some("t2"), 2)]));
        client
            .expect_album_tracks()
            .times(1)
            .in_sequence(&mut calls)
            .returning(|_, _, _| Ok(vec![]));
        client
            .expect_audio_features()
            .returning(|_| Ok(Some(tempo_features(128.0))));

        let mut service = service(client, &dir);
        let album = api_album("al1", 10, vec![api_track(Some("t1"), 1)]);
        let tracks = service
            .enrich_album(&album, RefreshOptions::default())
            .await
            .unwrap();

        assert_eq!(tracks.len(), 2);
    }

    #[tokio::test]
    async fn test_tracks_without_id_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client.expect_playlist_tracks().times(1).returning(|_, _, _| {
            Ok(vec![
                Some(api_track(None, 1)),
                None,
                Some(api_track(Some("t2"), 2)),
            ])
        });
        client
            .expect_audio_features()
            .withf(|track_id| track_id == "t2")
            .times(1)
            .returning(|_| Ok(Some(tempo_features(90.0))));

        let mut service = service(client, &dir);
        let tracks = service
            .enrich_playlist(&playlist("pl1", "me"), RefreshOptions::default())
            .await
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "t2");
        assert_eq!(tracks[0].artist, "Track Artist");
        assert_eq!(tracks[0].album, "Track Album");
        assert_eq!(tracks[0].playlist.as_deref(), Some("Playlist pl1"));
        assert_eq!(service.session().track_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_features_give_undefined_bpm() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client
            .expect_playlist_tracks()
            .returning(|_, _, _| Ok(vec![Some(api_track(Some("t1"), 1))]));
        client.expect_audio_features().returning(|_| Ok(None));

        let mut service = service(client, &dir);
        let tracks = service
            .enrich_playlist(&playlist("pl1", "me"), RefreshOptions::default())
            .await
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].bpm.is_none());
        assert!(tracks[0].features.is_none());

        let on_disk = DiskCache::new(dir.path())
            .load_all(ContainerKind::Playlist)
            .unwrap();
        assert_eq!(on_disk[0].1, tracks);
    }

    #[tokio::test]
    async fn test_playlists_owned_by_others_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client
            .expect_current_user_id()
            .times(1)
            .returning(|| Ok("me".to_string()));
        client
            .expect_current_user_playlists()
            .times(1)
            .returning(|_, _| Ok(vec![playlist("mine", "me"), playlist("theirs", "someone")]));
        client
            .expect_playlist_tracks()
            .withf(|playlist_id, _, _| playlist_id == "mine")
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let mut service = service(client, &dir);
        service
            .fetch_all_playlists(RefreshOptions::default())
            .await
            .unwrap();

        assert!(service.session().container(ContainerKind::Playlist, "mine").is_some());
        assert!(service.session().container(ContainerKind::Playlist, "theirs").is_none());
    }

    #[tokio::test]
    async fn test_full_page_requests_next_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client
            .expect_saved_albums()
            .withf(|_, offset| *offset == 0)
            .times(1)
            .returning(|limit, _| {
                Ok((0..limit)
                    .map(|i| api_album(&format!("al{}", i), 0, vec![]))
                    .collect())
            });
        client
            .expect_saved_albums()
            .withf(|_, offset| *offset == PAGE_SIZE)
            .times(1)
            .returning(|_, _| Ok(vec![api_album("last", 0, vec![])]));

        let mut service = service(client, &dir);
        service
            .fetch_all_albums(RefreshOptions::default())
            .await
            .unwrap();

        assert_eq!(
            service.session().container_count(ContainerKind::Album),
            PAGE_SIZE as usize + 1
        );
    }

    #[tokio::test]
    async fn test_cached_features_are_reused_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let mut cached = track("t1", Some(150.0));
        cached.features = Some(tempo_features(150.0));
        DiskCache::new(dir.path())
            .save(ContainerKind::Album, "al1", &[cached])
            .unwrap();

        let mut client = MockSpotifyClient::new();
        client
            .expect_playlist_tracks()
            .returning(|_, _, _| Ok(vec![Some(api_track(Some("t1"), 1))]));
        client
            .expect_audio_features()
            .times(1)
            .returning(|_| Ok(Some(tempo_features(75.0))));

        let mut service = service(client, &dir);
        service.load_disk_cache().unwrap();

        let reused = service
            .enrich_playlist(&playlist("pl1", "me"), RefreshOptions::default())
            .await
            .unwrap();
        assert_eq!(reused[0].bpm, Some(150.0));

        let forced = service
            .enrich_playlist(
                &playlist("pl1", "me"),
                RefreshOptions {
                    containers: true,
                    audio_features: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(forced[0].bpm, Some(75.0));
        assert_eq!(service.session().track("t1").unwrap().bpm, Some(75.0));
    }

    #[tokio::test]
    async fn test_update_cache_relists_cached_containers() {
        let dir = tempfile::tempdir().unwrap();
        let mut cached = track("t1", Some(150.0));
        cached.features = Some(tempo_features(150.0));
        DiskCache::new(dir.path())
            .save(ContainerKind::Album, "al1", &[cached])
            .unwrap();

        let mut client = MockSpotifyClient::new();
        client.expect_saved_albums().times(1).returning(|_, _| {
            Ok(vec![api_album(
                "al1",
                2,
                vec![api_track(Some("t1"), 1), api_track(Some("t9"), 2)],
            )])
        });
        client
            .expect_audio_features()
            .withf(|track_id| track_id == "t9")
            .times(1)
            .returning(|_| Ok(Some(tempo_features(100.0))));
        client
            .expect_current_user_id()
            .returning(|| Ok("me".to_string()));
        client
            .expect_current_user_playlists()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let mut service = service(client, &dir);
        service.load_disk_cache().unwrap();
        service.update_cache(false).await.unwrap();

        let album = service
            .session()
            .container(ContainerKind::Album, "al1")
            .unwrap();
        assert_eq!(album.len(), 2);
        assert_eq!(service.session().track("t1").unwrap().bpm, Some(150.0));
        assert_eq!(service.session().track("t9").unwrap().bpm, Some(100.0));
    }

    #[tokio::test]
    async fn test_current_user_id_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MockSpotifyClient::new();
        client
            .expect_current_user_id()
            .times(1)
            .returning(|| Ok("me".to_string()));

        let mut service = service(client, &dir);
        assert_eq!(service.current_user_id().await.unwrap(), "me");
        assert_eq!(service.current_user_id().await.unwrap(), "me");
    }
}
