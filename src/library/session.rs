use std::collections::HashMap;

use crate::library::cache::ContainerKind;
use crate::library::track::Track;

/// In-memory state of one run: the per-container caches and the global track
/// table built from them.
#[derive(Debug, Default)]
pub struct LibrarySession {
    albums: HashMap<String, Vec<Track>>,
    playlists: HashMap<String, Vec<Track>>,
    tracks: HashMap<String, Track>,
}

impl LibrarySession {
    pub fn new() -> Self {
        Self::default()
    }

    fn containers(&self, kind: ContainerKind) -> &HashMap<String, Vec<Track>> {
        match kind {
            ContainerKind::Album => &self.albums,
            ContainerKind::Playlist => &self.playlists,
        }
    }

    pub fn container(&self, kind: ContainerKind, id: &str) -> Option<&[Track]> {
        self.containers(kind).get(id).map(Vec::as_slice)
    }

    pub fn container_count(&self, kind: ContainerKind) -> usize {
        self.containers(kind).len()
    }

    /// Store a container and union its tracks into the track table.
    /// A track id seen before is overwritten by the newer record.
    pub fn insert_container(&mut self, kind: ContainerKind, id: String, tracks: Vec<Track>) {
        self.merge_tracks(&tracks);
        match kind {
            ContainerKind::Album => self.albums.insert(id, tracks),
            ContainerKind::Playlist => self.playlists.insert(id, tracks),
        };
    }

    pub fn merge_tracks(&mut self, tracks: &[Track]) {
        for track in tracks {
            self.tracks.insert(track.id.clone(), track.clone());
        }
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Every track in the table, ordered by artist, album, track number and name
    /// so reports and exports are stable between runs.
    pub fn tracks(&self) -> Vec<&Track> {
        let mut tracks: Vec<&Track> = self.tracks.values().collect();
        tracks.sort_by(|a, b| {
            (&a.artist, &a.album, a.track_number, &a.name, &a.id).cmp(&(
                &b.artist,
                &b.album,
                b.track_number,
                &b.name,
                &b.id,
            ))
        });
        tracks
    }
}
