use crate::library::track::{AudioFeatures, Track};
use crate::ports::spotify::{ApiAlbum, ApiTrack};

pub fn track(id: &str, bpm: Option<f64>) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {}", id),
        duration_ms: 200_000,
        explicit: false,
        track_number: 1,
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        playlist: None,
        bpm,
        features: None,
    }
}

pub fn features(energy: f64, danceability: f64, loudness: f64) -> AudioFeatures {
    AudioFeatures {
        tempo: None,
        energy: Some(energy),
        danceability: Some(danceability),
        loudness: Some(loudness),
        extra: Default::default(),
    }
}

pub fn tempo_features(tempo: f64) -> AudioFeatures {
    AudioFeatures {
        tempo: Some(tempo),
        ..features(0.8, 0.7, -6.0)
    }
}

pub fn api_track(id: Option<&str>, number: u32) -> ApiTrack {
    ApiTrack {
        id: id.map(str::to_string),
        name: format!("Song {}", number),
        duration_ms: 180_000,
        explicit: false,
        track_number: number,
        artist: Some("Track Artist".to_string()),
        album_name: Some("Track Album".to_string()),
    }
}

pub fn api_album(id: &str, total_tracks: u32, tracks: Vec<ApiTrack>) -> ApiAlbum {
    ApiAlbum {
        id: id.to_string(),
        name: format!("Album {}", id),
        artist: "Album Artist".to_string(),
        total_tracks,
        tracks,
    }
}
