use std::io::Write;

use color_eyre::eyre::{Result, WrapErr};

use crate::library::track::Track;
use crate::ports::spotify::SpotifyClient;
use crate::spotify_rs::client::MAX_ITEMS_PER_ADD;

pub const ADD_TRACKS_BATCH_SIZE: usize = MAX_ITEMS_PER_ADD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub playlist_id: String,
    pub submitted: usize,
    pub batches: usize,
}

pub struct PlaylistExporter<'a, C: SpotifyClient> {
    client: &'a C,
}

impl<'a, C: SpotifyClient> PlaylistExporter<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Create a private playlist named `name` for `user_id` and add `tracks` to it.
    ///
    /// Batches are submitted in order and the first failing batch aborts the rest;
    /// batches already added stay in the playlist.
    pub async fn export(&self, user_id: &str, name: &str, tracks: &[&Track]) -> Result<ExportSummary> {
        tracing::info!("Creating playlist '{}' with {} tracks", name, tracks.len());
        for track in tracks {
            tracing::info!("{} by {} - {} BPM", track.name, track.artist, format_value(track.bpm));
        }

        let playlist_id = self
            .client
            .create_playlist(user_id, name, false)
            .await
            .wrap_err_with(|| format!("Failed to create playlist {}", name))?;

        let uris: Vec<String> = tracks
            .iter()
            .filter(|track| !track.id.is_empty())
            .map(|track| track.uri())
            .collect();

        let mut batches = 0;
        for batch in uris.chunks(ADD_TRACKS_BATCH_SIZE) {
            tracing::info!("Adding {} tracks to playlist {}", batch.len(), name);
            self.client
                .add_tracks_to_playlist(&playlist_id, batch.to_vec())
                .await
                .wrap_err_with(|| {
                    format!(
                        "Failed to add tracks to playlist {} after {} of {} tracks",
                        name,
                        batches * ADD_TRACKS_BATCH_SIZE,
                        uris.len()
                    )
                })?;
            batches += 1;
        }

        Ok(ExportSummary {
            playlist_id,
            submitted: uris.len(),
            batches,
        })
    }
}

/// Floats always carry a fractional part, so `165.0` is not printed as `165`.
fn format_value(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:?}"))
        .unwrap_or_else(|| "N/A".to_string())
}

pub const REPORT_HEADER: &str = "Name|Artist|Album|BPM|Energy|Danceability|Loudness";

/// Write `tracks` as a pipe-delimited table.
pub fn write_report<W: Write>(out: &mut W, tracks: &[&Track]) -> std::io::Result<()> {
    writeln!(out, "{}", REPORT_HEADER)?;
    for track in tracks {
        let features = track.features.as_ref();
        writeln!(
            out,
            "{}|{}|{}|{}|{}|{}|{}",
            track.name.replace('|', ""),
            track.artist,
            track.album,
            format_value(track.bpm),
            format_value(features.and_then(|f| f.energy)),
            format_value(features.and_then(|f| f.danceability)),
            format_value(features.and_then(|f| f.loudness)),
        )?;
    }
    Ok(())
}
