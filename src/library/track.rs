use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};

/// Audio analysis attached to a track.
///
/// The four values the filter looks at are exposed directly; anything else the
/// feature endpoint returned is kept in `extra` so the cache holds the raw payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An enriched track as stored in the disk cache and the track table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    pub explicit: bool,
    pub track_number: u32,
    pub artist: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    /// `None` when the feature lookup returned nothing.
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_features")]
    pub features: Option<AudioFeatures>,
}

impl Track {
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }
}

/// Older cache files stored the feature endpoint's list response verbatim.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeaturesRepr {
    Single(AudioFeatures),
    List(Vec<Option<AudioFeatures>>),
}

fn deserialize_features<'de, D>(deserializer: D) -> Result<Option<AudioFeatures>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<FeaturesRepr>::deserialize(deserializer)?;
    Ok(match repr {
        Some(FeaturesRepr::Single(features)) => Some(features),
        Some(FeaturesRepr::List(list)) => list.into_iter().next().flatten(),
        None => None,
    })
}

const NON_FINITE_TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

/// Older cache files spell an unknown tempo as a bare `NaN`, which is not JSON.
/// Rewrite such tokens outside string literals to `null`.
fn replace_non_finite(contents: &str) -> Cow<'_, str> {
    if !contents.contains("NaN") && !contents.contains("Infinity") {
        return Cow::Borrowed(contents);
    }

    let mut out = String::with_capacity(contents.len());
    let mut rest = contents;
    let mut in_string = false;
    let mut escaped = false;
    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = NON_FINITE_TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(out)
}

/// Parse the contents of one container cache file.
pub fn parse_tracks(contents: &str) -> serde_json::Result<Vec<Track>> {
    serde_json::from_str(&replace_non_finite(contents))
}
