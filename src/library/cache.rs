use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::library::track::{Track, parse_tracks};

/// The two kinds of track containers that get their own cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Album,
    Playlist,
}

impl ContainerKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ContainerKind::Album => "album",
            ContainerKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to read cache directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read cache file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize tracks for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One JSON file per container, named by the container's remote id.
///
/// ```text
/// <root>/album/<album id>
/// <root>/playlist/<playlist id>
/// ```
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ContainerKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Read every cached container of `kind`, ordered by container id.
    ///
    /// A missing directory is an empty cache. Dot-files are leftovers from
    /// interrupted writes and are ignored.
    pub fn load_all(&self, kind: ContainerKind) -> Result<Vec<(String, Vec<Track>)>, CacheError> {
        let dir = self.dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| CacheError::ReadDir {
            path: dir.clone(),
            source,
        })?;

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::ReadDir {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if id.starts_with('.') {
                continue;
            }
            let id = id.to_string();

            let contents = std::fs::read_to_string(&path).map_err(|source| {
                CacheError::ReadFile {
                    path: path.clone(),
                    source,
                }
            })?;
            let tracks = parse_tracks(&contents)
                .map_err(|source| CacheError::Parse { path, source })?;

            containers.push((id, tracks));
        }

        containers.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(containers)
    }

    /// Write a container's tracks. The file is replaced in one rename, so readers
    /// never see a partial document.
    pub fn save(&self, kind: ContainerKind, id: &str, tracks: &[Track]) -> Result<(), CacheError> {
        let dir = self.dir(kind);
        let path = dir.join(id);

        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Write {
            path: dir.clone(),
            source,
        })?;

        let json = serde_json::to_vec_pretty(tracks).map_err(|source| CacheError::Serialize {
            path: path.clone(),
            source,
        })?;

        let mut file = NamedTempFile::new_in(&dir).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        file.write_all(&json)
            .and_then(|_| file.flush())
            .map_err(|source| CacheError::Write {
                path: path.clone(),
                source,
            })?;
        file.persist(&path).map_err(|error| CacheError::Write {
            path: path.clone(),
            source: error.error,
        })?;

        tracing::debug!("Wrote {} tracks to {}", tracks.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::track;

    #[test]
    fn test_load_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("does-not-exist"));

        assert!(cache.load_all(ContainerKind::Album).unwrap().is_empty());
        assert!(cache.load_all(ContainerKind::Playlist).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        let tracks = vec![track("t1", Some(170.0)), track("t2", None)];
        cache.save(ContainerKind::Album, "album1", &tracks).unwrap();

        assert!(dir.path().join("album").join("album1").is_file());

        let loaded = cache.load_all(ContainerKind::Album).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "album1");
        assert_eq!(loaded[0].1, tracks);

        // Kinds are kept apart
        assert!(cache.load_all(ContainerKind::Playlist).unwrap().is_empty());
    }

    #[test]
    fn test_save_overwrites_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        cache
            .save(ContainerKind::Playlist, "pl1", &[track("t1", Some(100.0))])
            .unwrap();
        cache
            .save(ContainerKind::Playlist, "pl1", &[track("t2", Some(120.0))])
            .unwrap();

        let loaded = cache.load_all(ContainerKind::Playlist).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1[0].id, "t2");

        let files = std::fs::read_dir(dir.path().join("playlist")).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_load_ignores_dot_files_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        cache.save(ContainerKind::Album, "b", &[]).unwrap();
        cache.save(ContainerKind::Album, "a", &[]).unwrap();
        std::fs::write(dir.path().join("album").join(".tmpXYZ"), "garbage").unwrap();

        let ids: Vec<String> = cache
            .load_all(ContainerKind::Album)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_load_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        std::fs::create_dir_all(dir.path().join("album")).unwrap();
        std::fs::write(dir.path().join("album").join("broken"), "{not json").unwrap();

        let error = cache.load_all(ContainerKind::Album).unwrap_err();
        assert!(matches!(error, CacheError::Parse { .. }));
        assert!(error.to_string().contains("broken"));
    }

    #[test]
    fn test_load_legacy_file_with_nan_bpm() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        std::fs::create_dir_all(dir.path().join("album")).unwrap();
        std::fs::write(
            dir.path().join("album").join("al1"),
            r#"[
  {"id": "t1", "name": "Unanalysed", "duration_ms": 200000, "explicit": false, "bpm": NaN, "features": [null],
   "track_number": 1, "artist": "A", "album": "B"}
]"#,
        )
        .unwrap();

        let loaded = cache.load_all(ContainerKind::Album).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1[0].id, "t1");
        assert!(loaded[0].1[0].bpm.is_none());
    }
}
