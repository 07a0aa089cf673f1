// Resolving a source URI to readable media

use crate::config::EngineConfig;
use pitch_core::{PlaybackError, Result};
use pitch_transport_http::{fetch_to_memory, is_http_url, HttpClient, HttpSettings};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use symphonia::core::io::MediaSource;

/// Where a source URI points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

/// Classify `uri`. Site-absolute paths are rooted at `asset_root` when one is set.
pub fn locate(uri: &str, asset_root: Option<&Path>) -> SourceLocation {
    if is_http_url(uri) {
        return SourceLocation::Remote(uri.to_string());
    }

    let path = uri.strip_prefix("file://").unwrap_or(uri);
    // Query strings and fragments never name part of a file
    let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or(path);

    match (asset_root, path.strip_prefix('/')) {
        (Some(root), Some(relative)) if !uri.starts_with("file://") => {
            SourceLocation::Local(root.join(relative))
        }
        _ => SourceLocation::Local(PathBuf::from(path)),
    }
}

/// Open `uri` for probing. Remote sources are downloaded whole.
pub fn open_source(uri: &str, config: &EngineConfig, cancel: &AtomicBool) -> Result<Box<dyn MediaSource>> {
    match locate(uri, config.asset_root.as_deref()) {
        SourceLocation::Remote(url) => {
            let client = HttpClient::new(HttpSettings {
                max_retries: config.http_retries,
                ..HttpSettings::default()
            });
            let body = fetch_to_memory(&client, &url, cancel)?;
            Ok(Box::new(Cursor::new(body)))
        }
        SourceLocation::Local(path) => {
            log::info!("[engine] Opening local file: {}", path.display());
            let file = File::open(&path)
                .map_err(|e| PlaybackError::unavailable(uri, format!("{}: {}", path.display(), e)))?;
            Ok(Box::new(file))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitch_core::ErrorKind;

    #[test]
    fn test_locate_remote() {
        assert_eq!(
            locate("https://cdn.example.com/pitch.mp3", Some(Path::new("/srv"))),
            SourceLocation::Remote("https://cdn.example.com/pitch.mp3".to_string())
        );
    }

    #[test]
    fn test_locate_site_path_under_asset_root() {
        assert_eq!(
            locate("/elevator-pitch.mp3", Some(Path::new("/srv/public"))),
            SourceLocation::Local(PathBuf::from("/srv/public/elevator-pitch.mp3"))
        );
        assert_eq!(
            locate("/elevator-pitch.mp3?v=3", None),
            SourceLocation::Local(PathBuf::from("/elevator-pitch.mp3"))
        );
    }

    #[test]
    fn test_locate_file_url_ignores_asset_root() {
        assert_eq!(
            locate("file:///tmp/a.wav", Some(Path::new("/srv"))),
            SourceLocation::Local(PathBuf::from("/tmp/a.wav"))
        );
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default().with_asset_root(dir.path());
        let cancel = AtomicBool::new(false);
        let err = match open_source("/nope.mp3", &config, &cancel) {
            Ok(_) => panic!("missing file should not open"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    }
}
