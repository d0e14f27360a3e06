//! Capture filename conventions.
//!
//! * release identifier: `r` followed by 6–10 digits anywhere in the path
//! * explicit speed marker: 2–3 digits immediately followed by `rpm` in the file name
//! * tracks: `side.wav` becomes `side_1.wav`, `side_2.wav`, ...

use crate::error::{AudioError, AudioResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RELEASE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"r(\d{6,10})").expect("release id pattern"));
static SPEED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2,3})rpm").expect("speed marker pattern"));

/// Release identifier embedded in `path`, digits only
pub fn release_id(path: &Path) -> Option<String> {
    let text = path.to_string_lossy();
    RELEASE_ID
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Explicit recording speed marker in the file name, e.g. `45` for `side_a_45rpm.wav`
pub fn speed_marker(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    SPEED_MARKER
        .captures(&name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// True when the path names a WAV capture
pub fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Path of track `number` (1-indexed) split from `source`
pub fn track_path(source: &Path, number: usize) -> AudioResult<PathBuf> {
    if number == 0 {
        return Err(AudioError::Naming("Track numbers start at 1".to_string()));
    }
    if !is_wav(source) {
        return Err(AudioError::UnsupportedFormat(format!(
            "{} is not a .wav capture",
            source.display()
        )));
    }
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AudioError::Naming(format!("No file name in {}", source.display())))?;

    Ok(source.with_file_name(format!("{}_{}.wav", stem, number)))
}

/// Normalize a user supplied path: absolute, with `.` and `..` components resolved
pub fn normalize_path(path: &Path) -> AudioResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_id() {
        assert_eq!(
            release_id(Path::new("/rips/Artist - Album r12345678 side A.wav")),
            Some("12345678".to_string())
        );
        assert_eq!(release_id(Path::new("/rips/r123456/a.wav")), Some("123456".to_string()));
        assert_eq!(release_id(Path::new("/rips/r12345.wav")), None);
        assert_eq!(release_id(Path::new("/rips/album.wav")), None);
        // Longer digit runs are cut at ten digits
        assert_eq!(
            release_id(Path::new("r123456789012.wav")),
            Some("1234567890".to_string())
        );
    }

    #[test]
    fn test_speed_marker() {
        assert_eq!(speed_marker(Path::new("/r33rpm/side_45rpm.wav")), Some("45".to_string()));
        assert_eq!(speed_marker(Path::new("side_33rpm_r1234567.wav")), Some("33".to_string()));
        assert_eq!(speed_marker(Path::new("/rips/45rpm/side.wav")), None);
        assert_eq!(speed_marker(Path::new("side_5rpm.wav")), None);
    }

    #[test]
    fn test_track_path() {
        let source = Path::new("/rips/album r12345678.wav");
        assert_eq!(
            track_path(source, 1).unwrap(),
            PathBuf::from("/rips/album r12345678_1.wav")
        );
        assert_eq!(
            track_path(source, 12).unwrap(),
            PathBuf::from("/rips/album r12345678_12.wav")
        );
        assert!(track_path(source, 0).is_err());
        assert!(track_path(Path::new("/rips/album.flac"), 1).is_err());
    }

    #[test]
    fn test_normalize_path() {
        let path = normalize_path(Path::new("/rips/./a/../side.wav")).unwrap();
        assert_eq!(path, PathBuf::from("/rips/side.wav"));
        assert!(normalize_path(Path::new("side.wav")).unwrap().is_absolute());
    }
}
