//! Release metadata consumed read-only by the pipeline.
//!
//! Records from catalogue exports use many spellings for the same field. They are
//! mapped to [`CanonicalField`]s exactly once, when a record is ingested.

use crate::error::{AudioError, AudioResult};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// One entry of a release tracklist
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    /// Position on the release, e.g. `A1`
    pub position: String,
    /// Track title
    pub title: String,
    /// Track artist when it differs from the release artist
    pub artist: Option<String>,
}

/// Catalogue information for the record being digitized
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseMetadata {
    /// Release identifier
    pub release_id: String,
    /// Expected number of tracks, `None` when the catalogue does not know
    pub track_count: Option<usize>,
    /// Media description, e.g. `Vinyl, LP, 33 ⅓ RPM`
    pub media: String,
    /// Release artist
    pub artist: Option<String>,
    /// Release title
    pub title: Option<String>,
    /// Record label
    pub label: Option<String>,
    /// Tracklist, possibly empty
    pub tracks: Vec<TrackInfo>,
}

/// Field names understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    /// Release identifier
    ReleaseId,
    /// Expected track count
    TrackCount,
    /// Tracklist, or a bare count
    Tracks,
    /// Media description
    Media,
    /// Release artist
    Artist,
    /// Release title
    Title,
    /// Record label
    Label,
}

/// Map a legacy or alternate field name to its canonical field.
///
/// Case, spaces, `_` and `-` are ignored.
pub fn canonical_field(name: &str) -> Option<CanonicalField> {
    let key: String = name
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();

    match key.as_str() {
        "id" | "releaseid" | "discogsid" => Some(CanonicalField::ReleaseId),
        "trackcount" | "numtracks" | "tracktotal" | "totaltracks" => Some(CanonicalField::TrackCount),
        "tracks" | "tracklist" => Some(CanonicalField::Tracks),
        "media" | "medium" | "format" | "formats" | "mediaformat" => Some(CanonicalField::Media),
        "artist" | "artists" | "albumartist" => Some(CanonicalField::Artist),
        "title" | "album" | "releasetitle" => Some(CanonicalField::Title),
        "label" | "labels" | "publisher" => Some(CanonicalField::Label),
        _ => None,
    }
}

/// Flatten a JSON value into display text: strings and numbers joined with `, `
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .values()
            .map(flatten_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Bool(_) | Value::Null => String::new(),
    }
}

fn optional_text(value: &Value) -> Option<String> {
    Some(flatten_text(value)).filter(|s| !s.is_empty())
}

fn parse_count(value: &Value) -> AudioResult<Option<usize>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| AudioError::Metadata(format!("Invalid track count {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| AudioError::Metadata(format!("Invalid track count {:?}", s))),
        other => Err(AudioError::Metadata(format!("Invalid track count {}", other))),
    }
}

fn parse_track(index: usize, value: &Value) -> TrackInfo {
    let mut track = TrackInfo {
        position: (index + 1).to_string(),
        ..TrackInfo::default()
    };

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = key.to_lowercase();
                match key.as_str() {
                    "position" | "pos" | "number" | "tracknumber" => {
                        if let Some(text) = optional_text(value) {
                            track.position = text;
                        }
                    }
                    "title" | "name" => track.title = flatten_text(value),
                    "artist" | "artists" => track.artist = optional_text(value),
                    _ => {}
                }
            }
        }
        other => track.title = flatten_text(other),
    }
    track
}

impl ReleaseMetadata {
    /// Build metadata from a raw catalogue record, normalizing field names.
    ///
    /// `fallback_id` is used when the record carries no identifier of its own.
    pub fn from_record(fallback_id: &str, record: &Map<String, Value>) -> AudioResult<Self> {
        let mut release = ReleaseMetadata {
            release_id: fallback_id.to_string(),
            ..ReleaseMetadata::default()
        };
        let mut explicit_count = None;

        for (key, value) in record {
            let Some(field) = canonical_field(key) else {
                debug!("Ignoring release field {:?}", key);
                continue;
            };
            match field {
                CanonicalField::ReleaseId => {
                    if let Some(id) = optional_text(value) {
                        release.release_id = id;
                    }
                }
                CanonicalField::TrackCount => explicit_count = parse_count(value)?,
                CanonicalField::Tracks => match value {
                    Value::Array(items) => {
                        release.tracks = items
                            .iter()
                            .enumerate()
                            .map(|(i, v)| parse_track(i, v))
                            .collect();
                    }
                    other => explicit_count = parse_count(other)?,
                },
                CanonicalField::Media => release.media = flatten_text(value),
                CanonicalField::Artist => release.artist = optional_text(value),
                CanonicalField::Title => release.title = optional_text(value),
                CanonicalField::Label => release.label = optional_text(value),
            }
        }

        release.track_count = explicit_count.or_else(|| {
            (!release.tracks.is_empty()).then_some(release.tracks.len())
        });
        if release.release_id.is_empty() {
            return Err(AudioError::Metadata("Release record has no identifier".to_string()));
        }
        Ok(release)
    }

    /// Title of track `number` (1-indexed), if the tracklist has it
    pub fn track(&self, number: usize) -> Option<&TrackInfo> {
        number.checked_sub(1).and_then(|i| self.tracks.get(i))
    }
}

/// Source of release metadata
pub trait MetadataLookup {
    /// Fetch a release; `Ok(None)` when the release does not exist
    fn get_release(&self, release_id: &str) -> AudioResult<Option<ReleaseMetadata>>;
}

/// Releases loaded from a JSON export.
///
/// Accepts either an object keyed by release id or an array of records with an id field.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCatalog {
    releases: HashMap<String, ReleaseMetadata>,
}

impl ReleaseCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a release
    pub fn insert(&mut self, release: ReleaseMetadata) {
        self.releases.insert(release.release_id.clone(), release);
    }

    /// Number of releases
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// True when no releases are loaded
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Parse a JSON export
    pub fn from_json_str(json: &str) -> AudioResult<Self> {
        let mut catalog = ReleaseCatalog::new();
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => {
                for (id, record) in &map {
                    match record {
                        Value::Object(fields) => catalog.insert(ReleaseMetadata::from_record(id, fields)?),
                        _ => warn!("Skipping release {}: record is not an object", id),
                    }
                }
            }
            Value::Array(records) => {
                for record in &records {
                    match record {
                        Value::Object(fields) => catalog.insert(ReleaseMetadata::from_record("", fields)?),
                        _ => warn!("Skipping release entry that is not an object"),
                    }
                }
            }
            _ => {
                return Err(AudioError::Metadata(
                    "Release export must be a JSON object or array".to_string(),
                ))
            }
        }
        Ok(catalog)
    }

    /// Load a JSON export from disk
    pub fn load<P: AsRef<Path>>(path: P) -> AudioResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl MetadataLookup for ReleaseCatalog {
    fn get_release(&self, release_id: &str) -> AudioResult<Option<ReleaseMetadata>> {
        Ok(self.releases.get(release_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_canonical_field_aliases() {
        assert_eq!(canonical_field("num_tracks"), Some(CanonicalField::TrackCount));
        assert_eq!(canonical_field("NumTracks"), Some(CanonicalField::TrackCount));
        assert_eq!(canonical_field("track-count"), Some(CanonicalField::TrackCount));
        assert_eq!(canonical_field("Album Artist"), Some(CanonicalField::Artist));
        assert_eq!(canonical_field("media_format"), Some(CanonicalField::Media));
        assert_eq!(canonical_field("publisher"), Some(CanonicalField::Label));
        assert_eq!(canonical_field("discogs_id"), Some(CanonicalField::ReleaseId));
        assert_eq!(canonical_field("genre"), None);
    }

    #[test]
    fn test_from_record_with_alternate_names() {
        let release = ReleaseMetadata::from_record(
            "12345678",
            &record(json!({
                "NumTracks": "4",
                "Format": ["Vinyl", "LP", "33 ⅓ RPM"],
                "AlbumArtist": "Someone",
                "Publisher": "Label X",
            })),
        )
        .unwrap();

        assert_eq!(release.release_id, "12345678");
        assert_eq!(release.track_count, Some(4));
        assert_eq!(release.media, "Vinyl, LP, 33 ⅓ RPM");
        assert_eq!(release.artist.as_deref(), Some("Someone"));
        assert_eq!(release.label.as_deref(), Some("Label X"));
    }

    #[test]
    fn test_tracklist_implies_count() {
        let release = ReleaseMetadata::from_record(
            "1",
            &record(json!({
                "tracklist": [
                    {"position": "A1", "title": "First"},
                    {"name": "Second", "artist": "Guest"},
                ],
            })),
        )
        .unwrap();

        assert_eq!(release.track_count, Some(2));
        assert_eq!(release.track(1).unwrap().position, "A1");
        assert_eq!(release.track(2).unwrap().title, "Second");
        assert_eq!(release.track(2).unwrap().position, "2");
        assert_eq!(release.track(2).unwrap().artist.as_deref(), Some("Guest"));
        assert!(release.track(0).is_none());
    }

    #[test]
    fn test_unknown_track_count() {
        let release =
            ReleaseMetadata::from_record("1", &record(json!({"track_count": null}))).unwrap();
        assert_eq!(release.track_count, None);
    }

    #[test]
    fn test_bad_track_count() {
        let result = ReleaseMetadata::from_record("1", &record(json!({"tracks": "many"})));
        assert!(result.is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = ReleaseCatalog::from_json_str(
            r#"{"12345678": {"track_count": 4, "media": "Vinyl (33 1/3 RPM)"}}"#,
        )
        .unwrap();

        let release = catalog.get_release("12345678").unwrap().unwrap();
        assert_eq!(release.track_count, Some(4));
        assert!(catalog.get_release("999999").unwrap().is_none());
    }

    #[test]
    fn test_catalog_from_array() {
        let catalog =
            ReleaseCatalog::from_json_str(r#"[{"release_id": 7654321, "tracks": 3}]"#).unwrap();
        assert_eq!(catalog.len(), 1);
        let release = catalog.get_release("7654321").unwrap().unwrap();
        assert_eq!(release.track_count, Some(3));
    }

    #[test]
    fn test_catalog_rejects_scalar() {
        assert!(ReleaseCatalog::from_json_str("42").is_err());
    }
}
