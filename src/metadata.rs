//! yt-dlp JSON records and format selection

use crate::error::Result;
use crate::types::{EntryKind, ParsedEntry};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Extension used when neither the chosen format nor the record names one
pub const DEFAULT_EXTENSION: &str = "mp4";

/// The subset of a yt-dlp info record the pipeline reads
///
/// Every field is optional so that flat-playlist entries, full `-j` dumps and
/// whatever extractors emit all decode into the same shape.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    /// Video ID (some extractors report numbers)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// `"video"`, `"playlist"`, `"url"`, ...
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    /// Video title
    pub title: Option<String>,
    /// Canonical page URL
    pub webpage_url: Option<String>,
    /// URL as submitted to yt-dlp
    pub original_url: Option<String>,
    /// Page URL in flat-playlist entries, direct media URL in full records
    pub url: Option<String>,
    /// Extension of the default format
    pub ext: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Available formats
    #[serde(deserialize_with = "null_as_empty")]
    pub formats: Vec<FormatInfo>,
    /// Playlist marker (name or ID) set for playlist members
    pub playlist: Option<Value>,
    /// Playlist title
    pub playlist_title: Option<String>,
    /// 1-based position within the playlist
    #[serde(deserialize_with = "lenient_u32")]
    pub playlist_index: Option<u32>,
    /// Number of playlist members
    #[serde(deserialize_with = "lenient_u32")]
    pub playlist_count: Option<u32>,
}

/// One entry of a record's `formats` array
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormatInfo {
    /// Format ID passed to `-f`
    #[serde(deserialize_with = "string_or_number")]
    pub format_id: String,
    /// Container extension
    pub ext: Option<String>,
    /// Video codec (`"none"` for audio-only formats)
    pub vcodec: Option<String>,
    /// Audio codec (`"none"` for video-only formats)
    pub acodec: Option<String>,
    /// Frame width in pixels
    #[serde(deserialize_with = "lenient_u32")]
    pub width: Option<u32>,
    /// Frame height in pixels
    #[serde(deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
}

impl FormatInfo {
    fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(codec) if !codec.is_empty() && codec != "none")
    }
}

/// Format ID and extension chosen for a record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatChoice {
    /// Empty when no video format qualified
    pub format_id: String,
    /// Never empty
    pub extension: String,
}

impl VideoInfo {
    /// Decode one JSON object
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Page URL for the resolve and download steps
    pub fn page_url(&self) -> Option<&str> {
        [&self.webpage_url, &self.original_url, &self.url]
            .into_iter()
            .filter_map(|u| u.as_deref())
            .find(|u| !u.is_empty())
    }

    /// Whether the record carries a playlist marker
    ///
    /// A present-but-null `playlist` or `playlist_index` does not count.
    pub fn is_playlist_member(&self) -> bool {
        matches!(&self.playlist, Some(v) if !v.is_null()) || self.playlist_index.is_some()
    }

    /// Pick the download format for this record
    pub fn choose_format(&self) -> FormatChoice {
        let record_ext = self
            .ext
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EXTENSION);

        match select_best_format(&self.formats) {
            Some(best) => FormatChoice {
                format_id: best.format_id.clone(),
                extension: best
                    .ext
                    .as_deref()
                    .filter(|e| !e.is_empty())
                    .unwrap_or(record_ext)
                    .to_string(),
            },
            None => FormatChoice {
                format_id: String::new(),
                extension: record_ext.to_string(),
            },
        }
    }

    /// Turn the record into a parsed entry; records without an ID yield `None`
    pub fn into_entry(self) -> Option<ParsedEntry> {
        if self.id.is_empty() {
            return None;
        }

        let choice = self.choose_format();
        let (kind, sequence_index, total_count) = if self.is_playlist_member() {
            (
                EntryKind::PlaylistMember,
                self.playlist_index.unwrap_or(1),
                self.playlist_count.unwrap_or(1),
            )
        } else {
            (EntryKind::Single, 1, 1)
        };
        let source_url = self.page_url().unwrap_or_default().to_string();

        Some(ParsedEntry {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            source_url,
            sequence_index,
            total_count,
            kind,
            format_hint: choice.format_id,
            extension_hint: choice.extension,
            playlist_title: self.playlist_title,
            duration_secs: self.duration,
            thumbnail: self.thumbnail,
        })
    }
}

/// Highest video format with a known height; the first one wins ties
pub fn select_best_format(formats: &[FormatInfo]) -> Option<&FormatInfo> {
    let mut best: Option<&FormatInfo> = None;
    for format in formats {
        if format.format_id.is_empty() || !format.has_video() {
            continue;
        }
        let height = format.height.unwrap_or(0);
        if height == 0 {
            continue;
        }
        if best.is_none_or(|b| height > b.height.unwrap_or(0)) {
            best = Some(format);
        }
    }
    best
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(value: Value) -> VideoInfo {
        VideoInfo::from_value(value).unwrap()
    }

    #[test]
    fn picks_tallest_video_format() {
        let record = info(json!({
            "id": "abc",
            "ext": "webm",
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"},
                {"format_id": "136", "ext": "mp4", "vcodec": "avc1", "height": 720},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1", "height": 1080},
                {"format_id": "248", "ext": "webm", "vcodec": "vp9", "height": 1080},
            ]
        }));

        let choice = record.choose_format();
        assert_eq!(choice.format_id, "137", "first 1080p format should win the tie");
        assert_eq!(choice.extension, "mp4");
    }

    #[test]
    fn audio_only_and_heightless_formats_never_win() {
        let formats: Vec<FormatInfo> = serde_json::from_value(json!([
            {"format_id": "140", "vcodec": "none", "height": 1080},
            {"format_id": "sb0", "vcodec": "", "height": 90},
            {"format_id": "hls", "vcodec": "avc1"},
            {"format_id": "zero", "vcodec": "avc1", "height": 0},
        ]))
        .unwrap();

        assert!(select_best_format(&formats).is_none());
    }

    #[test]
    fn no_video_format_falls_back_to_record_extension() {
        let record = info(json!({"id": "a", "ext": "webm", "formats": []}));
        assert_eq!(
            record.choose_format(),
            FormatChoice {
                format_id: String::new(),
                extension: "webm".into()
            }
        );

        let bare = info(json!({"id": "a", "ext": ""}));
        assert_eq!(bare.choose_format().extension, "mp4");
    }

    #[test]
    fn playlist_member_carries_index_and_count() {
        let entry = info(json!({
            "id": "v2",
            "title": "Second",
            "webpage_url": "https://videos.example.com/watch/v2",
            "playlist": "Mixtape",
            "playlist_title": "Mixtape",
            "playlist_index": 2,
            "playlist_count": 3,
        }))
        .into_entry()
        .unwrap();

        assert_eq!(entry.kind, EntryKind::PlaylistMember);
        assert_eq!(entry.sequence_index, 2);
        assert_eq!(entry.total_count, 3);
        assert_eq!(entry.playlist_title.as_deref(), Some("Mixtape"));
        assert_eq!(entry.source_url, "https://videos.example.com/watch/v2");
    }

    #[test]
    fn null_playlist_markers_mean_single_video() {
        let entry = info(json!({
            "id": "solo",
            "title": "Solo",
            "playlist": null,
            "playlist_index": null,
        }))
        .into_entry()
        .unwrap();

        assert_eq!(entry.kind, EntryKind::Single);
        assert_eq!(entry.sequence_index, 1);
        assert_eq!(entry.total_count, 1);
    }

    #[test]
    fn record_without_id_is_dropped() {
        assert!(info(json!({"title": "nameless"})).into_entry().is_none());
        assert!(info(json!({"id": "", "title": "blank"})).into_entry().is_none());
    }

    #[test]
    fn tolerates_loose_field_types() {
        let record = info(json!({
            "id": 12345,
            "playlist_index": "4",
            "playlist_count": 10.0,
            "formats": null,
        }));

        assert_eq!(record.id, "12345");
        assert_eq!(record.playlist_index, Some(4));
        assert_eq!(record.playlist_count, Some(10));
        assert!(record.formats.is_empty());
    }

    #[test]
    fn title_defaults_to_id_and_url_prefers_page() {
        let entry = info(json!({
            "id": "x1",
            "url": "https://videos.example.com/watch/x1",
        }))
        .into_entry()
        .unwrap();

        assert_eq!(entry.title, "x1");
        assert_eq!(entry.source_url, "https://videos.example.com/watch/x1");

        let record = info(json!({
            "id": "x1",
            "webpage_url": "https://videos.example.com/watch/x1",
            "url": "https://cdn.example.com/media.mp4",
        }));
        assert_eq!(record.page_url(), Some("https://videos.example.com/watch/x1"));
    }
}
