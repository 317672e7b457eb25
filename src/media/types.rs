use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resolved metadata for one source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCatalog {
    pub id: String,
    pub thumbnail: String,
    pub title: String,
    pub duration: Option<u64>,
    pub video: BTreeMap<String, MediaVariant>,
    pub audio: BTreeMap<String, MediaVariant>,
}

impl MediaCatalog {
    pub fn thumbnail_for(id: &str) -> String {
        format!("https://i.ytimg.com/vi/{}/0.jpg", id)
    }

    pub fn variant(&self, kind: MediaKind, quality: &str) -> Option<&MediaVariant> {
        match kind {
            MediaKind::Video => self.video.get(quality),
            MediaKind::Audio => self.audio.get(quality),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub quality: String,
    pub size_label: String,
    pub size_bytes: u64,
    pub ticket: ConversionTicket,
}

/// Opaque tokens a backend needs to turn a variant into a download link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ConversionTicket {
    Y2mate { vid: String, key: String },
    Yt5s(ConvertRequest),
}

impl ConversionTicket {
    pub fn backend(&self) -> BackendKind {
        match self {
            ConversionTicket::Y2mate { .. } => BackendKind::Y2mate,
            ConversionTicket::Yt5s(_) => BackendKind::Yt5s,
        }
    }
}

/// Everything the yt5s conversion-server selection endpoint asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub server: String,
    pub vid: String,
    pub format: MediaFormat,
    pub quality: String,
    pub token: String,
    pub expires: i64,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp4,
    Mp3,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Y2mate,
    Yt5s,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Y2mate => write!(f, "y2mate"),
            BackendKind::Yt5s => write!(f, "yt5s"),
        }
    }
}

/// Region hints accepted by y2mate's analyze endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Id,
    Es,
}

impl Locale {
    /// Unknown hints fall back to [`Locale::En`].
    pub fn from_hint(hint: &str) -> Self {
        match hint {
            "en" => Locale::En,
            "id" => Locale::Id,
            "es" => Locale::Es,
            _ => Locale::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Id => "id",
            Locale::Es => "es",
        }
    }
}

/// Direct download URL produced by a converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadLink(String);

impl DownloadLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Only the yt5s audio short-circuit can produce an empty link.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DownloadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
