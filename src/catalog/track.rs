use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A catalog track. Shared as `Arc<Track>` once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub album_name: String,
    /// Declared length in seconds
    #[serde(default)]
    pub duration: u32,
    /// Primary stream URL
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub audio_download: Option<String>,
    #[serde(default)]
    pub download_allowed: bool,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Track {
    pub fn new(id: &str, name: &str, duration: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            artist_name: String::new(),
            album_name: String::new(),
            duration,
            audio: None,
            audio_download: None,
            download_allowed: false,
            short_url: None,
            image: None,
        }
    }

    pub fn with_audio(mut self, url: &str) -> Self {
        self.audio = Some(url.to_string());
        self
    }

    pub fn with_download(mut self, url: &str) -> Self {
        self.audio_download = Some(url.to_string());
        self
    }

    pub fn with_short_url(mut self, url: &str, download_allowed: bool) -> Self {
        self.short_url = Some(url.to_string());
        self.download_allowed = download_allowed;
        self
    }

    /// "Artist - Name", or just the name when the artist is unknown.
    pub fn display_title(&self) -> String {
        if self.artist_name.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.artist_name, self.name)
        }
    }
}

/// Track as the Jamendo API (or the backend proxy) sends it.
///
/// Ids and durations arrive as either numbers or strings, booleans
/// sometimes as 0/1, and absent URLs as empty strings.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTrack {
    #[serde(deserialize_with = "loose_string")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: String,
    #[serde(default, deserialize_with = "loose_u32")]
    duration: u32,
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    audiodownload: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    audiodownload_allowed: bool,
    #[serde(default)]
    shorturl: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Self {
            id: raw.id,
            name: raw.name,
            artist_name: raw.artist_name,
            album_name: raw.album_name,
            duration: raw.duration,
            audio: non_empty(raw.audio),
            audio_download: non_empty(raw.audiodownload),
            download_allowed: raw.audiodownload_allowed,
            short_url: non_empty(raw.shorturl),
            image: non_empty(raw.image),
        }
    }
}

fn loose_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected id, got {}", other))),
    }
}

fn loose_u32<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u32).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.max(0.0) as u32).unwrap_or(0),
        _ => 0,
    })
}

fn loose_bool<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}
