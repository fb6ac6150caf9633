//! Records for the SoundCloud API payloads.
//!
//! The API is loosely typed: fields come and go and occasionally change type.
//! Every field here is optional and decoded leniently, so a missing or
//! malformed field reads as absent instead of failing the whole payload.

use serde::de::{DeserializeOwned, Deserializer, Error as _, Unexpected};
use serde::Deserialize;
use serde_json::Value;

/// Delivery protocol of a directly downloadable encoding
pub const PROGRESSIVE_PROTOCOL: &str = "progressive";

/// Track description returned by the resolve endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub policy: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub media: Option<Media>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<User>,
    #[serde(default, deserialize_with = "lenient")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub permalink_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub artwork_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Media {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub transcodings: Vec<Transcoding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
}

/// One available media encoding of a track
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcoding {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub format: Option<TranscodingFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscodingFormat {
    #[serde(default, deserialize_with = "lenient")]
    pub protocol: Option<String>,
}

/// Body returned when following a transcoding URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

impl CatalogEntry {
    /// Whether the track is blocked by its access policy
    pub fn is_blocked(&self) -> bool {
        self.policy
            .as_deref()
            .is_some_and(|policy| policy.eq_ignore_ascii_case("BLOCK"))
    }

    pub fn transcodings(&self) -> &[Transcoding] {
        self.media
            .as_ref()
            .map(|media| media.transcodings.as_slice())
            .unwrap_or_default()
    }

    /// URL of the first progressive encoding that has one
    pub fn progressive_url(&self) -> Option<&str> {
        self.transcodings()
            .iter()
            .filter(|transcoding| transcoding.is_progressive())
            .find_map(|transcoding| non_blank(transcoding.url.as_deref()))
    }

    pub fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    pub fn artist(&self) -> Option<&str> {
        non_blank(self.user.as_ref().and_then(|user| user.username.as_deref()))
    }
}

impl Transcoding {
    pub fn protocol(&self) -> Option<&str> {
        self.format.as_ref().and_then(|format| format.protocol.as_deref())
    }

    pub fn is_progressive(&self) -> bool {
        self.protocol() == Some(PROGRESSIVE_PROTOCOL)
    }
}

impl StreamPayload {
    pub fn stream_url(&self) -> Option<&str> {
        non_blank(self.url.as_deref())
    }
}

/// Decode a response body that must be a JSON object.
///
/// The records above would also accept an array, filling every field with
/// its default.
pub fn decode_object<T: DeserializeOwned>(body: &str) -> serde_json::Result<T> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(serde_json::Error::invalid_type(unexpected(&value), &"a JSON object"));
    }
    serde_json::from_value(value)
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Decode a field, treating values of the wrong shape as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decode a list, skipping elements of the wrong shape
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
