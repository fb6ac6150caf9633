use thiserror::Error;

/// Origin every accepted track URL must start with
pub const SOUNDCLOUD_ORIGIN: &str = "https://soundcloud.com/";

/// Reasons a track URL is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlValidationError {
    #[error("URL is required")]
    Missing,

    #[error("URL too long (max {max_len} characters)")]
    TooLong { max_len: usize },

    #[error("Invalid SoundCloud URL format")]
    WrongOrigin,

    #[error("Invalid SoundCloud track URL format")]
    NotATrack,
}

/// Check that `raw` looks like a SoundCloud track URL.
///
/// Accepts `https://soundcloud.com/<user>/<track>[/...]`. Length is counted
/// in bytes.
pub fn validate_soundcloud_url(raw: &str, max_len: usize) -> Result<(), UrlValidationError> {
    if raw.trim().is_empty() {
        return Err(UrlValidationError::Missing);
    }

    if raw.len() > max_len {
        return Err(UrlValidationError::TooLong { max_len });
    }

    if !raw.starts_with(SOUNDCLOUD_ORIGIN) {
        return Err(UrlValidationError::WrongOrigin);
    }

    // host, user and track
    let segments = raw["https://".len()..]
        .split('/')
        .filter(|segment| !segment.is_empty())
        .count();
    if segments < 3 {
        return Err(UrlValidationError::NotATrack);
    }

    Ok(())
}
