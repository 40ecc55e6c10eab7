use crate::speech::voices::Voice;

/// Audio container requested from the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AudioEncoding {
    #[default]
    Mp3,
    OggOpus,
    Linear16,
}

impl AudioEncoding {
    /// Provider-side enum name.
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::OggOpus => "OGG_OPUS",
            Self::Linear16 => "LINEAR16",
        }
    }

    /// File extension for persisted audio.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggOpus => "ogg",
            Self::Linear16 => "wav",
        }
    }
}

/// One synthesis request: a segment's text in one voice.
#[derive(Clone, Copy, Debug)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub voice: Voice,
    pub encoding: AudioEncoding,
}

/// Provider failure, split by whether retrying can help.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider asked us to slow down (HTTP 429 / quota exhausted).
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The provider rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The request never produced a usable response.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// External text-to-speech provider.
///
/// Implementations are synchronous; the synthesizer calls them from a bounded worker pool.
pub trait SpeechProvider: Send + Sync {
    /// Synthesize `request.text` and return the encoded audio bytes.
    fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>, ProviderError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
