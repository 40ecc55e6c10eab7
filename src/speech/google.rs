//! Google Cloud Text-to-Speech over its REST API.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::config::SpeechSettings;
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::speech::provider::{ProviderError, SpeechProvider, SpeechRequest};

/// Default REST endpoint for `text:synthesize`.
pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// How requests are authenticated.
#[derive(Clone)]
pub enum GoogleAuth {
    /// `?key=` query parameter.
    ApiKey(String),
    /// `Authorization: Bearer` OAuth access token.
    Bearer(String),
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Blocking Google Cloud TTS client.
#[derive(Debug, Clone)]
pub struct GoogleTtsProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    auth: GoogleAuth,
}

impl GoogleTtsProvider {
    pub fn new(
        endpoint: impl Into<String>,
        auth: GoogleAuth,
        timeout: Duration,
    ) -> NarrateResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NarrateError::validation(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            auth,
        })
    }

    /// Build a provider from config, reading credentials from the configured environment
    /// variables. An access token takes precedence over an API key.
    pub fn from_settings(settings: &SpeechSettings) -> NarrateResult<Self> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let auth = match (
            settings.access_token_env.as_deref().and_then(read),
            read(&settings.api_key_env),
        ) {
            (Some(token), _) => GoogleAuth::Bearer(token),
            (None, Some(key)) => GoogleAuth::ApiKey(key),
            (None, None) => {
                return Err(NarrateError::validation(format!(
                    "no speech credentials: set {} (API key){}",
                    settings.api_key_env,
                    settings
                        .access_token_env
                        .as_deref()
                        .map(|t| format!(" or {t} (access token)"))
                        .unwrap_or_default()
                )));
            }
        };
        let timeout = Duration::try_from_secs_f64(settings.request_timeout_secs).map_err(|e| {
            NarrateError::validation(format!("invalid speech request timeout: {e}"))
        })?;
        Self::new(settings.endpoint.clone(), auth, timeout)
    }
}

impl SpeechProvider for GoogleTtsProvider {
    fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>, ProviderError> {
        let body = SynthesizeBody {
            input: TextInput { text: request.text },
            voice: VoiceSelection {
                language_code: request.voice.language_code(),
                name: request.voice.name(),
                ssml_gender: request.voice.gender().as_str(),
            },
            audio_config: AudioConfig {
                audio_encoding: request.encoding.as_api_str(),
            },
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        req = match &self.auth {
            GoogleAuth::ApiKey(key) => req.query(&[("key", key.as_str())]),
            GoogleAuth::Bearer(token) => req.bearer_auth(token),
        };

        let resp = req
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }
        decode_audio_content(&text)
    }

    fn name(&self) -> &str {
        "google-tts"
    }
}

/// Map a non-success HTTP response onto the retryable / fatal split.
fn classify_failure(status: u16, body: &str) -> ProviderError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.message, env.error.status),
        Err(_) => (body.trim().chars().take(200).collect(), String::new()),
    };
    let detail = if message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {message}")
    };
    if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
        ProviderError::RateLimited(detail)
    } else {
        ProviderError::Rejected(detail)
    }
}

fn decode_audio_content(body: &str) -> Result<Vec<u8>, ProviderError> {
    let parsed: SynthesizeResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Transport(format!("invalid synthesize response: {e}")))?;
    let content = parsed
        .audio_content
        .ok_or_else(|| ProviderError::Rejected("response has no audioContent".to_string()))?;
    general_purpose::STANDARD
        .decode(content.as_bytes())
        .map_err(|e| ProviderError::Transport(format!("audioContent is not valid base64: {e}")))
}
