//! Speech synthesis: provider contract, Google Cloud TTS client, retry policy and the
//! per-segment synthesizer.

pub mod google;
pub mod provider;
pub mod retry;
pub mod synth;
pub mod voices;

pub use provider::{AudioEncoding, ProviderError, SpeechProvider, SpeechRequest};
pub use retry::{Backoff, RetryError, RetryPolicy, Sleep, ThreadSleep};
pub use synth::{SpeechSynthesizer, SynthesizedAudio};
pub use voices::{Voice, VoiceGender};
