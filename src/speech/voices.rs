use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::foundation::error::NarrateError;

/// SSML voice gender as understood by the speech provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceGender {
    Female,
    Male,
}

impl VoiceGender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "FEMALE",
            Self::Male => "MALE",
        }
    }
}

/// Supported voices and their genders.
pub const VOICES: &[(&str, VoiceGender)] = &[
    ("es-ES-Standard-A", VoiceGender::Female),
    ("es-ES-Standard-B", VoiceGender::Male),
    ("es-ES-Standard-C", VoiceGender::Female),
    ("es-ES-Standard-D", VoiceGender::Female),
    ("es-ES-Standard-E", VoiceGender::Female),
    ("es-ES-Standard-F", VoiceGender::Male),
    ("es-ES-Neural2-A", VoiceGender::Female),
    ("es-ES-Neural2-B", VoiceGender::Male),
    ("es-ES-Neural2-C", VoiceGender::Female),
    ("es-ES-Neural2-D", VoiceGender::Female),
    ("es-ES-Neural2-E", VoiceGender::Female),
    ("es-ES-Neural2-F", VoiceGender::Male),
    ("es-ES-Polyglot-1", VoiceGender::Male),
    ("es-ES-Studio-C", VoiceGender::Female),
    ("es-ES-Studio-F", VoiceGender::Male),
    ("es-ES-Wavenet-B", VoiceGender::Male),
    ("es-ES-Wavenet-C", VoiceGender::Female),
    ("es-ES-Wavenet-D", VoiceGender::Female),
    ("es-ES-Wavenet-E", VoiceGender::Male),
    ("es-ES-Wavenet-F", VoiceGender::Female),
];

/// A voice from [`VOICES`]. Can only be constructed from a supported name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Voice {
    name: &'static str,
    gender: VoiceGender,
}

impl Voice {
    pub fn name(self) -> &'static str {
        self.name
    }

    pub fn gender(self) -> VoiceGender {
        self.gender
    }

    /// BCP-47 language code, taken from the first two dash-separated parts of the name.
    pub fn language_code(self) -> &'static str {
        let mut dashes = self.name.match_indices('-').map(|(i, _)| i);
        let _ = dashes.next();
        match dashes.next() {
            Some(end) => &self.name[..end],
            None => self.name,
        }
    }

    /// Every supported voice in catalogue order.
    pub fn all() -> impl Iterator<Item = Voice> {
        VOICES.iter().map(|&(name, gender)| Voice { name, gender })
    }
}

impl Default for Voice {
    fn default() -> Self {
        let (name, gender) = VOICES[0];
        Self { name, gender }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Voice {
    type Err = NarrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Voice::all()
            .find(|v| v.name.eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                NarrateError::validation(format!(
                    "unsupported voice '{s}' (run `narrate voices` for the list)"
                ))
            })
    }
}

impl Serialize for Voice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

impl<'de> Deserialize<'de> for Voice {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
