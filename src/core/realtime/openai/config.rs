//! Connection defaults for the OpenAI Realtime API.

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Sample rate of the PCM16 audio exchanged with the API.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Model requested when none is configured. Configured names pass through unchanged.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Wire name of the only audio format the gateway speaks in both directions.
pub const PCM16_AUDIO_FORMAT: &str = "pcm16";

/// Voice used when the configured one is not offered by the API.
pub const DEFAULT_REALTIME_VOICE: &str = "alloy";

const REALTIME_VOICES: [&str; 8] = [
    "alloy", "ash", "ballad", "coral", "echo", "sage", "shimmer", "verse",
];

/// Returns the canonical voice name for `name`, ignoring case and
/// surrounding whitespace, or [`DEFAULT_REALTIME_VOICE`] when unknown.
pub fn realtime_voice_or_default(name: &str) -> &'static str {
    let wanted = name.trim();
    REALTIME_VOICES
        .iter()
        .copied()
        .find(|voice| voice.eq_ignore_ascii_case(wanted))
        .unwrap_or(DEFAULT_REALTIME_VOICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_voice_is_normalized() {
        assert_eq!(realtime_voice_or_default("Shimmer"), "shimmer");
        assert_eq!(realtime_voice_or_default(" verse "), "verse");
    }

    #[test]
    fn test_unknown_voice_falls_back() {
        assert_eq!(realtime_voice_or_default("robot"), DEFAULT_REALTIME_VOICE);
        assert_eq!(realtime_voice_or_default(""), DEFAULT_REALTIME_VOICE);
    }
}
