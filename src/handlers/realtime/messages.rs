//! Realtime WebSocket message types
//!
//! Client frames are JSON text objects tagged by `type`. Server frames are
//! produced by the bridge serializer and queued as [`OutboundFrame`]s.
//!
//! [`OutboundFrame`]: crate::core::bridge::OutboundFrame

use serde::Deserialize;

/// Incoming WebSocket messages from the browser client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One frame of PCM16 microphone audio
    Audio {
        /// Signed 16-bit samples
        data: Vec<i16>,
    },

    /// Any other message type; ignored
    #[serde(other)]
    Other,
}

impl ClientMessage {
    /// Parse a text frame. Samples outside the i16 range fail the parse.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_audio() {
        let msg = ClientMessage::parse(r#"{"type":"audio","data":[0,1,-1,32767,-32768]}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Audio {
                data: vec![0, 1, -1, 32767, -32768]
            }
        );
    }

    #[test]
    fn test_other_types_are_ignored() {
        let msg = ClientMessage::parse(r#"{"type":"text","text":"hello"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Other);
    }

    #[test]
    fn test_out_of_range_sample_is_rejected() {
        assert!(ClientMessage::parse(r#"{"type":"audio","data":[40000]}"#).is_err());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(ClientMessage::parse("not json").is_err());
        assert!(ClientMessage::parse(r#"{"data":[1]}"#).is_err());
    }
}
