//! Module `frames`
//!
//! Defines the frames exchanged with clients: the decoded inbound variants
//! and the notifications the relay sends back out.

use crate::error::FrameError;

/// Terminator appended to every frame written on the reliable channel.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// A frame received from a client, decoded from its `TAG:fields` text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Register { username: String },
    Status { text: String },
    Chat { username: String, message: String },
    Ascii { payload: String },
    Malformed(FrameError),
}

impl Frame {
    /// Wire tag of the frame, used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Frame::Register { .. } => "REGISTER",
            Frame::Status { .. } => "STATUS",
            Frame::Chat { .. } => "CHAT",
            Frame::Ascii { .. } => "ASCII",
            Frame::Malformed(_) => "MALFORMED",
        }
    }
}

/// A notification fanned out by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Status { username: String, text: String },
    Chat { username: String, message: String },
    /// Opaque payload relayed verbatim, without a tag.
    Raw(String),
}

impl OutboundFrame {
    /// Text form of the frame, without any terminator.
    pub fn encode(&self) -> String {
        match self {
            OutboundFrame::Status { username, text } => format!("STATUS:{}:{}", username, text),
            OutboundFrame::Chat { username, message } => format!("CHAT:{}:{}", username, message),
            OutboundFrame::Raw(payload) => payload.clone(),
        }
    }

    /// Bytes for a single datagram; datagrams are self-delimiting.
    pub fn to_datagram(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// Bytes for the reliable channel, terminator included.
    pub fn to_stream_frame(&self) -> Vec<u8> {
        let mut bytes = self.encode().into_bytes();
        bytes.push(FRAME_TERMINATOR);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_notification_carries_username() {
        let frame = OutboundFrame::Status {
            username: "alice".into(),
            text: "away".into(),
        };
        assert_eq!(frame.encode(), "STATUS:alice:away");
        assert_eq!(frame.to_datagram(), b"STATUS:alice:away".to_vec());
    }

    #[test]
    fn stream_frames_are_newline_terminated() {
        let frame = OutboundFrame::Chat {
            username: "alice".into(),
            message: "hi: there".into(),
        };
        assert_eq!(frame.to_stream_frame(), b"CHAT:alice:hi: there\n".to_vec());
    }

    #[test]
    fn raw_payload_is_not_rewrapped() {
        let frame = OutboundFrame::Raw("  /\\_/\\ ".into());
        assert_eq!(frame.encode(), "  /\\_/\\ ");
    }
}
