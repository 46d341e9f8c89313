//! Relay wire protocol
//!
//! Frame grammar, frame decoding, and newline framing for the reliable channel.

pub mod frames;
pub mod framing;
pub mod parser;

pub use frames::{Frame, OutboundFrame};
pub use framing::FrameReader;
pub use parser::{parse_frame, validate_username};
