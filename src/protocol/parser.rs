//! Frame parsing
//!
//! Decodes the colon-delimited text grammar into [`Frame`] values. The first
//! colon ends the tag; for `CHAT` the second colon ends the username and the
//! remainder is the message, which may itself contain colons.

use crate::error::FrameError;
use crate::protocol::Frame;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Parses one raw frame received from a client.
///
/// Never fails: anything that does not match the grammar comes back as
/// [`Frame::Malformed`] with the reason attached.
pub fn parse_frame(raw: &str) -> Frame {
    let trimmed = raw.trim_end_matches(LINE_ENDINGS);
    if trimmed.is_empty() {
        return Frame::Malformed(FrameError::Empty);
    }

    let (tag, rest) = match trimmed.split_once(':') {
        Some((tag, rest)) => (tag, rest),
        None if is_known_tag(trimmed) => {
            return Frame::Malformed(FrameError::MissingField("payload"));
        }
        None => return Frame::Malformed(FrameError::UnknownTag(trimmed.to_string())),
    };

    match tag {
        "REGISTER" if rest.is_empty() => Frame::Malformed(FrameError::EmptyUsername),
        "REGISTER" => Frame::Register {
            username: rest.to_string(),
        },
        "STATUS" => Frame::Status {
            text: rest.to_string(),
        },
        "CHAT" => match rest.split_once(':') {
            Some(("", _)) => Frame::Malformed(FrameError::EmptyUsername),
            Some((username, message)) => Frame::Chat {
                username: username.to_string(),
                message: message.to_string(),
            },
            None => Frame::Malformed(FrameError::MissingField("message")),
        },
        "ASCII" if rest.is_empty() => Frame::Malformed(FrameError::MissingField("payload")),
        "ASCII" => Frame::Ascii {
            payload: rest.to_string(),
        },
        other => Frame::Malformed(FrameError::UnknownTag(other.to_string())),
    }
}

/// Checks a username chosen at registration.
///
/// Usernames are display labels embedded in `STATUS:<username>:<text>`, so
/// they may not contain the delimiter or control characters.
pub fn validate_username(username: &str, max_length: usize) -> Result<(), FrameError> {
    if username.trim().is_empty() {
        return Err(FrameError::EmptyUsername);
    }
    if username.len() > max_length {
        return Err(FrameError::UsernameTooLong {
            length: username.len(),
            max: max_length,
        });
    }
    if username.contains(':') || username.chars().any(char::is_control) {
        return Err(FrameError::InvalidUsername(username.to_string()));
    }
    Ok(())
}

fn is_known_tag(tag: &str) -> bool {
    matches!(tag, "REGISTER" | "STATUS" | "CHAT" | "ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register() {
        assert_eq!(
            parse_frame("REGISTER:alice"),
            Frame::Register {
                username: "alice".into()
            }
        );
    }

    #[test]
    fn status_keeps_colons_in_text() {
        assert_eq!(
            parse_frame("STATUS:back at 10:30\r\n"),
            Frame::Status {
                text: "back at 10:30".into()
            }
        );
    }

    #[test]
    fn chat_splits_on_first_two_colons_only() {
        assert_eq!(
            parse_frame("CHAT:alice:see http://example.com"),
            Frame::Chat {
                username: "alice".into(),
                message: "see http://example.com".into()
            }
        );
    }

    #[test]
    fn ascii_payload_is_opaque() {
        assert_eq!(
            parse_frame("ASCII: _ :_ "),
            Frame::Ascii {
                payload: " _ :_ ".into()
            }
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            parse_frame("GARBAGE"),
            Frame::Malformed(FrameError::UnknownTag("GARBAGE".into()))
        );
        assert_eq!(
            parse_frame("HELLO:world"),
            Frame::Malformed(FrameError::UnknownTag("HELLO".into()))
        );
    }

    #[test]
    fn tags_are_case_sensitive() {
        assert!(matches!(parse_frame("chat:a:b"), Frame::Malformed(_)));
    }

    #[test]
    fn missing_delimiters_are_malformed() {
        assert_eq!(
            parse_frame("CHAT:alice"),
            Frame::Malformed(FrameError::MissingField("message"))
        );
        assert_eq!(
            parse_frame("REGISTER"),
            Frame::Malformed(FrameError::MissingField("payload"))
        );
        assert_eq!(
            parse_frame("REGISTER:"),
            Frame::Malformed(FrameError::EmptyUsername)
        );
        assert_eq!(
            parse_frame("ASCII:"),
            Frame::Malformed(FrameError::MissingField("payload"))
        );
        assert_eq!(parse_frame("\r\n"), Frame::Malformed(FrameError::Empty));
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("alice", 16).is_ok());
        assert_eq!(validate_username("  ", 16), Err(FrameError::EmptyUsername));
        assert!(matches!(
            validate_username("a:b", 16),
            Err(FrameError::InvalidUsername(_))
        ));
        assert!(matches!(
            validate_username("tab\there", 16),
            Err(FrameError::InvalidUsername(_))
        ));
        assert_eq!(
            validate_username("abcdef", 4),
            Err(FrameError::UsernameTooLong { length: 6, max: 4 })
        );
    }
}
