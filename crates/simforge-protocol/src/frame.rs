//! Frame grammar for the bridge channel.
//!
//! Every record on the channel is one line of text. The first character is
//! a kind tag; what follows depends on the kind:
//!
//! ```text
//! 1<session id>                          a client connected
//! 2<session id>                          a client disconnected
//! 0<session id:20><event name> <json>    an event for/from a session
//! ```
//!
//! Outbound frames always use the message tag, so anything produced by
//! [`encode_emit`] parses back through [`InboundFrame::parse`] on a peer.

use serde::Serialize;
use serde_json::Value;

use crate::{ProtocolError, SessionId};

/// Kind tag for an event message.
pub const TAG_MESSAGE: char = '0';
/// Kind tag announcing a new session.
pub const TAG_CONNECTED: char = '1';
/// Kind tag announcing that a session ended.
pub const TAG_DISCONNECTED: char = '2';

/// Fixed width of a session identifier inside a message frame.
pub const SESSION_ID_LEN: usize = 20;

/// A parsed inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// The edge accepted a new client connection.
    Connected(SessionId),

    /// The edge lost a client connection.
    Disconnected(SessionId),

    /// A client event. `args` is the payload normalized to an argument
    /// list: a JSON array becomes its elements, any other value becomes a
    /// one-element list, a missing payload becomes an empty list.
    Message {
        session: SessionId,
        event: String,
        args: Vec<Value>,
    },
}

impl InboundFrame {
    /// Parses one line (with or without its trailing `\r\n`).
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedFrame`]: empty line, unknown tag,
    ///   truncated session id or empty event name
    /// - [`ProtocolError::InvalidSessionId`]: session id is not 20 ASCII chars
    /// - [`ProtocolError::Decode`]: payload is not valid JSON
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut chars = line.chars();
        let tag = chars
            .next()
            .ok_or_else(|| ProtocolError::MalformedFrame("empty frame".into()))?;
        let rest = chars.as_str();

        match tag {
            TAG_CONNECTED => Ok(Self::Connected(SessionId::parse(rest)?)),
            TAG_DISCONNECTED => Ok(Self::Disconnected(SessionId::parse(rest)?)),
            TAG_MESSAGE => parse_message(rest),
            other => Err(ProtocolError::MalformedFrame(format!(
                "unknown frame kind {other:?}"
            ))),
        }
    }

    /// Renders the frame back into its wire form, including the CRLF
    /// terminator. Used by edge-side peers and tests.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        match self {
            Self::Connected(id) => Ok(format!("{TAG_CONNECTED}{id}\r\n")),
            Self::Disconnected(id) => Ok(format!("{TAG_DISCONNECTED}{id}\r\n")),
            Self::Message {
                session,
                event,
                args,
            } => encode_emit(session, event, args),
        }
    }
}

fn parse_message(rest: &str) -> Result<InboundFrame, ProtocolError> {
    if rest.len() < SESSION_ID_LEN || !rest.is_char_boundary(SESSION_ID_LEN) {
        return Err(ProtocolError::MalformedFrame(format!(
            "message too short for a session id: {rest:?}"
        )));
    }
    let (sid, tail) = rest.split_at(SESSION_ID_LEN);
    let session = SessionId::parse(sid)?;

    let (event, payload) = match tail.split_once(' ') {
        Some((event, payload)) => (event, Some(payload)),
        None => (tail, None),
    };
    if event.is_empty() {
        return Err(ProtocolError::MalformedFrame(
            "message without event name".into(),
        ));
    }

    let args = match payload.map(str::trim) {
        None | Some("") => Vec::new(),
        Some(json) => {
            into_args(serde_json::from_str(json).map_err(ProtocolError::Decode)?)
        }
    };

    Ok(InboundFrame::Message {
        session,
        event: event.to_string(),
        args,
    })
}

/// Normalizes a payload into an argument list.
pub fn into_args(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Serializes an outbound event for `session`:
/// `"0" + session + event + " " + json(data) + "\r\n"`.
///
/// # Errors
/// Returns [`ProtocolError::Encode`] if `data` cannot be serialized.
pub fn encode_emit<T: Serialize + ?Sized>(
    session: &SessionId,
    event: &str,
    data: &T,
) -> Result<String, ProtocolError> {
    let json = serde_json::to_string(data).map_err(ProtocolError::Encode)?;
    let mut frame =
        String::with_capacity(1 + SESSION_ID_LEN + event.len() + json.len() + 3);
    frame.push(TAG_MESSAGE);
    frame.push_str(session.as_str());
    frame.push_str(event);
    frame.push(' ');
    frame.push_str(&json);
    frame.push_str("\r\n");
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sid() -> SessionId {
        SessionId::parse("abcdefghij0123456789").unwrap()
    }

    #[test]
    fn test_parse_connected_returns_session() {
        let frame = InboundFrame::parse("1abcdefghij0123456789\n").unwrap();
        assert_eq!(frame, InboundFrame::Connected(sid()));
    }

    #[test]
    fn test_parse_disconnected_returns_session() {
        let frame = InboundFrame::parse("2abcdefghij0123456789\r\n").unwrap();
        assert_eq!(frame, InboundFrame::Disconnected(sid()));
    }

    #[test]
    fn test_parse_message_with_array_payload_spreads_args() {
        let frame =
            InboundFrame::parse(r#"0abcdefghij0123456789joinRoom ["ABC123","default"]"#)
                .unwrap();
        match frame {
            InboundFrame::Message {
                session,
                event,
                args,
            } => {
                assert_eq!(session, sid());
                assert_eq!(event, "joinRoom");
                assert_eq!(args, vec![json!("ABC123"), json!("default")]);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_parse_message_with_scalar_payload_wraps_single_arg() {
        let frame =
            InboundFrame::parse(r#"0abcdefghij0123456789resetRobot "0a1b2c3d4e5f""#)
                .unwrap();
        let InboundFrame::Message { args, .. } = frame else {
            panic!("expected message");
        };
        assert_eq!(args, vec![json!("0a1b2c3d4e5f")]);
    }

    #[test]
    fn test_parse_message_without_payload_has_no_args() {
        let frame = InboundFrame::parse("0abcdefghij0123456789resetAll").unwrap();
        let InboundFrame::Message { event, args, .. } = frame else {
            panic!("expected message");
        };
        assert_eq!(event, "resetAll");
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_empty_line_is_malformed() {
        let err = InboundFrame::parse("\r\n").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_parse_unknown_tag_is_malformed() {
        let err = InboundFrame::parse("9abcdefghij0123456789").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_parse_truncated_session_is_malformed() {
        let err = InboundFrame::parse("0abc").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_parse_bad_json_is_decode_error() {
        let err =
            InboundFrame::parse("0abcdefghij0123456789joinRoom {not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_parse_connected_with_short_id_is_invalid_session() {
        let err = InboundFrame::parse("1short").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidSessionId(_)));
    }

    #[test]
    fn test_encode_emit_matches_wire_format() {
        let frame = encode_emit(&sid(), "x", &json!({"a": 1})).unwrap();
        assert_eq!(frame, "0abcdefghij0123456789x {\"a\":1}\r\n");
    }

    #[test]
    fn test_encode_emit_parses_back_on_peer() {
        let frame = encode_emit(&sid(), "x", &json!({"a": 1})).unwrap();
        let parsed = InboundFrame::parse(&frame).unwrap();
        assert_eq!(
            parsed,
            InboundFrame::Message {
                session: sid(),
                event: "x".into(),
                args: vec![json!({"a": 1})],
            }
        );
    }

    #[test]
    fn test_to_line_connected() {
        let line = InboundFrame::Connected(sid()).to_line().unwrap();
        assert_eq!(line, "1abcdefghij0123456789\r\n");
    }
}
