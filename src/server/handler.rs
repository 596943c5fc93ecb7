//! # Message Handlers
//!
//! Every server is built around a [`MessageHandler`], the per-deployment hook
//! invoked once for each message received. The handler is a constructor
//! argument of [`JsonServer`](super::JsonServer), so a server without one
//! cannot exist.

use anyhow::Result;
use log::debug;

use crate::common::messages::{self, Message};

/// Status text returned by [`EchoHandler`] for non-object input.
pub const NOT_AN_OBJECT: &str = "NoObject";

/// Per-message hook of a server.
///
/// Return `Ok(Some(reply))` to send `reply` back to the client, `Ok(None)` to
/// send nothing for this message, or `Err` to log a failed cycle (no reply is
/// sent and the server keeps running).
///
/// Any `FnMut(Message) -> anyhow::Result<Option<Message>>` closure is a handler:
///
/// ```ignore
/// let server = JsonServer::bind(config, |msg: Message| Ok(Some(msg))).await?;
/// ```
pub trait MessageHandler: Send {
    fn process_message(&mut self, message: Message) -> Result<Option<Message>>;
}

impl<F> MessageHandler for F
where
    F: FnMut(Message) -> Result<Option<Message>> + Send,
{
    fn process_message(&mut self, message: Message) -> Result<Option<Message>> {
        self(message)
    }
}

/// Echoes objects back unchanged and answers anything else with
/// `{"Status": "NoObject"}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl MessageHandler for EchoHandler {
    fn process_message(&mut self, message: Message) -> Result<Option<Message>> {
        debug!("Echo handler received {}", message);
        if message.is_object() {
            Ok(Some(message))
        } else {
            Ok(Some(messages::status(NOT_AN_OBJECT)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo_returns_objects_unchanged() {
        let mut handler = EchoHandler;
        let message = json!({"echo": "hello", "i": 1});
        assert_eq!(handler.process_message(message.clone()).unwrap(), Some(message));
    }

    #[test]
    fn test_echo_rejects_non_objects() {
        let mut handler = EchoHandler;
        for message in [json!("bare string"), json!(7), json!([1, 2]), json!(null)] {
            assert_eq!(
                handler.process_message(message).unwrap(),
                Some(json!({"Status": "NoObject"}))
            );
        }
    }

    #[test]
    fn test_closure_handler() {
        let mut seen = 0;
        let mut handler = |message: Message| -> Result<Option<Message>> {
            seen += 1;
            Ok(message.get("reply").cloned())
        };

        assert_eq!(
            handler.process_message(json!({"reply": 1})).unwrap(),
            Some(json!(1))
        );
        assert_eq!(handler.process_message(json!({})).unwrap(), None);
        drop(handler);
        assert_eq!(seen, 2);
    }
}
