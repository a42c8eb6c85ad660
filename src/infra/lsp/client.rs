//! Outbound channel to the editor
//!
//! The session never writes to the wire directly. Everything it wants to
//! send is queued here and flushed by the server loop after each inbound
//! message, which keeps the session synchronous and easy to test.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use super::protocol::{
    Message, MessageParams, MessageType, Notification, RequestId, Response, ResponseError, methods,
};

#[derive(Debug, Default)]
pub struct Client {
    outbox: VecDeque<Message>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&mut self, id: RequestId, result: Value) {
        self.push(Response::success(id, result).into());
    }

    pub fn respond_error(&mut self, id: Option<RequestId>, error: ResponseError) {
        self.push(Response::failure(id, error).into());
    }

    /// `window/showMessage`: shown to the user by the editor
    pub fn show_message(&mut self, kind: MessageType, message: impl Into<String>) {
        self.notify_window(methods::SHOW_MESSAGE, kind, message.into());
    }

    /// `window/logMessage`: written to the editor's output channel
    pub fn log_message(&mut self, kind: MessageType, message: impl Into<String>) {
        self.notify_window(methods::LOG_MESSAGE, kind, message.into());
    }

    pub fn notify<P: Serialize>(&mut self, method: &str, params: &P) {
        match serde_json::to_value(params) {
            Ok(value) => self.push(Notification::new(method, Some(value)).into()),
            Err(e) => tracing::warn!("Dropping {} notification: {}", method, e),
        }
    }

    /// Take every queued message, oldest first
    pub fn drain(&mut self) -> Vec<Message> {
        self.outbox.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    fn notify_window(&mut self, method: &str, kind: MessageType, message: String) {
        self.notify(method, &MessageParams { kind, message });
    }

    fn push(&mut self, message: Message) {
        self.outbox.push_back(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let mut client = Client::new();
        client.show_message(MessageType::Warning, "heads up");
        client.respond(RequestId::Number(1), Value::Null);
        assert_eq!(client.pending(), 2);

        let sent = client.drain();
        assert_eq!(sent[0].method(), Some("window/showMessage"));
        assert!(matches!(&sent[1], Message::Response(r) if r.is_success()));
        assert_eq!(client.pending(), 0);
    }

    #[test]
    fn test_log_message_params() {
        let mut client = Client::new();
        client.log_message(MessageType::Error, "bad params");

        let json = client.drain().remove(0).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["method"], "window/logMessage");
        assert_eq!(value["params"]["type"], 1);
        assert_eq!(value["params"]["message"], "bad params");
    }

    #[test]
    fn test_respond_error() {
        let mut client = Client::new();
        client.respond_error(
            Some(RequestId::Number(7)),
            ResponseError::new(-32601, "Method not found"),
        );
        match client.drain().remove(0) {
            Message::Response(response) => {
                let err = response.into_result().unwrap_err();
                assert_eq!(err.code, -32601);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
