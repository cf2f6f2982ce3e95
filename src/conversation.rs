//! Per-backend conversation history.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::LLMError;
use crate::types::Message;

/// Ordered history of completed turns, oldest first.
///
/// Every mutation goes through one mutex. Requests are built from a copy taken with
/// [`Conversation::begin_turn`], so the lock is never held while a request is in flight.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Mutex<Vec<Message>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a message.
    pub fn push(&self, message: Message) {
        self.lock().push(message);
    }

    /// Appends the user's message and returns a copy of the whole history, atomically.
    pub fn begin_turn(&self, text: &str) -> Vec<Message> {
        let mut messages = self.lock();
        messages.push(Message::user(text));
        messages.clone()
    }

    /// Copy of the current history.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Drops every message. Idempotent.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs one non-streamed chat turn.
    ///
    /// The user message stays in the history even when `send` fails; only a successful
    /// reply adds the assistant message.
    pub(crate) async fn exchange<F, Fut>(&self, text: &str, send: F) -> Result<String, LLMError>
    where
        F: FnOnce(Vec<Message>) -> Fut,
        Fut: Future<Output = Result<String, LLMError>>,
    {
        let history = self.begin_turn(text);
        let reply = send(history).await?;
        self.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// Runs one streamed chat turn. An empty accumulated reply is not recorded.
    pub(crate) async fn exchange_stream<F, Fut>(
        &self,
        text: &str,
        send: F,
    ) -> Result<String, LLMError>
    where
        F: FnOnce(Vec<Message>) -> Fut,
        Fut: Future<Output = Result<String, LLMError>>,
    {
        let history = self.begin_turn(text);
        let reply = send(history).await?;
        if !reply.is_empty() {
            self.push(Message::assistant(reply.clone()));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[tokio::test]
    async fn successful_turn_records_both_messages() {
        let conversation = Conversation::new();
        let reply = conversation
            .exchange("hi", |history| async move {
                assert_eq!(history, vec![Message::user("hi")]);
                Ok("hello".to_string())
            })
            .await
            .expect("reply");

        assert_eq!(reply, "hello");
        assert_eq!(
            conversation.snapshot(),
            vec![Message::user("hi"), Message::assistant("hello")]
        );
    }

    /// A failed send keeps the user message and adds no assistant reply.
    #[tokio::test]
    async fn failed_turn_keeps_user_message() {
        let conversation = Conversation::new();
        let err = conversation
            .exchange("hi", |_| async { Err(LLMError::transport("connection refused")) })
            .await
            .expect_err("should fail");

        assert!(matches!(err, LLMError::Transport { .. }));
        assert_eq!(conversation.snapshot(), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn empty_streamed_reply_is_not_recorded() {
        let conversation = Conversation::new();
        let reply = conversation
            .exchange_stream("hi", |_| async { Ok(String::new()) })
            .await
            .expect("reply");

        assert!(reply.is_empty());
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.snapshot()[0].role, Role::User);
    }

    #[tokio::test]
    async fn next_turn_carries_full_history() {
        let conversation = Conversation::new();
        conversation
            .exchange("one", |_| async { Ok("1".to_string()) })
            .await
            .expect("first");
        conversation
            .exchange("two", |history| async move {
                assert_eq!(
                    history,
                    vec![
                        Message::user("one"),
                        Message::assistant("1"),
                        Message::user("two")
                    ]
                );
                Ok("2".to_string())
            })
            .await
            .expect("second");

        assert_eq!(conversation.len(), 4);
    }

    #[test]
    fn clear_is_idempotent() {
        let conversation = Conversation::new();
        conversation.push(Message::user("hi"));
        conversation.clear();
        conversation.clear();
        assert!(conversation.is_empty());
    }
}
