//! Standalone-question rewriting.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::generation::Generator;
use crate::models::ConversationTurn;
use crate::prompt::rewrite_messages;

/// Turns a follow-up question into one that makes sense without history.
pub struct QueryRewriter {
    generator: Arc<dyn Generator>,
}

impl QueryRewriter {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Rewrite `question` using `history`.
    ///
    /// With no history the question is returned unchanged and the model is
    /// not called. A blank model reply also falls back to the original
    /// question; a failed call propagates.
    pub async fn rewrite(&self, history: &[ConversationTurn], question: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let reply = self
            .generator
            .complete(&rewrite_messages(history, question))
            .await?;
        let standalone = reply.trim();

        if standalone.is_empty() {
            return Ok(question.to_string());
        }

        debug!(original = %question, standalone = %standalone, "rewrote question");
        Ok(standalone.to_string())
    }
}
