//! Grounded answer generation.

use std::sync::Arc;

use crate::error::Result;
use crate::generation::Generator;
use crate::models::{Chunk, ConversationTurn};
use crate::prompt::answer_messages;

/// Answers a question from retrieved chunks only.
pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Ask the model to answer `question` from `chunks`, given `history`.
    ///
    /// The reply is trimmed; citations are not taken from the model, they
    /// are built by the engine from `chunks`.
    pub async fn generate(
        &self,
        question: &str,
        history: &[ConversationTurn],
        chunks: &[Chunk],
    ) -> Result<String> {
        let reply = self
            .generator
            .complete(&answer_messages(chunks, history, question))
            .await?;
        Ok(reply.trim().to_string())
    }
}
