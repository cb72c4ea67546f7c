//! Prompt and history composition.
//!
//! Both model calls share the same shape: a fixed system message, then the
//! caller's conversation history in order, then the question as the final
//! user message.

use crate::generation::ChatMessage;
use crate::models::{Chunk, ConversationTurn};

/// System instruction for turning a follow-up into a standalone question.
pub const REWRITE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which can \
be understood without the chat history. Do NOT answer the question, just reformulate it if \
needed and otherwise return it as is.";

/// System instruction for answering from retrieved context only.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use only the following pieces of retrieved context to answer the question. If you don't know \
the answer from the context, just say that you don't know. Keep the answer concise.";

/// Separator placed between retrieved chunk texts.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Messages for the query-rewrite call.
pub fn rewrite_messages(history: &[ConversationTurn], question: &str) -> Vec<ChatMessage> {
    with_history(ChatMessage::system(REWRITE_SYSTEM_PROMPT), history, question)
}

/// Messages for the answer call; `chunks` become the system message's context.
pub fn answer_messages(
    chunks: &[Chunk],
    history: &[ConversationTurn],
    question: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "{}{}{}",
        ANSWER_SYSTEM_PROMPT,
        CONTEXT_SEPARATOR,
        format_context(chunks)
    );
    with_history(ChatMessage::system(system), history, question)
}

/// Concatenate chunk texts in retrieval order.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn with_history(
    system: ChatMessage,
    history: &[ConversationTurn],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(system);
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(question));
    messages
}
