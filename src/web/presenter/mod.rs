// Chat presentation rules: when an answer is replaced by the personalized not-found reply


use crate::rag::{ChatMessage, QueryResponse};

/// True when `answer` contains any of `phrases`, ignoring case
#[inline]
pub fn is_not_found_answer(answer: &str, phrases: &[String]) -> bool {
    let answer = answer.to_lowercase();
    phrases
        .iter()
        .filter(|p| !p.trim().is_empty())
        .any(|p| answer.contains(&p.to_lowercase()))
}

#[inline]
pub fn personalized_not_found_message(user_name: &str) -> String {
    format!(
        "Hey **{user_name}**! 👋

I couldn't find any information related to your question in the private knowledge base.

**Here's what you can do:**
1. 📚 Go to the **\"Document Collection\"** tab to check what documents are currently available
2. 📤 Head to the **\"Upload Documents\"** tab to add the relevant documents or text
3. 🔄 Once uploaded, come back and ask me again!

I can only provide information from documents that have been uploaded to my knowledge base. This ensures accuracy and prevents me from making things up!

Would you like me to help you with something else that might be covered in the existing documents?"
    )
}

#[inline]
pub fn chat_error_message(user_name: &str, error: &str) -> String {
    format!(
        "Sorry {user_name}, I encountered an error: {error}. Please make sure documents have been uploaded and processed."
    )
}

/// Turn an engine response into the assistant message shown to the user.
///
/// Empty retrieval and answers mentioning a not-found phrase both become the
/// personalized not-found reply with no sources attached.
#[inline]
pub fn present(response: QueryResponse, user_name: &str, phrases: &[String]) -> ChatMessage {
    if response.no_results || is_not_found_answer(&response.answer, phrases) {
        return ChatMessage::assistant(personalized_not_found_message(user_name), Some(Vec::new()));
    }

    ChatMessage::assistant(response.answer, Some(response.sources))
}
