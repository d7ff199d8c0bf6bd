//! Request assembly and prompt templates.

use pagechat_protocols::{Message, PageCommand, PageContent};
use serde_json::Value;

const PERSONA: &str = "You are ChromeGPT, an intelligent browser assistant.";

/// The single system message that opens every request.
pub fn system_message(page: Option<&PageContent>) -> Message {
    match page {
        Some(page) => Message::system(format!(
            "{PERSONA} You help users by answering questions about web pages they are viewing. \
You maintain conversation context and can refer to previous messages in the chat.

Current Page Information:
Title: {}
URL: {}

Page Content:
{}

Be conversational, helpful, and remember what we've discussed. \
You can reference previous parts of our conversation.",
            page.title, page.url, page.content
        )),
        None => Message::system(format!(
            "{PERSONA} You maintain conversation context and can refer to previous messages \
in the chat. Be conversational, helpful, and remember what we've discussed."
        )),
    }
}

/// System message, then `history`, then the new user message.
pub fn build_messages(history: &[Message], user_message: &str, page: Option<&PageContent>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(system_message(page));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_message));
    messages
}

/// Wrap a page command's result into a prompt for the completion step.
pub fn synthesize_prompt(command: PageCommand, data: &Value, original_message: &str) -> String {
    match command {
        PageCommand::SummarizePage => {
            let field = |name: &str| data.get(name).map(render).unwrap_or_default();
            format!(
                "You are analyzing a specific web page. Please provide a concise and accurate summary \
based ONLY on the actual content provided below. Do not make assumptions or add information not \
present in the content.

Page Title: {}
URL: {}

Page Content:
{}

Please summarize what this specific page is about based on the actual content above. \
Be factual and specific.",
                field("title"),
                field("url"),
                field("content")
            )
        }
        PageCommand::FindEmail => format!(
            "I found the following email addresses on the page: {}",
            render(data)
        ),
        PageCommand::FindPhone => format!(
            "I found the following phone numbers on the page: {}",
            render(data)
        ),
        PageCommand::ExtractText => format!(
            "Here is the extracted text from the page based on your request \"{}\":\n\n{}",
            original_message,
            render(data)
        ),
        _ => format!("Command executed. Result: {}", render(data)),
    }
}

/// Strings verbatim, arrays comma-joined, everything else as JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
