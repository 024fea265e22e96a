use serde::{Deserialize, Serialize};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The conversation history, oldest first.
    pub messages: Vec<ModelMessage>,
}

impl ModelRequest {
    /// Returns the number of messages that are part of the conversation
    /// itself, which excludes the system instructions.
    pub fn turn_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|msg| !matches!(msg, ModelMessage::System(_)))
            .count()
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Returns the text of this message.
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            ModelMessage::System(text)
            | ModelMessage::User(text)
            | ModelMessage::Assistant(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_count_skips_system() {
        let req = ModelRequest {
            messages: vec![
                ModelMessage::System("Be brief.".to_owned()),
                ModelMessage::User("Hi".to_owned()),
                ModelMessage::Assistant("Hello".to_owned()),
                ModelMessage::User("Bye".to_owned()),
            ],
        };
        assert_eq!(req.turn_count(), 3);
        assert_eq!(req.messages[0].text(), "Be brief.");
    }

    #[test]
    fn test_message_serde_shape() {
        let msg = ModelMessage::Assistant("Hello".to_owned());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "role": "assistant", "content": "Hello" })
        );
    }
}
