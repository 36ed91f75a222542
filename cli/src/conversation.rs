use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = r#"You are a music composition assistant. Based on the user's input, create a piano composition of at least 15 seconds in length. Provide ONLY the following JSON format without any additional text or explanations:
{
    "tempo": <integer between 60-180>,
    "time_signature": "<string, either '4/4' or '3/4'>",
    "notes": [
        {
            "pitch": "<string, e.g., 'C4', 'D4', etc.>",
            "duration": <float, in beats>,
            "time": <float, start time in beats>,
            "track": <integer, 0 for melody, 1 for chords>
        },
        ...
    ]
}
Use sharps only (C#, D#, F#, G#, A#), never flats.
Example of a composition:

{
    "tempo": 120,
    "time_signature": "4/4",
    "notes": [
        {"pitch": "E4", "duration": 1.0, "time": 0.0, "track": 0},
        {"pitch": "D4", "duration": 1.0, "time": 1.0, "track": 0},
        {"pitch": "C4", "duration": 1.0, "time": 2.0, "track": 0},
        {"pitch": "D4", "duration": 1.0, "time": 3.0, "track": 0},
        {"pitch": "E4", "duration": 1.0, "time": 4.0, "track": 0},
        {"pitch": "E4", "duration": 1.0, "time": 5.0, "track": 0},
        {"pitch": "E4", "duration": 2.0, "time": 6.0, "track": 0},
        {"pitch": "D4", "duration": 1.0, "time": 8.0, "track": 0},
        {"pitch": "D4", "duration": 1.0, "time": 9.0, "track": 0},
        {"pitch": "D4", "duration": 2.0, "time": 10.0, "track": 0},
        {"pitch": "E4", "duration": 1.0, "time": 12.0, "track": 0},
        {"pitch": "G4", "duration": 1.0, "time": 13.0, "track": 0},
        {"pitch": "G4", "duration": 2.0, "time": 14.0, "track": 0},
        {"pitch": "C3", "duration": 2.0, "time": 0.0, "track": 1},
        {"pitch": "G3", "duration": 2.0, "time": 2.0, "track": 1},
        {"pitch": "C3", "duration": 2.0, "time": 4.0, "track": 1},
        {"pitch": "G3", "duration": 2.0, "time": 6.0, "track": 1},
        {"pitch": "D3", "duration": 2.0, "time": 8.0, "track": 1},
        {"pitch": "G3", "duration": 2.0, "time": 10.0, "track": 1},
        {"pitch": "C3", "duration": 2.0, "time": 12.0, "track": 1},
        {"pitch": "G3", "duration": 2.0, "time": 14.0, "track": 1}
    ]
}

Aim for a composition of at least 60 notes to ensure a minimum length of 15 seconds."#;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

// Each request step consumes the conversation and hands back the extended one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_system_prompt(SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: &str) -> Self {
        Self { messages: vec![ChatMessage { role: Role::System, content: prompt.to_string() }] }
    }

    pub fn with_user(self, content: impl Into<String>) -> Self {
        self.push(Role::User, content.into())
    }

    pub fn with_assistant(self, content: impl Into<String>) -> Self {
        self.push(Role::Assistant, content.into())
    }

    fn push(mut self, role: Role, content: String) -> Self {
        self.messages.push(ChatMessage { role, content });
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// `latest_midi` is the file name of the most recent generation.
pub fn follow_up_prompt(original_prompt: &str, latest_midi: &str, follow_up: &str) -> String {
    format!("Original prompt: {original_prompt}\nOriginal MIDI: {latest_midi}\nFollow-up: {follow_up}")
}
