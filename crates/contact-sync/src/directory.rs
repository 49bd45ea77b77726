use crate::events::MessageNotice;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to fetch chat {chat_id}: {reason}")]
    ChatFetch { chat_id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DirectoryError {
    pub fn chat_fetch(chat_id: &str, reason: impl Into<String>) -> Self {
        Self::ChatFetch {
            chat_id: chat_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Participant of a multi-party chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(alias = "id")]
    pub participant_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Read access to the platform's chats, as needed by the backfill scanner.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// All chat ids, or `None` when the directory cannot enumerate chats.
    async fn chat_ids(&self) -> Result<Option<Vec<String>>, DirectoryError>;

    /// Participants of a multi-party chat.
    async fn roster(&self, chat_id: &str) -> Result<Vec<RosterEntry>, DirectoryError>;

    /// Up to `limit` most recent messages of a chat.
    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageNotice>, DirectoryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureChat {
    pub id: String,

    #[serde(default)]
    pub roster: Vec<RosterEntry>,

    #[serde(default)]
    pub messages: Vec<MessageNotice>,

    /// Every fetch for this chat fails
    #[serde(default)]
    pub unreachable: bool,
}

fn default_enumerable() -> bool {
    true
}

/// Directory backed by a JSON document, for offline replays and tests.
///
/// ```json
/// { "chats": [ { "id": "1203@g.us", "roster": [{ "participantId": "628@s.whatsapp.net" }],
///                "messages": [{ "chatId": "1203@g.us", "participant": "628@s.whatsapp.net",
///                               "pushName": "Ann" }] } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureDirectory {
    #[serde(default)]
    pub chats: Vec<FixtureChat>,

    /// When false, `chat_ids` reports that enumeration is unsupported
    #[serde(default = "default_enumerable")]
    pub enumerable: bool,
}

impl Default for FixtureDirectory {
    /// An empty directory that cannot enumerate chats.
    fn default() -> Self {
        Self {
            chats: Vec::new(),
            enumerable: false,
        }
    }
}

impl FixtureDirectory {
    pub fn new(chats: Vec<FixtureChat>) -> Self {
        Self {
            chats,
            enumerable: true,
        }
    }

    pub async fn load(path: &Path) -> Result<Self, DirectoryError> {
        let bytes = tokio::fs::read(path).await?;
        let directory: Self = serde_json::from_slice(&bytes)?;
        log::info!(
            "Loaded directory fixture {} ({} chats)",
            path.display(),
            directory.chats.len()
        );
        Ok(directory)
    }

    fn chat(&self, chat_id: &str) -> Result<&FixtureChat, DirectoryError> {
        let chat = self
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| DirectoryError::chat_fetch(chat_id, "unknown chat"))?;
        if chat.unreachable {
            return Err(DirectoryError::chat_fetch(chat_id, "chat unreachable"));
        }
        Ok(chat)
    }
}

#[async_trait]
impl ChatDirectory for FixtureDirectory {
    async fn chat_ids(&self) -> Result<Option<Vec<String>>, DirectoryError> {
        if !self.enumerable {
            return Ok(None);
        }
        Ok(Some(self.chats.iter().map(|c| c.id.clone()).collect()))
    }

    async fn roster(&self, chat_id: &str) -> Result<Vec<RosterEntry>, DirectoryError> {
        Ok(self.chat(chat_id)?.roster.clone())
    }

    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageNotice>, DirectoryError> {
        let messages = &self.chat(chat_id)?.messages;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn message(chat: &str, n: u64) -> MessageNotice {
        MessageNotice {
            chat_id: chat.to_string(),
            timestamp: Some(n),
            ..MessageNotice::default()
        }
    }

    #[tokio::test]
    async fn recent_messages_keeps_the_newest() {
        let directory = FixtureDirectory::new(vec![FixtureChat {
            id: "a@s.whatsapp.net".to_string(),
            messages: (1..=5).map(|n| message("a@s.whatsapp.net", n)).collect(),
            ..FixtureChat::default()
        }]);
        let recent = directory.recent_messages("a@s.whatsapp.net", 2).await.unwrap();
        let stamps: Vec<_> = recent.iter().filter_map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![4, 5]);
    }

    #[tokio::test]
    async fn unreachable_and_unknown_chats_fail() {
        let directory = FixtureDirectory::new(vec![FixtureChat {
            id: "down@g.us".to_string(),
            unreachable: true,
            ..FixtureChat::default()
        }]);
        assert!(matches!(
            directory.roster("down@g.us").await,
            Err(DirectoryError::ChatFetch { .. })
        ));
        assert!(directory.recent_messages("nope@g.us", 5).await.is_err());
    }

    #[tokio::test]
    async fn default_directory_cannot_enumerate() {
        assert_eq!(FixtureDirectory::default().chat_ids().await.unwrap(), None);
    }

    #[tokio::test]
    async fn loads_from_json_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("directory.json");
        tokio::fs::write(
            &path,
            r#"{"chats":[{"id":"1-2@g.us","roster":[{"id":"628@s.whatsapp.net","displayName":"Ann"}]}]}"#,
        )
        .await
        .unwrap();

        let directory = FixtureDirectory::load(&path).await.unwrap();
        assert!(directory.enumerable);
        assert_eq!(
            directory.chat_ids().await.unwrap(),
            Some(vec!["1-2@g.us".to_string()])
        );
        let roster = directory.roster("1-2@g.us").await.unwrap();
        assert_eq!(roster[0].participant_id, "628@s.whatsapp.net");
        assert_eq!(roster[0].display_name.as_deref(), Some("Ann"));
    }
}
