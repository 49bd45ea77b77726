//! Live events a host event loop hands to [`crate::ContactService::ingest`].

use serde::{Deserialize, Serialize};

/// Contact-list sync entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    pub id: String,

    /// Self-reported name
    #[serde(default, alias = "notify", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Name saved in the address book
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_name: Option<String>,
}

impl ContactUpdate {
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.saved_name.as_deref())
    }
}

/// A message as seen live or fetched during a backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNotice {
    pub chat_id: String,

    /// Author inside a multi-party chat; absent in one-to-one chats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_business_name: Option<String>,

    /// Unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl MessageNotice {
    /// Author id: the participant, else the chat itself.
    pub fn sender(&self) -> Option<&str> {
        self.participant
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| Some(self.chat_id.as_str()).filter(|c| !c.is_empty()))
    }

    pub fn display_name(&self) -> Option<&str> {
        self.push_name
            .as_deref()
            .or(self.verified_business_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveEvent {
    Contacts { contacts: Vec<ContactUpdate> },
    Message(MessageNotice),
    Chats {
        #[serde(rename = "chatIds")]
        chat_ids: Vec<String>,
    },
}
