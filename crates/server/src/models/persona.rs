//! Persona settings models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shoptalk_core::PersonaSettingsId;

/// The stored persona settings record.
///
/// At most one record exists. When none does, the chat surface falls back to
/// a built-in default persona instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaSettings {
    /// Unique record ID.
    pub id: PersonaSettingsId,
    /// Shop name the assistant introduces itself with.
    pub name: String,
    /// What the shop sells, in one or two sentences.
    pub description: String,
    /// Tone of voice for the assistant.
    pub personality: String,
    /// Messaging guidance (priorities, phrases to use or avoid).
    pub messaging: String,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for persona settings.
///
/// Fields default to empty so an absent field fails validation the same way
/// an empty one does.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonaInput {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub messaging: String,
}

impl PersonaInput {
    /// Validate that every field carries text.
    ///
    /// # Errors
    ///
    /// Returns the offending field name when a field is empty or whitespace.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name");
        }
        if self.description.trim().is_empty() {
            return Err("description");
        }
        if self.personality.trim().is_empty() {
            return Err("personality");
        }
        if self.messaging.trim().is_empty() {
            return Err("messaging");
        }
        Ok(())
    }
}
