//! Gemeinsame Identifikationstypen fuer Luna
//!
//! Ziel-Kennungen kommen unveraendert von der Chat-Plattform und werden
//! nur als opake Strings behandelt. Das Newtype-Pattern verhindert, dass sie
//! mit Locatoren oder Titeln verwechselt werden.

use serde::{Deserialize, Serialize};

/// Kennung eines Wiedergabe-Ziels (in der Regel die Guild-ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(String);

impl GuildId {
    /// Erstellt eine GuildId aus der Kennung der Plattform
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die Kennung als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GuildId {
    fn from(id: &str) -> Self {
        Self::neu(id)
    }
}

impl From<String> for GuildId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "guild:{}", self.0)
    }
}
