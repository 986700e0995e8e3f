//! Fehlertypen fuer Luna
//!
//! Zentraler Fehler-Enum fuer die Befehlsschicht und den Server.
//! Die Wiedergabe-Engine hat eigene Fehler (`luna_player::error`), die
//! nie bis zum Aufrufer durchschlagen.

use thiserror::Error;

/// Globaler Result-Alias fuer Luna
pub type Result<T> = std::result::Result<T, LunaError>;

/// Alle crate-uebergreifenden Fehler im Luna-System
#[derive(Debug, Error)]
pub enum LunaError {
    // --- Verbindung ---
    #[error("Nicht verbunden: {0}")]
    NichtVerbunden(String),

    // --- Befehle ---
    #[error("Unbekannter Befehl: {0}")]
    UnbekannterBefehl(String),

    #[error("Fehlendes Argument fuer '{befehl}': {argument}")]
    FehlendesArgument { befehl: String, argument: String },

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl LunaError {
    /// Fehler, die der Benutzer durch eine korrigierte Eingabe beheben kann
    pub fn ist_eingabefehler(&self) -> bool {
        matches!(
            self,
            Self::UnbekannterBefehl(_) | Self::FehlendesArgument { .. } | Self::NichtVerbunden(_)
        )
    }
}
