//! Fehlertypen fuer die Wiedergabe-Engine
//!
//! Fehler entstehen nur innerhalb der Wiedergabe-Schleife und werden dort
//! geloggt. Aufrufer von `enqueue`/`skip`/`stop` sehen sie nie.

use thiserror::Error;

/// Fehler der Transkodier-Pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Prozess '{programm}' konnte nicht gestartet werden: {quelle}")]
    Start {
        programm: String,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Lesefehler im Audio-Stream: {0}")]
    Lesen(#[from] std::io::Error),

    #[error("Konverter fehlerhaft beendet: {status}")]
    KonverterFehlgeschlagen { status: String },

    #[error("Pipeline wurde bereits abgebaut")]
    Abgebaut,

    #[error("Pipeline abgestuerzt: {0}")]
    Panik(String),
}

impl PipelineError {
    /// Fehler beim Starten eines Prozesses
    pub fn start(programm: impl Into<String>, quelle: std::io::Error) -> Self {
        Self::Start {
            programm: programm.into(),
            quelle,
        }
    }
}

/// Fehler des Voice-Transports
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Voice-Transport geschlossen")]
    Geschlossen,
}

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_fehler_nennt_programm() {
        let e = PipelineError::start(
            "yt-dlp",
            std::io::Error::new(std::io::ErrorKind::NotFound, "nicht gefunden"),
        );
        let text = e.to_string();
        assert!(text.contains("yt-dlp"));
        assert!(text.contains("nicht gefunden"));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn io_fehler_wird_lesefehler() {
        let e: PipelineError = std::io::Error::other("kaputt").into();
        assert!(matches!(e, PipelineError::Lesen(_)));
    }
}
