//! Transkodier-Pipeline – Abstraktion ueber Fetcher und Konverter
//!
//! Die Wiedergabe-Schleife kennt nur die Traits in diesem Modul. Die echte
//! Implementierung mit Kindprozessen liegt in [`crate::process`], Tests
//! ersetzen sie durch Fakes mit geskripteten Frames und Fehlern.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::PipelineResult;

/// Ein Audio-Frame im festen Ausgabeformat ([`crate::format::FRAME_GROESSE`] Bytes)
pub type Frame = Bytes;

/// Ergebnis eines Lesevorgangs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextFrame {
    /// Ein vollstaendiger Frame
    Frame(Frame),
    /// Sauberes Ende des Streams
    EndOfStream,
}

/// Eine laufende Pipeline fuer genau einen Titel
#[async_trait]
pub trait TranscodePipeline: Send {
    /// Liest genau einen Frame (blockierend bis verfuegbar)
    ///
    /// `EndOfStream` bei sauberem Ende, `Err` bei jedem anderen Abbruch.
    async fn next_frame(&mut self) -> PipelineResult<NextFrame>;

    /// Beendet alle Prozesse hart und schliesst die Pipes
    ///
    /// Muss idempotent sein und darf nicht auf haengende Prozesse warten.
    async fn teardown(&mut self);
}

/// Erzeugt Pipelines fuer Locatoren
#[async_trait]
pub trait PipelineFactory: Send + Sync + 'static {
    /// Startet eine Pipeline fuer `locator`
    ///
    /// Wartet nicht auf das erste Byte: erfolgreicher Prozessstart gilt als bereit.
    async fn construct(&self, locator: &str) -> PipelineResult<Box<dyn TranscodePipeline>>;
}
