//! Voice-Transport – Ziel fuer fertige Audio-Frames
//!
//! Der Player haelt den Transport als `Arc<dyn VoiceTransport>`. Eine
//! Verbindung kann zwischen zwei Frames ausgetauscht oder getrennt werden,
//! die Wiedergabe-Schleife holt ihn deshalb fuer jeden Frame neu.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::pipeline::Frame;

/// Ergebnis einer Frame-Uebergabe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendeErgebnis {
    /// Frame wurde angenommen
    Gesendet,
    /// Frame wurde verworfen (nicht bereit oder ueberlastet), Titel laeuft weiter
    Verworfen,
}

/// Verbindung zu einem Voice-Kanal
#[async_trait]
pub trait VoiceTransport: Send + Sync + 'static {
    /// Ob der Transport gerade Frames annehmen kann
    fn ist_bereit(&self) -> bool;

    /// Uebergibt einen Frame
    ///
    /// `Err` nur, wenn der Transport dauerhaft geschlossen ist.
    async fn frame_senden(&self, frame: Frame) -> TransportResult<SendeErgebnis>;

    /// Schliesst die Verbindung, weitere Frames werden verworfen
    fn trennen(&self);
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// Transport ueber einen begrenzten mpsc-Kanal
///
/// Die Empfangsseite gehoert der Senke (z.B. UDP-Sender oder Datei). Ist
/// der Kanal voll, wird nach `sende_timeout` verworfen statt blockiert.
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    bereit: AtomicBool,
    sende_timeout: Duration,
}

impl ChannelTransport {
    /// Erstellt Transport und zugehoerige Empfangsseite
    pub fn neu(queue_groesse: usize, sende_timeout: Duration) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        let transport = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            bereit: AtomicBool::new(true),
            sende_timeout,
        });
        (transport, rx)
    }

    /// Setzt die Bereitschaft (z.B. waehrend eines Reconnects)
    pub fn bereit_setzen(&self, bereit: bool) {
        self.bereit.store(bereit, Ordering::Release);
    }
}

#[async_trait]
impl VoiceTransport for ChannelTransport {
    fn ist_bereit(&self) -> bool {
        self.bereit.load(Ordering::Acquire) && self.tx.lock().is_some()
    }

    async fn frame_senden(&self, frame: Frame) -> TransportResult<SendeErgebnis> {
        if !self.bereit.load(Ordering::Acquire) {
            return Ok(SendeErgebnis::Verworfen);
        }

        // Sender klonen, damit das Lock nicht ueber await gehalten wird
        let tx = match self.tx.lock().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(TransportError::Geschlossen),
        };

        match tokio::time::timeout(self.sende_timeout, tx.send(frame)).await {
            Ok(Ok(())) => Ok(SendeErgebnis::Gesendet),
            Ok(Err(_)) => {
                self.bereit.store(false, Ordering::Release);
                self.tx.lock().take();
                Err(TransportError::Geschlossen)
            }
            Err(_) => {
                tracing::trace!("Frame-Queue voll, Frame verworfen");
                Ok(SendeErgebnis::Verworfen)
            }
        }
    }

    fn trennen(&self) {
        self.bereit.store(false, Ordering::Release);
        self.tx.lock().take();
    }
}

impl std::fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("bereit", &self.ist_bereit())
            .field("sende_timeout", &self.sende_timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
