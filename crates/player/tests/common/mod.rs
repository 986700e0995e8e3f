//! Gemeinsame Fakes fuer die Integration-Tests
//!
//! - `FakeFactory`: geskriptete Pipelines pro Locator, zaehlt Starts und Teardowns
//! - `RecordingTransport`: merkt sich, zu welchem Locator jeder Frame gehoert

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use luna_observability::LunaMetrics;
use luna_player::format::{frame_dauer, frames_fuer, FRAME_GROESSE};
use luna_player::{
    Frame, GuildPlayer, NextFrame, PipelineError, PipelineFactory, PipelineResult,
    PlayerRegistry, SendeErgebnis, TranscodePipeline, TransportError, TransportResult,
    VoiceTransport,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Skript
// ---------------------------------------------------------------------------

/// Verhalten einer Fake-Pipeline
#[derive(Debug, Clone, Default)]
pub struct Skript {
    /// Anzahl Frames bis EndOfStream
    pub frames: usize,
    /// Wartezeit pro gelesenem Frame
    pub frame_verzoegerung: Duration,
    /// construct() schlaegt fehl
    pub start_fehler: bool,
    /// Lesefehler nach so vielen Frames
    pub lesefehler_nach: Option<usize>,
    /// construct() stuerzt ab
    pub start_panik: bool,
    /// next_frame() stuerzt nach so vielen Frames ab
    pub panik_nach: Option<usize>,
}

impl Skript {
    pub fn frames(frames: usize) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    /// Titel mit realer Spieldauer (ein Frame alle 20 ms)
    pub fn dauer(dauer: Duration) -> Self {
        Self {
            frames: frames_fuer(dauer),
            frame_verzoegerung: frame_dauer(),
            ..Default::default()
        }
    }

    /// Laeuft bis zum Abbruch
    pub fn endlos() -> Self {
        Self {
            frames: usize::MAX,
            frame_verzoegerung: Duration::from_millis(5),
            ..Default::default()
        }
    }

    pub fn kaputt() -> Self {
        Self {
            start_fehler: true,
            ..Default::default()
        }
    }

    pub fn lesefehler_nach(frames: usize) -> Self {
        Self {
            frames: usize::MAX,
            lesefehler_nach: Some(frames),
            ..Default::default()
        }
    }

    pub fn start_panik() -> Self {
        Self {
            start_panik: true,
            ..Default::default()
        }
    }

    pub fn panik_nach(frames: usize) -> Self {
        Self {
            frames: usize::MAX,
            panik_nach: Some(frames),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// FakeFactory
// ---------------------------------------------------------------------------

/// Was die Fakes beobachtet haben
#[derive(Debug, Default)]
pub struct Protokoll {
    /// Locatoren aller construct()-Aufrufe in Reihenfolge
    pub konstruiert: Mutex<Vec<String>>,
    /// Erfolgreich erzeugte Pipelines
    pub erzeugt: AtomicUsize,
    /// teardown()-Aufrufe insgesamt
    pub abgebaut: AtomicUsize,
}

impl Protokoll {
    pub fn konstruiert(&self) -> Vec<String> {
        self.konstruiert.lock().clone()
    }

    pub fn erzeugt(&self) -> usize {
        self.erzeugt.load(Ordering::SeqCst)
    }

    pub fn abgebaut(&self) -> usize {
        self.abgebaut.load(Ordering::SeqCst)
    }
}

pub struct FakeFactory {
    skripte: HashMap<String, Skript>,
    standard: Skript,
    tor: Option<watch::Receiver<bool>>,
    pub protokoll: Arc<Protokoll>,
}

impl FakeFactory {
    pub fn neu(standard: Skript) -> Self {
        Self {
            skripte: HashMap::new(),
            standard,
            tor: None,
            protokoll: Arc::new(Protokoll::default()),
        }
    }

    pub fn mit_skript(mut self, locator: &str, skript: Skript) -> Self {
        self.skripte.insert(locator.to_string(), skript);
        self
    }

    /// construct() wartet, bis das Tor geoeffnet wird
    pub fn mit_tor(mut self) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        self.tor = Some(rx);
        (self, tx)
    }
}

#[async_trait]
impl PipelineFactory for FakeFactory {
    async fn construct(&self, locator: &str) -> PipelineResult<Box<dyn TranscodePipeline>> {
        self.protokoll.konstruiert.lock().push(locator.to_string());

        if let Some(mut tor) = self.tor.clone() {
            let _ = tor.wait_for(|offen| *offen).await;
        }

        let skript = self
            .skripte
            .get(locator)
            .cloned()
            .unwrap_or_else(|| self.standard.clone());
        if skript.start_panik {
            panic!("fake Absturz beim Start von {locator}");
        }
        if skript.start_fehler {
            return Err(PipelineError::start(
                locator,
                std::io::Error::new(std::io::ErrorKind::NotFound, "fake"),
            ));
        }

        self.protokoll.erzeugt.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePipeline {
            locator: locator.to_string(),
            skript,
            gelesen: 0,
            abgebaut: false,
            protokoll: Arc::clone(&self.protokoll),
        }))
    }
}

struct FakePipeline {
    locator: String,
    skript: Skript,
    gelesen: usize,
    abgebaut: bool,
    protokoll: Arc<Protokoll>,
}

#[async_trait]
impl TranscodePipeline for FakePipeline {
    async fn next_frame(&mut self) -> PipelineResult<NextFrame> {
        if self.abgebaut {
            return Err(PipelineError::Abgebaut);
        }
        if self.skript.panik_nach == Some(self.gelesen) {
            panic!("fake Absturz in {}", self.locator);
        }
        if self.skript.lesefehler_nach == Some(self.gelesen) {
            return Err(PipelineError::Lesen(std::io::Error::other("fake kaputt")));
        }
        if self.gelesen >= self.skript.frames {
            return Ok(NextFrame::EndOfStream);
        }

        if self.skript.frame_verzoegerung.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.skript.frame_verzoegerung).await;
        }
        self.gelesen += 1;
        Ok(NextFrame::Frame(markierter_frame(&self.locator)))
    }

    async fn teardown(&mut self) {
        self.abgebaut = true;
        self.protokoll.abgebaut.fetch_add(1, Ordering::SeqCst);
    }
}

/// Frame, der mit dem Locator beginnt und mit Nullen aufgefuellt ist
fn markierter_frame(locator: &str) -> Frame {
    let mut daten = vec![0u8; FRAME_GROESSE];
    let n = locator.len().min(FRAME_GROESSE);
    daten[..n].copy_from_slice(&locator.as_bytes()[..n]);
    Bytes::from(daten)
}

fn locator_aus_frame(frame: &Frame) -> String {
    let ende = frame.iter().position(|b| *b == 0).unwrap_or(frame.len());
    String::from_utf8_lossy(&frame[..ende]).into_owned()
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    bereit: AtomicBool,
    geschlossen: AtomicBool,
    getrennt: AtomicBool,
}

impl RecordingTransport {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            bereit: AtomicBool::new(true),
            geschlossen: AtomicBool::new(false),
            getrennt: AtomicBool::new(false),
        })
    }

    pub fn bereit_setzen(&self, bereit: bool) {
        self.bereit.store(bereit, Ordering::SeqCst);
    }

    /// Simuliert eine dauerhaft abgebrochene Verbindung
    pub fn schliessen(&self) {
        self.geschlossen.store(true, Ordering::SeqCst);
    }

    pub fn ist_getrennt(&self) -> bool {
        self.getrennt.load(Ordering::SeqCst)
    }

    pub fn frame_anzahl(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn frames_von(&self, locator: &str) -> usize {
        self.frames.lock().iter().filter(|l| *l == locator).count()
    }

    /// Locatoren in der Reihenfolge, in der ihre Frames ankamen
    pub fn reihenfolge(&self) -> Vec<String> {
        let mut reihenfolge: Vec<String> = self.frames.lock().clone();
        reihenfolge.dedup();
        reihenfolge
    }
}

#[async_trait]
impl VoiceTransport for RecordingTransport {
    fn ist_bereit(&self) -> bool {
        self.bereit.load(Ordering::SeqCst)
    }

    async fn frame_senden(&self, frame: Frame) -> TransportResult<SendeErgebnis> {
        if self.geschlossen.load(Ordering::SeqCst) {
            return Err(TransportError::Geschlossen);
        }
        if !self.ist_bereit() || self.ist_getrennt() {
            return Ok(SendeErgebnis::Verworfen);
        }
        self.frames.lock().push(locator_aus_frame(&frame));
        Ok(SendeErgebnis::Gesendet)
    }

    fn trennen(&self) {
        self.getrennt.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Hilfen
// ---------------------------------------------------------------------------

pub fn registry(factory: FakeFactory) -> (PlayerRegistry, Arc<Protokoll>) {
    let protokoll = Arc::clone(&factory.protokoll);
    let metriken = LunaMetrics::neu().expect("Metriken konnten nicht erstellt werden");
    (PlayerRegistry::neu(Arc::new(factory), metriken), protokoll)
}

/// Leerlauf: keine Schleife, nichts wartet
pub fn ist_leerlauf(player: &GuildPlayer) -> bool {
    let status = player.status();
    !status.spielt && status.warteschlange == 0 && status.aktueller_titel.is_none()
}

/// Pollt `bedingung`, bis sie wahr ist, sonst Panic nach `timeout`
pub async fn warte_bis(timeout: Duration, was: &str, mut bedingung: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !bedingung() {
        if start.elapsed() > timeout {
            panic!("Zeitlimit ({timeout:?}) abgelaufen: {was}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
