//! Per-Guild Player – Warteschlange, Transport und Wiedergabe-Zustand
//!
//! Alle oeffentlichen Operationen sind kurz, nehmen nur das Lock des
//! eigenen Players und kehren sofort zurueck. Das Lock wird nie ueber I/O
//! gehalten, die Wiedergabe-Schleife kopiert sich Titel und Transport heraus.
//!
//! Jede gestartete Schleife bekommt eine eigene Generation. Die Hilfsmethoden
//! fuer die Schleife pruefen sie bei jedem Zugriff, eine abgeloeste Schleife
//! (z.B. nach `disconnect`) kann den Zustand einer neueren so nie veraendern.

use luna_core::GuildId;
use luna_observability::LunaMetrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::pipeline::PipelineFactory;
use crate::playback;
use crate::track::Track;
use crate::transport::VoiceTransport;

// ---------------------------------------------------------------------------
// Abbruch-Signal
// ---------------------------------------------------------------------------

/// Ausloeser eines Titel-Abbruchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbbruchGrund {
    Skip,
    Stop,
    Trennung,
}

/// Abbruch fuer genau einen beanspruchten Titel
#[derive(Debug, Clone, Copy)]
pub(crate) struct Abbruch {
    pub sequenz: u64,
    pub grund: AbbruchGrund,
}

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

/// Gemeinsame Abhaengigkeiten aller Player einer Registry
pub(crate) struct PlayerKontext {
    pub factory: Arc<dyn PipelineFactory>,
    pub metriken: LunaMetrics,
}

/// Momentaufnahme eines Players fuer Diagnose und Statusbefehle
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub guild_id: GuildId,
    pub verbunden: bool,
    pub spielt: bool,
    /// Titel, den die Schleife gerade startet oder streamt
    pub aktueller_titel: Option<Track>,
    /// Pipeline des aktuellen Titels laeuft
    pub streamt: bool,
    pub warteschlange: usize,
    /// Anzahl bisher gestarteter Wiedergabe-Schleifen
    pub schleifen_starts: u64,
}

struct AktiverTitel {
    sequenz: u64,
    track: Track,
    /// true sobald die Pipeline laeuft (Streaming), false beim Starten
    streamt: bool,
}

struct PlayerInner {
    queue: VecDeque<Track>,
    transport: Option<Arc<dyn VoiceTransport>>,
    aktueller_titel: Option<AktiverTitel>,
    playing: bool,
    /// Sender zur laufenden Schleife, Kapazitaet 1
    abbruch_tx: Option<mpsc::Sender<Abbruch>>,
    naechste_sequenz: u64,
    /// Generation der zuletzt gestarteten Schleife
    generation: u64,
}

impl PlayerInner {
    fn leerlauf(&mut self) {
        self.playing = false;
        self.aktueller_titel = None;
        self.abbruch_tx = None;
    }

    fn ist_aktuell(&self, generation: u64) -> bool {
        self.playing && self.generation == generation
    }
}

// ---------------------------------------------------------------------------
// GuildPlayer
// ---------------------------------------------------------------------------

/// Wiedergabe-Zustand eines einzelnen Ziels (einer Guild)
pub struct GuildPlayer {
    guild_id: GuildId,
    kontext: Arc<PlayerKontext>,
    inner: Mutex<PlayerInner>,
    schleifen_starts: AtomicU64,
}

impl GuildPlayer {
    /// Erstellt einen eigenstaendigen Player ausserhalb einer Registry
    pub fn neu(
        guild_id: GuildId,
        factory: Arc<dyn PipelineFactory>,
        metriken: LunaMetrics,
    ) -> Arc<Self> {
        Arc::new(Self::mit_kontext(
            guild_id,
            Arc::new(PlayerKontext { factory, metriken }),
        ))
    }

    pub(crate) fn mit_kontext(guild_id: GuildId, kontext: Arc<PlayerKontext>) -> Self {
        Self {
            guild_id,
            kontext,
            inner: Mutex::new(PlayerInner {
                queue: VecDeque::new(),
                transport: None,
                aktueller_titel: None,
                playing: false,
                abbruch_tx: None,
                naechste_sequenz: 0,
                generation: 0,
            }),
            schleifen_starts: AtomicU64::new(0),
        }
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    // -----------------------------------------------------------------------
    // Befehle
    // -----------------------------------------------------------------------

    /// Installiert den Voice-Transport
    ///
    /// Ein vorher installierter anderer Transport wird getrennt. Warten
    /// bereits Titel, startet die Wiedergabe sofort.
    pub fn connect(self: &Arc<Self>, transport: Arc<dyn VoiceTransport>) {
        let (alter, gestartet) = {
            let mut inner = self.inner.lock();
            let alter = inner.transport.replace(Arc::clone(&transport));
            let gestartet = self.schleife_starten_falls_noetig(&mut inner);
            (alter, gestartet)
        };

        if let Some(alter) = alter {
            if !Arc::ptr_eq(&alter, &transport) {
                alter.trennen();
            }
        }
        tracing::info!(guild = %self.guild_id, wiedergabe_gestartet = gestartet, "Voice-Transport verbunden");
    }

    /// Trennt Transport und Wiedergabe, leert die Warteschlange
    ///
    /// Die laufende Schleife wird abgeloest und baut ihre Pipeline selbst
    /// ab. Mehrfacher Aufruf ist wirkungslos.
    pub fn disconnect(&self) {
        let (transport, hatte_schleife) = {
            let mut inner = self.inner.lock();
            let transport = inner.transport.take();
            inner.queue.clear();

            let hatte_schleife = inner.playing;
            if let (Some(titel), Some(tx)) = (&inner.aktueller_titel, &inner.abbruch_tx) {
                // Best effort: ein geschlossener Kanal weckt die Schleife ohnehin
                let _ = tx.try_send(Abbruch {
                    sequenz: titel.sequenz,
                    grund: AbbruchGrund::Trennung,
                });
            }
            if hatte_schleife {
                inner.generation += 1;
            }
            inner.leerlauf();
            (transport, hatte_schleife)
        };

        let hatte_transport = transport.is_some();
        if let Some(transport) = transport {
            transport.trennen();
        }
        if hatte_transport || hatte_schleife {
            tracing::info!(guild = %self.guild_id, "Voice-Transport getrennt");
        }
    }

    /// Haengt einen Titel an und startet bei Bedarf die Wiedergabe
    ///
    /// Ohne Transport wartet der Titel still auf `connect`.
    pub fn enqueue(self: &Arc<Self>, track: Track) {
        let (position, gestartet, verbunden) = {
            let mut inner = self.inner.lock();
            inner.queue.push_back(track.clone());
            let position = inner.queue.len();
            let gestartet = self.schleife_starten_falls_noetig(&mut inner);
            (position, gestartet, inner.transport.is_some())
        };

        tracing::debug!(
            guild = %self.guild_id,
            titel = %track,
            position,
            wiedergabe_gestartet = gestartet,
            verbunden,
            "Titel eingereiht"
        );
    }

    /// Bricht den aktuellen Titel ab, die Schleife macht mit dem naechsten weiter
    ///
    /// Gibt zurueck, ob es einen abzubrechenden Titel gab.
    pub fn skip(&self) -> bool {
        self.abbrechen(AbbruchGrund::Skip)
    }

    /// Leert die Warteschlange und bricht den aktuellen Titel ab
    pub fn stop(&self) {
        let verworfen = {
            let mut inner = self.inner.lock();
            let n = inner.queue.len();
            inner.queue.clear();
            n
        };
        let abgebrochen = self.abbrechen(AbbruchGrund::Stop);
        if verworfen > 0 || abgebrochen {
            tracing::info!(guild = %self.guild_id, verworfen, "Wiedergabe gestoppt");
        }
    }

    fn abbrechen(&self, grund: AbbruchGrund) -> bool {
        let inner = self.inner.lock();
        let (Some(titel), Some(tx)) = (&inner.aktueller_titel, &inner.abbruch_tx) else {
            return false;
        };
        match tx.try_send(Abbruch {
            sequenz: titel.sequenz,
            grund,
        }) {
            Ok(()) => true,
            // Abbruch fuer diesen Titel ist bereits unterwegs
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Kopie der wartenden Titel (ohne den aktuellen)
    pub fn snapshot_queue(&self) -> Vec<Track> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    /// Titel, den die Schleife gerade bearbeitet
    pub fn now_playing(&self) -> Option<Track> {
        self.inner
            .lock()
            .aktueller_titel
            .as_ref()
            .map(|t| t.track.clone())
    }

    pub fn ist_verbunden(&self) -> bool {
        self.inner.lock().transport.is_some()
    }

    pub fn spielt(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn schleifen_starts(&self) -> u64 {
        self.schleifen_starts.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> PlayerStatus {
        let inner = self.inner.lock();
        PlayerStatus {
            guild_id: self.guild_id.clone(),
            verbunden: inner.transport.is_some(),
            spielt: inner.playing,
            aktueller_titel: inner.aktueller_titel.as_ref().map(|t| t.track.clone()),
            streamt: inner.aktueller_titel.as_ref().is_some_and(|t| t.streamt),
            warteschlange: inner.queue.len(),
            schleifen_starts: self.schleifen_starts(),
        }
    }

    // -----------------------------------------------------------------------
    // Schleifen-Start
    // -----------------------------------------------------------------------

    /// Startet eine Schleife, wenn keine laeuft, Titel warten und ein
    /// Transport installiert ist
    ///
    /// Laeuft im selben kritischen Abschnitt wie die Aenderung, die den Start
    /// ausloest. Zwei gleichzeitige Aufrufer koennen so nie zwei Schleifen starten.
    fn schleife_starten_falls_noetig(self: &Arc<Self>, inner: &mut PlayerInner) -> bool {
        if inner.playing || inner.queue.is_empty() || inner.transport.is_none() {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!(guild = %self.guild_id, "Keine Tokio-Runtime, Wiedergabe nicht gestartet");
                return false;
            }
        };

        let (tx, rx) = mpsc::channel(1);
        inner.generation += 1;
        inner.playing = true;
        inner.abbruch_tx = Some(tx);

        self.schleifen_starts.fetch_add(1, Ordering::Relaxed);
        self.kontext.metriken.playback_loops_active.inc();
        runtime.spawn(playback::wiedergabe_schleife(
            Arc::clone(self),
            inner.generation,
            rx,
        ));
        true
    }

    // -----------------------------------------------------------------------
    // Schnittstelle fuer die Wiedergabe-Schleife
    // -----------------------------------------------------------------------

    pub(crate) fn kontext(&self) -> &PlayerKontext {
        &self.kontext
    }

    /// Nimmt den naechsten Titel aus der Warteschlange
    ///
    /// `None` heisst: Schleife beenden. Ist die Generation noch aktuell, geht
    /// der Player dabei in den Leerlauf (leere Warteschlange oder kein
    /// Transport). Liegengebliebene Abbrueche fuer fruehere Titel werden
    /// unter dem Lock verworfen, damit der Slot fuer den neuen Titel frei ist.
    pub(crate) fn titel_beanspruchen(
        &self,
        generation: u64,
        abbruch_rx: &mut mpsc::Receiver<Abbruch>,
    ) -> Option<(u64, Track)> {
        let mut inner = self.inner.lock();
        if !inner.ist_aktuell(generation) {
            return None;
        }
        while abbruch_rx.try_recv().is_ok() {}

        if inner.transport.is_none() {
            inner.leerlauf();
            return None;
        }
        let Some(track) = inner.queue.pop_front() else {
            inner.leerlauf();
            return None;
        };

        let sequenz = inner.naechste_sequenz;
        inner.naechste_sequenz += 1;
        inner.aktueller_titel = Some(AktiverTitel {
            sequenz,
            track: track.clone(),
            streamt: false,
        });
        Some((sequenz, track))
    }

    /// Markiert den Titel als streamend (Pipeline steht)
    pub(crate) fn pipeline_aktiv_setzen(&self, generation: u64, sequenz: u64) {
        let mut inner = self.inner.lock();
        if !inner.ist_aktuell(generation) {
            return;
        }
        if let Some(titel) = inner.aktueller_titel.as_mut() {
            if titel.sequenz == sequenz {
                titel.streamt = true;
            }
        }
    }

    pub(crate) fn titel_beenden(&self, generation: u64, sequenz: u64) {
        let mut inner = self.inner.lock();
        if !inner.ist_aktuell(generation) {
            return;
        }
        if inner
            .aktueller_titel
            .as_ref()
            .is_some_and(|t| t.sequenz == sequenz)
        {
            inner.aktueller_titel = None;
        }
    }

    /// Aktueller Transport, `None` fuer abgeloeste Schleifen
    pub(crate) fn transport_fuer(&self, generation: u64) -> Option<Arc<dyn VoiceTransport>> {
        let inner = self.inner.lock();
        if !inner.ist_aktuell(generation) {
            return None;
        }
        inner.transport.clone()
    }

    pub(crate) fn ist_abgeloest(&self, generation: u64) -> bool {
        !self.inner.lock().ist_aktuell(generation)
    }

    /// Entfernt einen dauerhaft geschlossenen Transport
    ///
    /// Die Warteschlange bleibt erhalten und laeuft nach dem naechsten
    /// `connect` weiter.
    pub(crate) fn transport_verloren(&self, generation: u64, transport: &Arc<dyn VoiceTransport>) {
        let mut inner = self.inner.lock();
        if !inner.ist_aktuell(generation) {
            return;
        }
        if inner
            .transport
            .as_ref()
            .is_some_and(|t| Arc::ptr_eq(t, transport))
        {
            inner.transport = None;
        }
    }

    /// Aufraeumen beim Ende der Schleife, auch nach Runtime-Abbau
    pub(crate) fn schleife_beendet(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.ist_aktuell(generation) {
            inner.leerlauf();
        }
    }

    /// Aufraeumen nach einem Panic der Schleife selbst
    ///
    /// Warten noch Titel und ist ein Transport installiert, uebernimmt sofort
    /// eine neue Schleife. Gibt zurueck, ob eine gestartet wurde.
    pub(crate) fn schleife_abgestuerzt(self: &Arc<Self>, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if !inner.ist_aktuell(generation) {
            return false;
        }
        inner.leerlauf();
        self.schleife_starten_falls_noetig(&mut inner)
    }
}

impl std::fmt::Debug for GuildPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildPlayer")
            .field("guild_id", &self.guild_id)
            .field("status", &self.status())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
