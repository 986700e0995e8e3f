//! Wiedergabe-Schleife – ein Hintergrund-Task pro Guild
//!
//! ```text
//! Idle --enqueue/connect--> Starting --construct ok--> Streaming
//!   ^                         |                          |
//!   |                 construct Fehler         Ende/Fehler/Abbruch
//!   |                         v                          v
//!   +----- Queue leer ---- Draining <--------------------+
//!                             |
//!                             +--- Queue nicht leer --> Starting
//! ```
//!
//! Jeder Schritt (Pipeline-Start, Frame lesen + senden) laeuft gegen den
//! Abbruch-Kanal. Ein Abbruch wird damit spaetestens nach einem Frame-Zyklus
//! bemerkt, danach wird die Pipeline hart abgebaut.
//!
//! Ein Panic in Pipeline oder Transport beendet nur den aktuellen Titel.

use futures_util::FutureExt;
use luna_core::GuildId;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{PipelineError, PipelineResult};
use crate::format::frame_dauer;
use crate::pipeline::{NextFrame, TranscodePipeline};
use crate::player::{Abbruch, AbbruchGrund, GuildPlayer};
use crate::track::Track;
use crate::transport::SendeErgebnis;

// ---------------------------------------------------------------------------
// Ergebnis eines Titels
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Titelende {
    /// Stream sauber zu Ende
    Beendet,
    /// Pipeline konnte nicht gestartet werden
    StartFehlgeschlagen(PipelineError),
    /// Stream mitten im Titel abgebrochen
    Lesefehler(PipelineError),
    /// Skip, Stop oder Trennung
    Abgebrochen(AbbruchGrund),
    /// Transport dauerhaft geschlossen, Warteschlange bleibt erhalten
    TransportGeschlossen,
    /// Eine neuere Schleife hat uebernommen
    Abgeloest,
}

enum Schritt {
    Weiter,
    Ende(Titelende),
}

// ---------------------------------------------------------------------------
// Schleife
// ---------------------------------------------------------------------------

/// Arbeitet die Warteschlange ab, bis sie leer ist oder die Schleife abgeloest wird
pub(crate) async fn wiedergabe_schleife(
    player: Arc<GuildPlayer>,
    generation: u64,
    mut abbruch_rx: mpsc::Receiver<Abbruch>,
) {
    let _waechter = SchleifenWaechter {
        player: Arc::clone(&player),
        generation,
    };
    tracing::debug!(guild = %player.guild_id(), generation, "Wiedergabe-Schleife gestartet");

    while let Some((sequenz, track)) = player.titel_beanspruchen(generation, &mut abbruch_rx) {
        let metriken = &player.kontext().metriken;
        metriken.tracks_started.inc();
        tracing::info!(guild = %player.guild_id(), titel = %track, sequenz, "Titel startet");

        let ende = titel_abspielen(&player, generation, sequenz, &track, &mut abbruch_rx).await;
        player.titel_beenden(generation, sequenz);

        match ende {
            Titelende::Beendet => {
                metriken.tracks_finished.inc();
                tracing::info!(guild = %player.guild_id(), titel = %track, "Titel beendet");
            }
            Titelende::StartFehlgeschlagen(e) => {
                metriken.start_fehlgeschlagen();
                tracing::warn!(
                    guild = %player.guild_id(),
                    titel = %track,
                    fehler = %e,
                    "Titel nicht abspielbar, weiter mit dem naechsten"
                );
            }
            Titelende::Lesefehler(e) => {
                metriken.stream_fehlgeschlagen();
                tracing::error!(
                    guild = %player.guild_id(),
                    titel = %track,
                    fehler = %e,
                    "Audio-Stream abgebrochen"
                );
            }
            Titelende::Abgebrochen(grund) => {
                metriken.tracks_cancelled.inc();
                tracing::info!(guild = %player.guild_id(), titel = %track, ?grund, "Titel abgebrochen");
            }
            Titelende::TransportGeschlossen => {
                tracing::warn!(
                    guild = %player.guild_id(),
                    titel = %track,
                    "Voice-Transport geschlossen, Wiedergabe pausiert bis zum naechsten connect"
                );
            }
            Titelende::Abgeloest => break,
        }
    }

    tracing::debug!(guild = %player.guild_id(), generation, "Wiedergabe-Schleife beendet");
}

/// Spielt einen beanspruchten Titel: Starting, Streaming, Draining
async fn titel_abspielen(
    player: &GuildPlayer,
    generation: u64,
    sequenz: u64,
    track: &Track,
    abbruch_rx: &mut mpsc::Receiver<Abbruch>,
) -> Titelende {
    let factory = Arc::clone(&player.kontext().factory);

    let pipeline = tokio::select! {
        biased;
        grund = warte_auf_abbruch(abbruch_rx, sequenz) => return Titelende::Abgebrochen(grund),
        ergebnis = AssertUnwindSafe(factory.construct(track.locator())).catch_unwind() => match ergebnis {
            Ok(Ok(pipeline)) => pipeline,
            Ok(Err(e)) => return Titelende::StartFehlgeschlagen(e),
            Err(panik) => return Titelende::StartFehlgeschlagen(PipelineError::Panik(panik_text(panik))),
        },
    };

    let mut pipeline = PipelineGuard::neu(player.guild_id().clone(), pipeline);
    player.pipeline_aktiv_setzen(generation, sequenz);

    let ende = loop {
        tokio::select! {
            biased;
            grund = warte_auf_abbruch(abbruch_rx, sequenz) => break Titelende::Abgebrochen(grund),
            schritt = AssertUnwindSafe(frame_schritt(player, generation, &mut pipeline)).catch_unwind() => match schritt {
                Ok(Schritt::Weiter) => {}
                Ok(Schritt::Ende(ende)) => break ende,
                Err(panik) => break Titelende::Lesefehler(PipelineError::Panik(panik_text(panik))),
            },
        }
    };

    pipeline.abbauen().await;
    ende
}

/// Liest einen Frame und uebergibt ihn an den aktuellen Transport
async fn frame_schritt(
    player: &GuildPlayer,
    generation: u64,
    pipeline: &mut PipelineGuard,
) -> Schritt {
    let frame = match pipeline.next_frame().await {
        Ok(NextFrame::Frame(frame)) => frame,
        Ok(NextFrame::EndOfStream) => return Schritt::Ende(Titelende::Beendet),
        Err(e) => return Schritt::Ende(Titelende::Lesefehler(e)),
    };

    // Pro Frame neu holen: connect kann den Transport zwischendurch tauschen
    let Some(transport) = player.transport_fuer(generation) else {
        let ende = if player.ist_abgeloest(generation) {
            Titelende::Abgeloest
        } else {
            Titelende::TransportGeschlossen
        };
        return Schritt::Ende(ende);
    };

    let metriken = &player.kontext().metriken;
    match transport.frame_senden(frame).await {
        Ok(SendeErgebnis::Gesendet) => metriken.frames_sent.inc(),
        Ok(SendeErgebnis::Verworfen) => {
            metriken.frames_dropped.inc();
            if !transport.ist_bereit() {
                tracing::trace!(guild = %player.guild_id(), "Transport nicht bereit, Frame verworfen");
                // Verworfene Frames im Echtzeit-Takt verbrauchen
                tokio::time::sleep(frame_dauer()).await;
            }
        }
        Err(e) => {
            tracing::debug!(guild = %player.guild_id(), fehler = %e, "Frame nicht zustellbar");
            player.transport_verloren(generation, &transport);
            return Schritt::Ende(Titelende::TransportGeschlossen);
        }
    }
    Schritt::Weiter
}

fn panik_text(panik: Box<dyn Any + Send>) -> String {
    if let Some(text) = panik.downcast_ref::<&'static str>() {
        return (*text).to_string();
    }
    if let Some(text) = panik.downcast_ref::<String>() {
        return text.clone();
    }
    "unbekannte Panic-Ursache".to_string()
}

/// Wartet auf einen Abbruch fuer genau diesen Titel
///
/// Ein geschlossener Kanal (Player getrennt) zaehlt als Trennung.
async fn warte_auf_abbruch(abbruch_rx: &mut mpsc::Receiver<Abbruch>, sequenz: u64) -> AbbruchGrund {
    loop {
        match abbruch_rx.recv().await {
            Some(abbruch) if abbruch.sequenz == sequenz => return abbruch.grund,
            Some(_) => continue,
            None => return AbbruchGrund::Trennung,
        }
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Besitzt die Pipeline eines Titels und baut sie genau einmal ab
struct PipelineGuard {
    guild_id: GuildId,
    pipeline: Option<Box<dyn TranscodePipeline>>,
}

impl PipelineGuard {
    fn neu(guild_id: GuildId, pipeline: Box<dyn TranscodePipeline>) -> Self {
        Self {
            guild_id,
            pipeline: Some(pipeline),
        }
    }

    async fn next_frame(&mut self) -> PipelineResult<NextFrame> {
        match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.next_frame().await,
            None => Err(PipelineError::Abgebaut),
        }
    }

    async fn abbauen(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(panik) = AssertUnwindSafe(pipeline.teardown()).catch_unwind().await {
                tracing::error!(
                    guild = %self.guild_id,
                    fehler = %panik_text(panik),
                    "Teardown der Pipeline abgestuerzt"
                );
            }
        }
    }
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        // Nur bei abgebrochenem Task: Kindprozesse sterben per kill_on_drop
        if self.pipeline.is_some() {
            tracing::warn!(guild = %self.guild_id, "Pipeline ohne Teardown verworfen");
        }
    }
}

/// Haelt Gauge und Player-Zustand konsistent, egal wie die Schleife endet
struct SchleifenWaechter {
    player: Arc<GuildPlayer>,
    generation: u64,
}

impl Drop for SchleifenWaechter {
    fn drop(&mut self) {
        self.player.kontext().metriken.playback_loops_active.dec();
        if std::thread::panicking() {
            let neu_gestartet = self.player.schleife_abgestuerzt(self.generation);
            tracing::error!(
                guild = %self.player.guild_id(),
                neu_gestartet,
                "Wiedergabe-Schleife abgestuerzt"
            );
        } else {
            self.player.schleife_beendet(self.generation);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
