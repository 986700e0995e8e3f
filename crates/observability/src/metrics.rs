//! Prometheus-kompatible Metriken fuer Luna
//!
//! Registrierte Metriken:
//! - `luna_tracks_started_total` – Counter: Vom Player beanspruchte Titel
//! - `luna_tracks_finished_total` – Counter: Sauber zu Ende gespielte Titel
//! - `luna_tracks_cancelled_total` – Counter: Per Skip/Stop/Trennung abgebrochene Titel
//! - `luna_tracks_failed_total` – Counter (phase=start|stream): Fehlgeschlagene Titel
//! - `luna_frames_sent_total` – Counter: An den Transport uebergebene Frames
//! - `luna_frames_dropped_total` – Counter: Verworfene Frames (Transport nicht bereit)
//! - `luna_playback_loops_active` – Gauge: Laufende Wiedergabe-Schleifen
//! - `luna_destinations_known` – Gauge: Bekannte Wiedergabe-Ziele in der Registry

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Phase, in der ein Titel gescheitert ist (Label von `luna_tracks_failed_total`)
pub const PHASE_START: &str = "start";
/// Abbruch waehrend des Streamens
pub const PHASE_STREAM: &str = "stream";

/// Alle Luna-Prometheus-Metriken
///
/// `Clone` teilt die zugrundeliegenden Zaehler.
#[derive(Clone)]
pub struct LunaMetrics {
    pub registry: Arc<Registry>,

    // Titel
    pub tracks_started: IntCounter,
    pub tracks_finished: IntCounter,
    pub tracks_cancelled: IntCounter,
    pub tracks_failed: IntCounterVec,

    // Frames
    pub frames_sent: IntCounter,
    pub frames_dropped: IntCounter,

    // Zustand
    pub playback_loops_active: IntGauge,
    pub destinations_known: IntGauge,
}

impl LunaMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let tracks_started = IntCounter::with_opts(Opts::new(
            "luna_tracks_started_total",
            "Anzahl vom Player beanspruchter Titel",
        ))?;
        registry.register(Box::new(tracks_started.clone()))?;

        let tracks_finished = IntCounter::with_opts(Opts::new(
            "luna_tracks_finished_total",
            "Anzahl vollstaendig abgespielter Titel",
        ))?;
        registry.register(Box::new(tracks_finished.clone()))?;

        let tracks_cancelled = IntCounter::with_opts(Opts::new(
            "luna_tracks_cancelled_total",
            "Anzahl per Skip, Stop oder Trennung abgebrochener Titel",
        ))?;
        registry.register(Box::new(tracks_cancelled.clone()))?;

        let tracks_failed = IntCounterVec::new(
            Opts::new(
                "luna_tracks_failed_total",
                "Anzahl fehlgeschlagener Titel nach Phase",
            ),
            &["phase"],
        )?;
        registry.register(Box::new(tracks_failed.clone()))?;

        let frames_sent = IntCounter::with_opts(Opts::new(
            "luna_frames_sent_total",
            "Anzahl an den Voice-Transport uebergebener Frames",
        ))?;
        registry.register(Box::new(frames_sent.clone()))?;

        let frames_dropped = IntCounter::with_opts(Opts::new(
            "luna_frames_dropped_total",
            "Anzahl verworfener Frames (Transport nicht bereit oder ueberlastet)",
        ))?;
        registry.register(Box::new(frames_dropped.clone()))?;

        let playback_loops_active = IntGauge::with_opts(Opts::new(
            "luna_playback_loops_active",
            "Anzahl laufender Wiedergabe-Schleifen",
        ))?;
        registry.register(Box::new(playback_loops_active.clone()))?;

        let destinations_known = IntGauge::with_opts(Opts::new(
            "luna_destinations_known",
            "Anzahl bekannter Wiedergabe-Ziele",
        ))?;
        registry.register(Box::new(destinations_known.clone()))?;

        // Beide Label-Werte vorbelegen, damit sie schon vor dem ersten Fehler exportiert werden
        tracks_failed.with_label_values(&[PHASE_START]);
        tracks_failed.with_label_values(&[PHASE_STREAM]);

        Ok(Self {
            registry: Arc::new(registry),
            tracks_started,
            tracks_finished,
            tracks_cancelled,
            tracks_failed,
            frames_sent,
            frames_dropped,
            playback_loops_active,
            destinations_known,
        })
    }

    /// Zaehlt einen Titel, dessen Pipeline nicht gestartet werden konnte
    pub fn start_fehlgeschlagen(&self) {
        self.tracks_failed.with_label_values(&[PHASE_START]).inc();
    }

    /// Zaehlt einen Titel, der mitten im Stream abgebrochen ist
    pub fn stream_fehlgeschlagen(&self) {
        self.tracks_failed.with_label_values(&[PHASE_STREAM]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: LunaMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<LunaMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
