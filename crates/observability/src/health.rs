//! Health-Check-Endpunkt fuer Luna
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Wiedergabe-Zustand

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::LunaMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_playbacks: i64,
    pub known_destinations: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub metriken: LunaMetrics,
}

impl HealthState {
    pub fn neu(metriken: LunaMetrics) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            metriken,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Baut die Antwort aus dem aktuellen Metrik-Stand
    ///
    /// Eine negative Schleifen-Anzahl kann nur durch einen Zaehlfehler
    /// entstehen und wird als `degraded` gemeldet.
    pub fn antwort(&self) -> HealthResponse {
        let aktiv = self.metriken.playback_loops_active.get();
        let status = if aktiv < 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            active_playbacks: aktiv,
            known_destinations: self.metriken.destinations_known.get(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();

    let http_status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK, // 200 auch bei degraded (Probe soll nicht failen)
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> HealthState {
        HealthState::neu(LunaMetrics::neu().unwrap())
    }

    #[test]
    fn health_state_frisch_erstellt() {
        let state = state();
        assert!(state.uptime_seconds() < 5);
        let antwort = state.antwort();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.active_playbacks, 0);
    }

    #[test]
    fn health_antwort_spiegelt_metriken() {
        let state = state();
        state.metriken.playback_loops_active.set(2);
        state.metriken.destinations_known.set(7);

        let antwort = state.antwort();
        assert_eq!(antwort.active_playbacks, 2);
        assert_eq!(antwort.known_destinations, 7);
    }

    #[test]
    fn health_negativer_zaehler_ist_degraded() {
        let state = state();
        state.metriken.playback_loops_active.dec();
        assert_eq!(state.antwort().status, HealthStatus::Degraded);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            active_playbacks: 1,
            known_destinations: 4,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"active_playbacks\":1"));
        assert!(json.contains("\"known_destinations\":4"));
    }

    #[test]
    fn health_response_deserialisierung() {
        let json = r#"{"status":"degraded","version":"0.1.0","uptime_seconds":100,"active_playbacks":0,"known_destinations":2}"#;
        let response: HealthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, HealthStatus::Degraded);
        assert_eq!(response.known_destinations, 2);
    }
}
