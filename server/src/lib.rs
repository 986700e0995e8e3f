//! luna-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod console;
pub mod sink;

use anyhow::Result;
use config::ServerConfig;
use console::Konsole;
use luna_observability::LunaMetrics;
use luna_player::{PlayerRegistry, ProcessPipelineFactory};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut die Registry mit echter Prozess-Pipeline
    pub fn registry_erstellen(&self, metriken: LunaMetrics) -> PlayerRegistry {
        let factory = ProcessPipelineFactory::neu(self.config.player.clone());
        PlayerRegistry::neu(Arc::new(factory), metriken)
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Player-Registry erstellen
    /// 2. Observability-Server starten (falls aktiviert)
    /// 3. Konsole auf stdin lesen
    /// 4. Bei Ctrl-C oder Ende von stdin alle Player trennen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            fetcher = %self.config.player.fetcher_programm,
            converter = %self.config.player.converter_programm,
            ausgabe = %self.config.ausgabe.verzeichnis.display(),
            "Server startet"
        );

        let metriken = LunaMetrics::neu()?;
        let registry = self.registry_erstellen(metriken.clone());

        if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let metriken = metriken.clone();
            tokio::spawn(async move {
                if let Err(e) = luna_observability::observability_server_starten(adresse, metriken).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let konsole = Konsole::neu(
            registry.clone(),
            self.config.player.clone(),
            self.config.ausgabe.verzeichnis.clone(),
        );

        let zeilen = stdin_lesen()?;
        tracing::info!("Server laeuft. Befehle auf stdin ('help'), Shutdown mit Ctrl-C");
        tokio::select! {
            _ = konsole_ausfuehren(&konsole, zeilen) => {
                tracing::info!("stdin geschlossen, Server wird beendet");
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
        }

        registry.alle_trennen();
        Ok(())
    }
}

/// Liest stdin auf einem eigenen Thread ausserhalb der Runtime
///
/// Der Thread endet mit stdin oder wenn der Empfaenger verworfen wird.
fn stdin_lesen() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("luna-stdin".into())
        .spawn(move || {
            use std::io::BufRead;
            for zeile in std::io::stdin().lock().lines() {
                let Ok(zeile) = zeile else { break };
                if tx.blocking_send(zeile).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Fuehrt Befehle aus, bis stdin geschlossen wird
async fn konsole_ausfuehren(konsole: &Konsole, mut zeilen: mpsc::Receiver<String>) {
    while let Some(zeile) = zeilen.recv().await {
        match konsole.zeile_ausfuehren(&zeile).await {
            Ok(Some(antwort)) => println!("{antwort}"),
            Ok(None) => {}
            Err(e) if e.ist_eingabefehler() => println!("{e}"),
            Err(e) => {
                tracing::error!(fehler = %e, befehl = %zeile, "Befehl fehlgeschlagen");
                println!("Fehler: {e}");
            }
        }
    }
}
