//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use luna_player::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "LUNA_CONFIG";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Wiedergabe-Engine (Fetcher, Konverter, Timeouts)
    pub player: PlayerConfig,
    /// Ziel der Datei-Senke
    pub ausgabe: AusgabeEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Luna".into(),
        }
    }
}

/// Datei-Senke: wohin die Frames einer Guild geschrieben werden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AusgabeEinstellungen {
    /// Verzeichnis fuer `<guild>.pcm`-Dateien
    pub verzeichnis: PathBuf,
}

impl Default for AusgabeEinstellungen {
    fn default() -> Self {
        Self {
            verzeichnis: PathBuf::from("ausgabe"),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Filter: "trace", "debug", "info", "warn", "error" oder Direktiven
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Bind-Adresse fuer Metriken und Health
    pub bind_adresse: String,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Pfad aus `LUNA_CONFIG`, Standard `config.toml`
    pub fn pfad_aus_umgebung() -> String {
        std::env::var(ENV_CONFIG).unwrap_or_else(|_| "config.toml".into())
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> luna_core::Result<SocketAddr> {
        let adresse = format!(
            "{}:{}",
            self.observability.bind_adresse, self.observability.port
        );
        adresse.parse().map_err(|e| {
            luna_core::LunaError::Konfiguration(format!(
                "Ungueltige Observability-Adresse '{adresse}': {e}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.name, "Luna");
        assert_eq!(cfg.player.fetcher_programm, "yt-dlp");
        assert_eq!(cfg.ausgabe.verzeichnis, PathBuf::from("ausgabe"));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.aktiviert);
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(
            cfg.observability_bind_adresse().unwrap(),
            "127.0.0.1:9300".parse::<SocketAddr>().unwrap()
        );

        let mut kaputt = ServerConfig::default();
        kaputt.observability.bind_adresse = "kein host".into();
        assert!(matches!(
            kaputt.observability_bind_adresse(),
            Err(luna_core::LunaError::Konfiguration(_))
        ));
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Luna"

            [player]
            converter_programm = "/usr/bin/ffmpeg"
            abbau_timeout_ms = 500

            [ausgabe]
            verzeichnis = "/tmp/luna"

            [observability]
            port = 9400
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Luna");
        assert_eq!(cfg.player.converter_programm, "/usr/bin/ffmpeg");
        assert_eq!(cfg.player.abbau_timeout_ms, 500);
        assert_eq!(cfg.ausgabe.verzeichnis, PathBuf::from("/tmp/luna"));
        assert_eq!(cfg.observability.port, 9400);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.player.fetcher_programm, "yt-dlp");
        assert_eq!(cfg.observability.bind_adresse, "127.0.0.1");
        assert_eq!(cfg.logging.format, "text");
    }

    #[test]
    fn fehlende_datei_ergibt_standardwerte() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let pfad = verzeichnis.path().join("gibt-es-nicht.toml");
        let cfg = ServerConfig::laden(pfad.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.name, "Luna");
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[player\nfetcher_programm = ").unwrap();
        let ergebnis = ServerConfig::laden(datei.path().to_str().unwrap());
        let fehler = ergebnis.unwrap_err().to_string();
        assert!(fehler.contains("Konfigurationsfehler"));
    }

    #[test]
    fn datei_wird_geladen() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[logging]\nlevel = \"debug\"\nformat = \"json\"").unwrap();
        let cfg = ServerConfig::laden(datei.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
    }
}
