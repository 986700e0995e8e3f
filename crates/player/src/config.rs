//! Konfiguration der Wiedergabe-Engine
//!
//! Wird vom Server als `[player]`-Abschnitt der TOML-Konfiguration geladen.
//! Alle Felder haben Standardwerte fuer `yt-dlp` + `ffmpeg`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::format::{ABTASTRATE, KANAELE};

/// Einstellungen fuer Transkodier-Pipeline und Transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Programm, das die Quelle holt und auf stdout schreibt
    pub fetcher_programm: String,
    /// Argumente fuer den Fetcher, der Locator wird hinten angehaengt
    pub fetcher_argumente: Vec<String>,
    /// Programm, das stdin in das feste Ausgabeformat umwandelt
    pub converter_programm: String,
    /// Vollstaendige Argumente fuer den Konverter
    pub converter_argumente: Vec<String>,
    /// stderr der Kindprozesse an den Server durchreichen
    pub prozess_stderr_anzeigen: bool,
    /// Maximale Wartezeit beim Einsammeln gekillter Prozesse
    pub abbau_timeout_ms: u64,
    /// Wartezeit auf den Exit-Status des Konverters nach Stream-Ende
    pub ende_pruefung_ms: u64,
    /// Maximale Wartezeit, bis ein Frame vom Transport angenommen wird
    pub sende_timeout_ms: u64,
    /// Groesse der Frame-Queue zum Transport (in Frames)
    pub transport_queue_groesse: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fetcher_programm: "yt-dlp".into(),
            fetcher_argumente: ["-f", "bestaudio", "-o", "-", "--quiet", "--no-warnings"]
                .map(String::from)
                .to_vec(),
            converter_programm: "ffmpeg".into(),
            converter_argumente: standard_converter_argumente(),
            prozess_stderr_anzeigen: false,
            abbau_timeout_ms: 2_000,
            ende_pruefung_ms: 250,
            sende_timeout_ms: 100,
            transport_queue_groesse: 16,
        }
    }
}

impl PlayerConfig {
    /// Argumente fuer den Fetcher inklusive Locator
    ///
    /// Locatoren, die mit `-` beginnen, werden hinter `--` gestellt, damit
    /// sie nicht als Option interpretiert werden.
    pub fn fetcher_argumente_fuer(&self, locator: &str) -> Vec<String> {
        let mut argumente = self.fetcher_argumente.clone();
        if locator.starts_with('-') {
            argumente.push("--".into());
        }
        argumente.push(locator.into());
        argumente
    }

    pub fn abbau_timeout(&self) -> Duration {
        Duration::from_millis(self.abbau_timeout_ms)
    }

    pub fn ende_pruefung(&self) -> Duration {
        Duration::from_millis(self.ende_pruefung_ms)
    }

    pub fn sende_timeout(&self) -> Duration {
        Duration::from_millis(self.sende_timeout_ms)
    }
}

/// ffmpeg-Aufruf fuer das feste Ausgabeformat (s16le, 48 kHz, Stereo)
fn standard_converter_argumente() -> Vec<String> {
    let abtastrate = ABTASTRATE.to_string();
    let kanaele = KANAELE.to_string();
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        "pipe:0",
        "-f",
        "s16le",
        "-ar",
        abtastrate.as_str(),
        "-ac",
        kanaele.as_str(),
        "pipe:1",
    ]
    .map(String::from)
    .to_vec()
}
