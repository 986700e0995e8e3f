//! Datei-Senke – Empfangsseite eines [`ChannelTransport`]
//!
//! Schreibt die Frames einer Guild im 20-ms-Takt nach `<verzeichnis>/<guild>.pcm`
//! (s16le, 48 kHz, Stereo; abspielbar z.B. mit `ffplay -f s16le -ar 48000 -ac 2`).
//! Durch den Takt staut sich die Frame-Queue wie bei einem echten Voice-Socket.
//!
//! [`ChannelTransport`]: luna_player::ChannelTransport

use luna_core::GuildId;
use luna_player::format::frame_dauer;
use luna_player::Frame;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Dateiname fuer eine Guild, nur `[A-Za-z0-9_-]`
pub fn dateiname(guild_id: &GuildId) -> String {
    let name: String = guild_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{name}.pcm")
}

/// Oeffnet die Zieldatei und startet den Schreib-Task
///
/// Der Task endet, wenn der Transport getrennt wird, und liefert die Anzahl
/// geschriebener Frames.
pub async fn senke_starten(
    verzeichnis: &Path,
    guild_id: &GuildId,
    frames: mpsc::Receiver<Frame>,
) -> luna_core::Result<(PathBuf, JoinHandle<luna_core::Result<u64>>)> {
    tokio::fs::create_dir_all(verzeichnis).await?;
    let pfad = verzeichnis.join(dateiname(guild_id));
    let datei = tokio::fs::File::create(&pfad).await?;

    tracing::debug!(guild = %guild_id, pfad = %pfad.display(), "Datei-Senke geoeffnet");
    let guild = guild_id.clone();
    let handle = tokio::spawn(async move {
        let ergebnis = frames_schreiben(datei, frames).await;
        match &ergebnis {
            Ok(anzahl) => tracing::info!(guild = %guild, frames = anzahl, "Datei-Senke geschlossen"),
            Err(e) => tracing::error!(guild = %guild, fehler = %e, "Datei-Senke abgebrochen"),
        }
        ergebnis
    });
    Ok((pfad, handle))
}

async fn frames_schreiben(
    datei: tokio::fs::File,
    mut frames: mpsc::Receiver<Frame>,
) -> luna_core::Result<u64> {
    let mut schreiber = tokio::io::BufWriter::new(datei);
    let mut takt = tokio::time::interval(frame_dauer());
    takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut anzahl = 0u64;
    while let Some(frame) = frames.recv().await {
        takt.tick().await;
        schreiber.write_all(&frame).await?;
        anzahl += 1;
    }
    schreiber.flush().await?;
    Ok(anzahl)
}
