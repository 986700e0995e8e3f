//! Prozess-Pipeline – Fetcher und Konverter als Kindprozesse
//!
//! ```text
//! Fetcher (yt-dlp, stdout)
//!     |
//!     v   OS-Pipe, kein Umkopieren im Prozess
//! Konverter (ffmpeg, stdin -> stdout)
//!     |
//!     v
//! next_frame(): read_exact(FRAME_GROESSE)
//! ```
//!
//! Beide Prozesse werden mit `kill_on_drop` gestartet. Wird eine Pipeline
//! ohne `teardown()` verworfen (z.B. beim Abbau der Runtime),
//! beendet tokio die Prozesse trotzdem.

use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use crate::config::PlayerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::format::FRAME_GROESSE;
use crate::pipeline::{NextFrame, PipelineFactory, TranscodePipeline};

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Startet fuer jeden Titel ein neues Prozesspaar laut [`PlayerConfig`]
#[derive(Debug, Clone)]
pub struct ProcessPipelineFactory {
    config: Arc<PlayerConfig>,
}

impl ProcessPipelineFactory {
    pub fn neu(config: PlayerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl PipelineFactory for ProcessPipelineFactory {
    async fn construct(&self, locator: &str) -> PipelineResult<Box<dyn TranscodePipeline>> {
        let pipeline = ProcessPipeline::starten(&self.config, locator)?;
        Ok(Box::new(pipeline))
    }
}

// ---------------------------------------------------------------------------
// ProcessPipeline
// ---------------------------------------------------------------------------

/// Laufendes Prozesspaar fuer einen Titel
#[derive(Debug)]
pub struct ProcessPipeline {
    fetcher: Option<Child>,
    converter: Option<Child>,
    ausgabe: Option<ChildStdout>,
    abbau_timeout: Duration,
    ende_pruefung: Duration,
}

impl ProcessPipeline {
    /// Startet Fetcher und Konverter und verbindet sie
    ///
    /// Scheitert der Konverter-Start, wird der bereits laufende Fetcher
    /// sofort gekillt.
    pub fn starten(config: &PlayerConfig, locator: &str) -> PipelineResult<Self> {
        let mut fetcher = Command::new(&config.fetcher_programm)
            .args(config.fetcher_argumente_fuer(locator))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr_ziel(config))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::start(&config.fetcher_programm, e))?;

        let fetcher_ausgabe = fetcher.stdout.take().ok_or_else(|| {
            PipelineError::start(
                &config.fetcher_programm,
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout nicht verfuegbar"),
            )
        })?;
        let converter_eingabe: Stdio = fetcher_ausgabe
            .try_into()
            .map_err(|e| PipelineError::start(&config.converter_programm, e))?;

        let mut converter = match Command::new(&config.converter_programm)
            .args(&config.converter_argumente)
            .stdin(converter_eingabe)
            .stdout(Stdio::piped())
            .stderr(stderr_ziel(config))
            .kill_on_drop(true)
            .spawn()
        {
            Ok(kind) => kind,
            Err(e) => {
                let _ = fetcher.start_kill();
                return Err(PipelineError::start(&config.converter_programm, e));
            }
        };

        let ausgabe = converter.stdout.take().ok_or_else(|| {
            PipelineError::start(
                &config.converter_programm,
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout nicht verfuegbar"),
            )
        })?;

        tracing::debug!(
            fetcher_pid = ?fetcher.id(),
            converter_pid = ?converter.id(),
            locator,
            "Pipeline gestartet"
        );

        Ok(Self {
            fetcher: Some(fetcher),
            converter: Some(converter),
            ausgabe: Some(ausgabe),
            abbau_timeout: config.abbau_timeout(),
            ende_pruefung: config.ende_pruefung(),
        })
    }

    /// Unterscheidet nach EOF zwischen sauberem Ende und Konverter-Absturz
    async fn ende_auswerten(&mut self) -> PipelineResult<NextFrame> {
        if let Some(converter) = self.converter.as_mut() {
            if let Ok(Ok(status)) = tokio::time::timeout(self.ende_pruefung, converter.wait()).await
            {
                if !status.success() {
                    return Err(PipelineError::KonverterFehlgeschlagen {
                        status: status.to_string(),
                    });
                }
            }
        }
        Ok(NextFrame::EndOfStream)
    }
}

#[async_trait]
impl TranscodePipeline for ProcessPipeline {
    async fn next_frame(&mut self) -> PipelineResult<NextFrame> {
        let ausgabe = self.ausgabe.as_mut().ok_or(PipelineError::Abgebaut)?;

        let mut puffer = vec![0u8; FRAME_GROESSE];
        match ausgabe.read_exact(&mut puffer).await {
            Ok(_) => Ok(NextFrame::Frame(Bytes::from(puffer))),
            // Kurzer oder leerer Rest am Stream-Ende
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => self.ende_auswerten().await,
            Err(e) => Err(PipelineError::Lesen(e)),
        }
    }

    async fn teardown(&mut self) {
        // Lesende Seite zuerst schliessen, damit der Konverter SIGPIPE bekommt
        self.ausgabe.take();

        let mut prozesse: Vec<(&str, Child)> = [
            ("converter", self.converter.take()),
            ("fetcher", self.fetcher.take()),
        ]
        .into_iter()
        .filter_map(|(rolle, kind)| kind.map(|kind| (rolle, kind)))
        .collect();

        // Erst beide killen, dann mit gemeinsamer Frist einsammeln
        for (_, kind) in prozesse.iter_mut() {
            // Fehler hier heisst: Prozess ist bereits beendet
            let _ = kind.start_kill();
        }
        let frist = tokio::time::Instant::now() + self.abbau_timeout;
        for (rolle, mut kind) in prozesse {
            match tokio::time::timeout_at(frist, kind.wait()).await {
                Ok(Ok(status)) => tracing::trace!(rolle, %status, "Prozess beendet"),
                Ok(Err(e)) => tracing::warn!(rolle, fehler = %e, "Prozess nicht einsammelbar"),
                Err(_) => tracing::warn!(
                    rolle,
                    timeout_ms = self.abbau_timeout.as_millis() as u64,
                    "Prozess reagiert nicht auf Kill"
                ),
            }
        }
    }
}

fn stderr_ziel(config: &PlayerConfig) -> Stdio {
    if config.prozess_stderr_anzeigen {
        Stdio::inherit()
    } else {
        Stdio::null()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
