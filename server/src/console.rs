//! Konsole – zeilenbasierte Befehlsschicht ueber der Player-Registry
//!
//! Befehle:
//! ```text
//! join <guild>                 Transport + Datei-Senke verbinden
//! play <guild> <url> [titel]   Titel einreihen
//! skip <guild>                 Aktuellen Titel ueberspringen
//! stop <guild>                 Warteschlange leeren und stoppen
//! queue <guild>                Warteschlange anzeigen
//! np <guild>                   Aktuellen Titel anzeigen
//! leave <guild>                Trennen
//! status                       Alle Ziele anzeigen
//! help                         Diese Hilfe
//! ```

use luna_core::{GuildId, LunaError};
use luna_player::{ChannelTransport, PlayerConfig, PlayerRegistry, PlayerStatus, Track};
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::sink;

/// Ein geparster Konsolen-Befehl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    Join(GuildId),
    Play {
        guild: GuildId,
        locator: String,
        titel: Option<String>,
    },
    Skip(GuildId),
    Stop(GuildId),
    Queue(GuildId),
    NowPlaying(GuildId),
    Leave(GuildId),
    Status,
    Hilfe,
}

/// Parst eine Eingabezeile, leere Zeilen ergeben `None`
pub fn parse(zeile: &str) -> luna_core::Result<Option<Befehl>> {
    let mut teile = zeile.split_whitespace();
    let Some(name) = teile.next() else {
        return Ok(None);
    };
    let name = name.to_ascii_lowercase();

    let befehl = match name.as_str() {
        "join" => Befehl::Join(guild(&mut teile, "join")?),
        "play" => {
            let guild = guild(&mut teile, "play")?;
            let locator = teile.next().ok_or_else(|| fehlt("play", "url"))?.to_string();
            let rest: Vec<&str> = teile.collect();
            let titel = (!rest.is_empty()).then(|| rest.join(" "));
            Befehl::Play {
                guild,
                locator,
                titel,
            }
        }
        "skip" => Befehl::Skip(guild(&mut teile, "skip")?),
        "stop" => Befehl::Stop(guild(&mut teile, "stop")?),
        "queue" | "q" => Befehl::Queue(guild(&mut teile, "queue")?),
        "np" => Befehl::NowPlaying(guild(&mut teile, "np")?),
        "leave" => Befehl::Leave(guild(&mut teile, "leave")?),
        "status" => Befehl::Status,
        "help" | "hilfe" => Befehl::Hilfe,
        anders => return Err(LunaError::UnbekannterBefehl(anders.to_string())),
    };
    Ok(Some(befehl))
}

fn guild<'a>(teile: &mut impl Iterator<Item = &'a str>, befehl: &str) -> luna_core::Result<GuildId> {
    teile
        .next()
        .map(GuildId::from)
        .ok_or_else(|| fehlt(befehl, "guild"))
}

fn fehlt(befehl: &str, argument: &str) -> LunaError {
    LunaError::FehlendesArgument {
        befehl: befehl.into(),
        argument: argument.into(),
    }
}

// ---------------------------------------------------------------------------
// Konsole
// ---------------------------------------------------------------------------

/// Fuehrt Befehle gegen die Registry aus und formatiert die Antwort
#[derive(Clone)]
pub struct Konsole {
    registry: PlayerRegistry,
    player_config: PlayerConfig,
    ausgabe_verzeichnis: PathBuf,
}

impl Konsole {
    pub fn neu(
        registry: PlayerRegistry,
        player_config: PlayerConfig,
        ausgabe_verzeichnis: PathBuf,
    ) -> Self {
        Self {
            registry,
            player_config,
            ausgabe_verzeichnis,
        }
    }

    /// Parst und fuehrt eine Zeile aus
    pub async fn zeile_ausfuehren(&self, zeile: &str) -> luna_core::Result<Option<String>> {
        match parse(zeile)? {
            Some(befehl) => self.ausfuehren(befehl).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn ausfuehren(&self, befehl: Befehl) -> luna_core::Result<String> {
        match befehl {
            Befehl::Join(guild) => self.verbinden(&guild).await,
            Befehl::Play {
                guild,
                locator,
                titel,
            } => {
                let titel = titel.unwrap_or_else(|| locator.clone());
                let track = Track::neu(locator, titel, "Konsole");
                let antwort = format!("Eingereiht: {track}");
                self.registry.enqueue(&guild, track);
                if self.registry.status(&guild).is_some_and(|s| s.verbunden) {
                    Ok(antwort)
                } else {
                    Ok(format!("{antwort} (wartet auf 'join {}')", guild.as_str()))
                }
            }
            Befehl::Skip(guild) => {
                self.verbunden_pruefen(&guild)?;
                Ok(if self.registry.skip(&guild) {
                    "Uebersprungen".into()
                } else {
                    "Es laeuft gerade nichts".into()
                })
            }
            Befehl::Stop(guild) => {
                self.registry.stop(&guild);
                Ok("Gestoppt, Warteschlange geleert".into())
            }
            Befehl::Queue(guild) => Ok(warteschlange_text(&self.registry.snapshot_queue(&guild))),
            Befehl::NowPlaying(guild) => Ok(match self.registry.now_playing(&guild) {
                Some(track) => format!("Laeuft: {track}"),
                None => "Es laeuft gerade nichts".into(),
            }),
            Befehl::Leave(guild) => {
                self.registry.disconnect(&guild);
                Ok(format!("{guild} getrennt"))
            }
            Befehl::Status => Ok(self.status_text()),
            Befehl::Hilfe => Ok(HILFE.into()),
        }
    }

    async fn verbinden(&self, guild: &GuildId) -> luna_core::Result<String> {
        let (transport, frames) = ChannelTransport::neu(
            self.player_config.transport_queue_groesse,
            self.player_config.sende_timeout(),
        );
        let (pfad, _senke) = sink::senke_starten(&self.ausgabe_verzeichnis, guild, frames).await?;
        self.registry.connect(guild, transport);
        Ok(format!("{guild} verbunden, Ausgabe nach {}", pfad.display()))
    }

    fn verbunden_pruefen(&self, guild: &GuildId) -> luna_core::Result<()> {
        match self.registry.status(guild) {
            Some(status) if status.verbunden => Ok(()),
            _ => Err(LunaError::NichtVerbunden(guild.to_string())),
        }
    }

    fn status_text(&self) -> String {
        let mut ziele = self.registry.ziele();
        if ziele.is_empty() {
            return "Keine Ziele bekannt".into();
        }
        ziele.sort();

        let mut text = String::new();
        for guild in ziele {
            if let Some(status) = self.registry.status(&guild) {
                let _ = writeln!(text, "{}", status_zeile(&status));
            }
        }
        text.trim_end().to_string()
    }
}

const HILFE: &str = "Befehle: join <guild> | play <guild> <url> [titel] | skip <guild> | \
stop <guild> | queue <guild> | np <guild> | leave <guild> | status";

fn warteschlange_text(titel: &[Track]) -> String {
    if titel.is_empty() {
        return "Warteschlange ist leer".into();
    }
    let mut text = String::new();
    for (i, track) in titel.iter().enumerate() {
        let _ = writeln!(text, "{}. {track}", i + 1);
    }
    text.trim_end().to_string()
}

fn status_zeile(status: &PlayerStatus) -> String {
    let zustand = match (status.verbunden, status.spielt, status.streamt) {
        (false, _, _) => "getrennt",
        (true, true, true) => "spielt",
        (true, true, false) => "startet",
        (true, false, _) => "bereit",
    };
    let titel = status
        .aktueller_titel
        .as_ref()
        .map(|t| format!(" [{t}]"))
        .unwrap_or_default();
    format!(
        "{}: {zustand}{titel}, {} wartend",
        status.guild_id, status.warteschlange
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use luna_observability::LunaMetrics;
    use luna_player::ProcessPipelineFactory;
    use std::sync::Arc;

    #[test]
    fn parse_leere_zeile() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn parse_play_mit_und_ohne_titel() {
        assert_eq!(
            parse("play g1 https://x/y").unwrap(),
            Some(Befehl::Play {
                guild: GuildId::from("g1"),
                locator: "https://x/y".into(),
                titel: None,
            })
        );
        assert_eq!(
            parse("PLAY g1 https://x/y Ein langer  Titel").unwrap(),
            Some(Befehl::Play {
                guild: GuildId::from("g1"),
                locator: "https://x/y".into(),
                titel: Some("Ein langer Titel".into()),
            })
        );
    }

    #[test]
    fn parse_einfache_befehle() {
        let g = GuildId::from("g");
        assert_eq!(parse("join g").unwrap(), Some(Befehl::Join(g.clone())));
        assert_eq!(parse("skip g").unwrap(), Some(Befehl::Skip(g.clone())));
        assert_eq!(parse("q g").unwrap(), Some(Befehl::Queue(g.clone())));
        assert_eq!(parse("np g").unwrap(), Some(Befehl::NowPlaying(g.clone())));
        assert_eq!(parse("leave g").unwrap(), Some(Befehl::Leave(g)));
        assert_eq!(parse("status").unwrap(), Some(Befehl::Status));
    }

    #[test]
    fn parse_fehler() {
        assert!(matches!(
            parse("tanz g"),
            Err(LunaError::UnbekannterBefehl(b)) if b == "tanz"
        ));
        assert!(matches!(
            parse("play g"),
            Err(LunaError::FehlendesArgument { argument, .. }) if argument == "url"
        ));
        assert!(matches!(
            parse("skip"),
            Err(LunaError::FehlendesArgument { argument, .. }) if argument == "guild"
        ));
    }

    #[test]
    fn warteschlange_formatierung() {
        assert_eq!(warteschlange_text(&[]), "Warteschlange ist leer");
        let titel = vec![Track::neu("u1", "Eins", "A"), Track::neu("u2", "Zwei", "")];
        assert_eq!(warteschlange_text(&titel), "1. Eins - A\n2. Zwei");
    }

    fn konsole(config: PlayerConfig, verzeichnis: PathBuf) -> Konsole {
        let registry = PlayerRegistry::neu(
            Arc::new(ProcessPipelineFactory::neu(config.clone())),
            LunaMetrics::neu().unwrap(),
        );
        Konsole::neu(registry, config, verzeichnis)
    }

    #[tokio::test]
    async fn play_ohne_join_wartet() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let k = konsole(PlayerConfig::default(), verzeichnis.path().to_path_buf());

        let antwort = k.zeile_ausfuehren("play g u1 Lied").await.unwrap().unwrap();
        assert!(antwort.contains("wartet auf 'join g'"));
        assert_eq!(
            k.zeile_ausfuehren("queue g").await.unwrap().unwrap(),
            "1. Lied - Konsole"
        );
        assert!(matches!(
            k.zeile_ausfuehren("skip g").await,
            Err(LunaError::NichtVerbunden(_))
        ));
        assert!(k
            .zeile_ausfuehren("status")
            .await
            .unwrap()
            .unwrap()
            .contains("getrennt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn join_play_schreibt_pcm_datei() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let config = PlayerConfig {
            fetcher_programm: "sh".into(),
            fetcher_argumente: vec!["-c".into(), "head -c 38400 /dev/zero".into()],
            converter_programm: "cat".into(),
            converter_argumente: vec![],
            ..Default::default()
        };
        let k = konsole(config, verzeichnis.path().to_path_buf());

        k.zeile_ausfuehren("join g").await.unwrap();
        k.zeile_ausfuehren("play g stille").await.unwrap();

        let pfad = verzeichnis.path().join("g.pcm");
        let start = std::time::Instant::now();
        loop {
            let fertig = k.registry.status(&GuildId::from("g")).is_some_and(|s| !s.spielt);
            if fertig {
                break;
            }
            assert!(start.elapsed() < std::time::Duration::from_secs(5), "Titel haengt");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        // Trennen schliesst die Senke, danach ist alles geschrieben
        k.zeile_ausfuehren("leave g").await.unwrap();
        let start = std::time::Instant::now();
        while std::fs::metadata(&pfad).map(|m| m.len()).unwrap_or(0) < 38_400 {
            assert!(start.elapsed() < std::time::Duration::from_secs(5), "Datei unvollstaendig");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::metadata(&pfad).unwrap().len(), 38_400);
    }
}
