//! Player-Registry – ein [`GuildPlayer`] pro Guild, lazy erstellt
//!
//! Thread-safe durch DashMap. Die Map-Referenz wird nur fuer Lookup oder
//! Anlegen gehalten und vor jedem Zugriff auf einen Player freigegeben,
//! Registry- und Player-Lock sind so nie verschachtelt.

use dashmap::DashMap;
use luna_core::GuildId;
use luna_observability::LunaMetrics;
use std::sync::Arc;

use crate::pipeline::PipelineFactory;
use crate::player::{GuildPlayer, PlayerKontext, PlayerStatus};
use crate::track::Track;
use crate::transport::VoiceTransport;

/// Alle Player des Prozesses
///
/// `Clone` teilt die zugrundeliegende Map.
#[derive(Clone)]
pub struct PlayerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    kontext: Arc<PlayerKontext>,
}

impl PlayerRegistry {
    pub fn neu(factory: Arc<dyn PipelineFactory>, metriken: LunaMetrics) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                players: DashMap::new(),
                kontext: Arc::new(PlayerKontext { factory, metriken }),
            }),
        }
    }

    /// Liefert den Player der Guild, legt ihn bei Bedarf an
    ///
    /// Gleichzeitige Aufrufe fuer dieselbe Guild erhalten denselben Player.
    pub fn get_or_create(&self, guild_id: &GuildId) -> Arc<GuildPlayer> {
        if let Some(player) = self.inner.players.get(guild_id) {
            return Arc::clone(player.value());
        }

        let eintrag = self
            .inner
            .players
            .entry(guild_id.clone())
            .or_insert_with(|| {
                self.inner.kontext.metriken.destinations_known.inc();
                tracing::debug!(guild = %guild_id, "Player angelegt");
                Arc::new(GuildPlayer::mit_kontext(
                    guild_id.clone(),
                    Arc::clone(&self.inner.kontext),
                ))
            });
        Arc::clone(eintrag.value())
    }

    /// Player der Guild, ohne ihn anzulegen
    pub fn get(&self, guild_id: &GuildId) -> Option<Arc<GuildPlayer>> {
        self.inner
            .players
            .get(guild_id)
            .map(|player| Arc::clone(player.value()))
    }

    /// Alle bekannten Ziele
    pub fn ziele(&self) -> Vec<GuildId> {
        self.inner
            .players
            .iter()
            .map(|eintrag| eintrag.key().clone())
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.inner.players.len()
    }

    pub fn metriken(&self) -> &LunaMetrics {
        &self.inner.kontext.metriken
    }

    /// Trennt alle Player (Shutdown)
    pub fn alle_trennen(&self) {
        let players: Vec<Arc<GuildPlayer>> = self
            .inner
            .players
            .iter()
            .map(|eintrag| Arc::clone(eintrag.value()))
            .collect();

        for player in &players {
            player.disconnect();
        }
        tracing::info!(anzahl = players.len(), "Alle Player getrennt");
    }

    // -----------------------------------------------------------------------
    // Weiterleitungen fuer die Befehlsschicht
    // -----------------------------------------------------------------------

    pub fn connect(&self, guild_id: &GuildId, transport: Arc<dyn VoiceTransport>) {
        self.get_or_create(guild_id).connect(transport);
    }

    pub fn enqueue(&self, guild_id: &GuildId, track: Track) {
        self.get_or_create(guild_id).enqueue(track);
    }

    pub fn skip(&self, guild_id: &GuildId) -> bool {
        self.get(guild_id).is_some_and(|player| player.skip())
    }

    pub fn stop(&self, guild_id: &GuildId) {
        if let Some(player) = self.get(guild_id) {
            player.stop();
        }
    }

    pub fn disconnect(&self, guild_id: &GuildId) {
        if let Some(player) = self.get(guild_id) {
            player.disconnect();
        }
    }

    pub fn snapshot_queue(&self, guild_id: &GuildId) -> Vec<Track> {
        self.get(guild_id)
            .map(|player| player.snapshot_queue())
            .unwrap_or_default()
    }

    pub fn now_playing(&self, guild_id: &GuildId) -> Option<Track> {
        self.get(guild_id).and_then(|player| player.now_playing())
    }

    pub fn status(&self, guild_id: &GuildId) -> Option<PlayerStatus> {
        self.get(guild_id).map(|player| player.status())
    }
}

impl std::fmt::Debug for PlayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerRegistry")
            .field("anzahl", &self.anzahl())
            .finish()
    }
}
