//! luna-player – Wiedergabe-Engine pro Voice-Ziel
//!
//! ```text
//! Befehlsschicht
//!     |  connect / enqueue / skip / stop / disconnect / snapshot_queue
//!     v
//! PlayerRegistry (DashMap<GuildId, Arc<GuildPlayer>>)
//!     |
//!     v
//! GuildPlayer (Queue, Transport, Flags hinter eigenem Lock)
//!     |  startet hoechstens eine
//!     v
//! Wiedergabe-Schleife --> TranscodePipeline (Fetcher | Konverter)
//!     |
//!     v
//! VoiceTransport (20-ms-Frames)
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
mod playback;
pub mod player;
pub mod process;
pub mod registry;
pub mod track;
pub mod transport;

pub use config::PlayerConfig;
pub use error::{PipelineError, PipelineResult, TransportError, TransportResult};
pub use pipeline::{Frame, NextFrame, PipelineFactory, TranscodePipeline};
pub use player::{GuildPlayer, PlayerStatus};
pub use process::{ProcessPipeline, ProcessPipelineFactory};
pub use registry::PlayerRegistry;
pub use track::Track;
pub use transport::{ChannelTransport, SendeErgebnis, VoiceTransport};
