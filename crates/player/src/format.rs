//! Festes Ausgabeformat der Transkodierung
//!
//! Der Konverter liefert immer 16-Bit-PCM (little endian), 48 kHz, Stereo.
//! Ein Frame entspricht 20 ms Audio.

use std::time::Duration;

/// Abtastrate in Hz
pub const ABTASTRATE: u32 = 48_000;
/// Kanalanzahl
pub const KANAELE: u16 = 2;
/// Bytes pro Sample (s16le)
pub const SAMPLE_BREITE: usize = 2;
/// Dauer eines Frames in Millisekunden
pub const FRAME_DAUER_MS: u64 = 20;
/// Samples pro Kanal und Frame
pub const SAMPLES_PRO_FRAME: usize = (ABTASTRATE as usize / 1000) * FRAME_DAUER_MS as usize;
/// Groesse eines Frames in Bytes
pub const FRAME_GROESSE: usize = SAMPLES_PRO_FRAME * KANAELE as usize * SAMPLE_BREITE;

/// Dauer eines Frames
pub const fn frame_dauer() -> Duration {
    Duration::from_millis(FRAME_DAUER_MS)
}

/// Anzahl Frames fuer eine gegebene Spieldauer (abgerundet)
pub fn frames_fuer(dauer: Duration) -> usize {
    (dauer.as_millis() / FRAME_DAUER_MS as u128) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_groesse_entspricht_20ms_stereo_s16() {
        assert_eq!(SAMPLES_PRO_FRAME, 960);
        assert_eq!(FRAME_GROESSE, 3840);
    }

    #[test]
    fn frames_pro_sekunde() {
        assert_eq!(frames_fuer(Duration::from_secs(1)), 50);
        assert_eq!(frames_fuer(Duration::from_millis(39)), 1);
        assert_eq!(frames_fuer(Duration::ZERO), 0);
    }
}
