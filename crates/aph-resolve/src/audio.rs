//! Primary audio codec detection.
//!
//! The primary track is the default-flagged audio stream; when the flag is
//! missing or ambiguous, the highest channel count wins. Codec tokens are
//! normalized by [`AudioCodec::from_stream`], which also honors Atmos and
//! DTS:X extension flags carried in stream titles/profiles.

use aph_catalog::MediaStream;
use aph_core::{AudioCodec, Provenance};

/// Detect the primary audio codec, recording the decision in provenance.
pub fn detect_audio(streams: &[MediaStream]) -> (Option<AudioCodec>, Provenance) {
    let mut provenance = Provenance::new();

    let audio: Vec<&MediaStream> = streams.iter().filter(|s| s.is_audio()).collect();
    if audio.is_empty() {
        provenance.record("audio", "no-audio-streams");
        return (None, provenance);
    }

    // Default-flagged tracks first; ties (or none flagged) go to the
    // highest channel count.
    let primary = audio
        .iter()
        .filter(|s| s.is_default)
        .max_by_key(|s| s.channels.unwrap_or(0))
        .or_else(|| audio.iter().max_by_key(|s| s.channels.unwrap_or(0)))
        .copied();

    let Some(stream) = primary else {
        provenance.record("audio", "no-primary-track");
        return (None, provenance);
    };

    let codec_token = stream.codec.as_deref().unwrap_or("");
    let title_hint = stream
        .title
        .as_deref()
        .or(stream.profile.as_deref());

    match AudioCodec::from_stream(codec_token, title_hint) {
        Some(codec) => {
            provenance.record(
                "audio",
                format!(
                    "stream:{codec_token}{}",
                    title_hint.map(|t| format!(" ({t})")).unwrap_or_default()
                ),
            );
            (Some(codec), provenance)
        }
        None => {
            provenance.record("audio", format!("unknown-token:{codec_token}"));
            (None, provenance)
        }
    }
}
