//! Series dominant-value election.
//!
//! A series is represented by the mode of its sampled episodes' attributes.
//! Ties break upward: the higher resolution class, the richer codec.

use std::collections::BTreeMap;

use aph_core::{AudioCodec, DynamicRange, ResolutionClass};

/// Per-episode attribute sample.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeSample {
    pub resolution: ResolutionClass,
    pub audio: Option<AudioCodec>,
    pub dynamic_range: DynamicRange,
}

/// Elected series-level attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesElection {
    pub resolution: ResolutionClass,
    pub audio: Option<AudioCodec>,
    pub dynamic_range: DynamicRange,
    pub sampled: usize,
}

/// Evenly spread `n` sample indices over `len` episodes.
///
/// Sampling across the whole run catches mid-series quality jumps that a
/// head-only sample would miss.
pub fn sample_indices(len: usize, n: usize) -> Vec<usize> {
    if len == 0 || n == 0 {
        return Vec::new();
    }
    if len <= n {
        return (0..len).collect();
    }
    (0..n).map(|i| i * len / n).collect()
}

/// Return the most frequent value; ties go to the larger (`Ord`) value.
fn mode<T: Ord + Copy>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_val, a_n), (b_val, b_n)| a_n.cmp(b_n).then(a_val.cmp(b_val)))
        .map(|(v, _)| v)
}

/// Elect series attributes from episode samples.
///
/// `hdr_any_episode` selects the OR election for dynamic range; when false,
/// each flag must hold for a strict majority of samples.
pub fn elect_series(samples: &[EpisodeSample], hdr_any_episode: bool) -> Option<SeriesElection> {
    if samples.is_empty() {
        return None;
    }

    let resolution = mode(samples.iter().map(|s| s.resolution))?;
    let audio = mode(samples.iter().filter_map(|s| s.audio));

    let dynamic_range = if hdr_any_episode {
        samples
            .iter()
            .map(|s| s.dynamic_range)
            .fold(DynamicRange::Sdr, DynamicRange::union)
    } else {
        let n = samples.len();
        let mut dv = 0usize;
        let mut hdr = 0usize;
        let mut plus = 0usize;
        for s in samples {
            let (d, h, p) = s.dynamic_range.flags();
            dv += d as usize;
            hdr += h as usize;
            plus += p as usize;
        }
        DynamicRange::from_flags(dv * 2 > n, hdr * 2 > n, plus * 2 > n)
    };

    Some(SeriesElection {
        resolution,
        audio,
        dynamic_range,
        sampled: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(
        resolution: ResolutionClass,
        audio: Option<AudioCodec>,
        dynamic_range: DynamicRange,
    ) -> EpisodeSample {
        EpisodeSample {
            resolution,
            audio,
            dynamic_range,
        }
    }

    #[test]
    fn majority_wins() {
        // 4 episodes at 1080p/EAC3, 1 at 720p/AAC, HDR on one episode.
        let samples = vec![
            sample(ResolutionClass::R1080p, Some(AudioCodec::Eac3), DynamicRange::Sdr),
            sample(ResolutionClass::R1080p, Some(AudioCodec::Eac3), DynamicRange::Hdr),
            sample(ResolutionClass::R1080p, Some(AudioCodec::Eac3), DynamicRange::Sdr),
            sample(ResolutionClass::R1080p, Some(AudioCodec::Eac3), DynamicRange::Sdr),
            sample(ResolutionClass::R720p, Some(AudioCodec::Aac), DynamicRange::Sdr),
        ];
        let elected = elect_series(&samples, true).unwrap();
        assert_eq!(elected.resolution, ResolutionClass::R1080p);
        assert_eq!(elected.audio, Some(AudioCodec::Eac3));
        assert_eq!(elected.dynamic_range, DynamicRange::Hdr);
        assert_eq!(elected.sampled, 5);
    }

    #[test]
    fn resolution_tie_breaks_higher() {
        let samples = vec![
            sample(ResolutionClass::R720p, None, DynamicRange::Sdr),
            sample(ResolutionClass::R1080p, None, DynamicRange::Sdr),
        ];
        let elected = elect_series(&samples, true).unwrap();
        assert_eq!(elected.resolution, ResolutionClass::R1080p);
    }

    #[test]
    fn codec_tie_breaks_richer() {
        let samples = vec![
            sample(ResolutionClass::R1080p, Some(AudioCodec::Ac3), DynamicRange::Sdr),
            sample(ResolutionClass::R1080p, Some(AudioCodec::TrueHd), DynamicRange::Sdr),
        ];
        let elected = elect_series(&samples, true).unwrap();
        assert_eq!(elected.audio, Some(AudioCodec::TrueHd));
    }

    #[test]
    fn episodes_without_audio_do_not_block_election() {
        let samples = vec![
            sample(ResolutionClass::R1080p, None, DynamicRange::Sdr),
            sample(ResolutionClass::R1080p, Some(AudioCodec::Aac), DynamicRange::Sdr),
        ];
        let elected = elect_series(&samples, true).unwrap();
        assert_eq!(elected.audio, Some(AudioCodec::Aac));
    }

    #[test]
    fn majority_hdr_policy() {
        let samples = vec![
            sample(ResolutionClass::R4k, None, DynamicRange::Hdr),
            sample(ResolutionClass::R4k, None, DynamicRange::Sdr),
            sample(ResolutionClass::R4k, None, DynamicRange::Sdr),
        ];
        // OR policy: single HDR episode flips the series.
        assert_eq!(
            elect_series(&samples, true).unwrap().dynamic_range,
            DynamicRange::Hdr
        );
        // Majority policy: 1 of 3 is not enough.
        assert_eq!(
            elect_series(&samples, false).unwrap().dynamic_range,
            DynamicRange::Sdr
        );
    }

    #[test]
    fn empty_samples_elect_nothing() {
        assert!(elect_series(&[], true).is_none());
    }

    #[test]
    fn sample_indices_spread() {
        assert_eq!(sample_indices(10, 5), vec![0, 2, 4, 6, 8]);
        assert_eq!(sample_indices(3, 5), vec![0, 1, 2]);
        assert_eq!(sample_indices(0, 5), Vec::<usize>::new());
        assert_eq!(sample_indices(100, 4), vec![0, 25, 50, 75]);
    }
}
