//! Width-primary resolution classification.
//!
//! Width is invariant to the letterboxing that depresses height: a
//! 1280x536 scope-ratio encode is still 720p material. Height-secondary
//! thresholds catch slightly-cropped encodes just under each width gate.

use aph_core::config::ConflictPolicy;
use aph_core::{DynamicRange, Provenance, ResolutionClass};
use aph_catalog::MediaStream;

use crate::filename::FilenameSignals;

/// Classify stream dimensions into a resolution class.
pub fn classify_dimensions(width: u32, height: u32) -> ResolutionClass {
    if width >= 3840 || (width >= 3600 && height >= 1500) {
        ResolutionClass::R4k
    } else if width >= 1920 || (width >= 1800 && height >= 800) {
        ResolutionClass::R1080p
    } else if width >= 1280 || (width >= 1200 && height >= 400) {
        ResolutionClass::R720p
    } else if width >= 960 {
        ResolutionClass::R576p
    } else {
        ResolutionClass::R480p
    }
}

/// Outcome of resolution + dynamic-range detection for one item.
#[derive(Debug, Clone)]
pub struct ResolutionDetection {
    pub class: ResolutionClass,
    pub dynamic_range: DynamicRange,
    pub provenance: Provenance,
}

/// Extract HDR/DV flags from stream color metadata.
fn stream_range_flags(stream: &MediaStream) -> (bool, bool, bool) {
    let mut dv = false;
    let mut hdr = false;
    let mut hdr_plus = false;

    if let Some(range_type) = stream.video_range_type.as_deref() {
        let t = range_type.to_ascii_lowercase();
        if t.contains("dovi") || t.contains("dolbyvision") {
            dv = true;
        }
        if t.contains("hdr10plus") || t.contains("hdr10+") {
            hdr_plus = true;
        } else if t.contains("hdr") || t.contains("hlg") {
            hdr = true;
        }
    }
    if let Some(range) = stream.video_range.as_deref() {
        if range.eq_ignore_ascii_case("hdr") {
            hdr = true;
        }
    }

    (dv, hdr, hdr_plus)
}

/// Detect resolution class and dynamic range from streams plus filename
/// signals, recording both observations in provenance.
pub fn detect_resolution(
    streams: &[MediaStream],
    signals: FilenameSignals,
    policy: ConflictPolicy,
) -> ResolutionDetection {
    let mut provenance = Provenance::new();

    let video = streams.iter().find(|s| s.is_video());
    let stream_class = video.and_then(|s| match (s.width, s.height) {
        (Some(w), Some(h)) => {
            provenance.record("resolution", format!("stream:{w}x{h}"));
            Some(classify_dimensions(w, h))
        }
        _ => None,
    });

    if let Some(class) = signals.resolution {
        provenance.record("resolution", format!("filename:{class}"));
    }

    let class = match (stream_class, signals.resolution) {
        (Some(stream), Some(name)) if stream != name => {
            let chosen = match policy {
                ConflictPolicy::Higher => stream.max(name),
                ConflictPolicy::PreferFilename => name,
            };
            provenance.record(
                "resolution",
                format!("conflict:stream={stream},filename={name},chose={chosen}"),
            );
            chosen
        }
        (Some(stream), _) => stream,
        (None, Some(name)) => name,
        (None, None) => {
            provenance.record("resolution", "default:480p");
            ResolutionClass::R480p
        }
    };

    // HDR/DV flags OR-combined across filename tokens and stream metadata.
    let (mut dv, mut hdr, mut hdr_plus) = video.map(stream_range_flags).unwrap_or_default();
    if dv || hdr || hdr_plus {
        provenance.record("dynamic_range", "stream:color-metadata");
    }
    if signals.dv || signals.hdr || signals.hdr_plus {
        provenance.record("dynamic_range", "filename:tokens");
    }
    dv |= signals.dv;
    hdr |= signals.hdr;
    hdr_plus |= signals.hdr_plus;

    ResolutionDetection {
        class,
        dynamic_range: DynamicRange::from_flags(dv, hdr, hdr_plus),
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::scan_filename;

    fn video_stream(width: u32, height: u32) -> MediaStream {
        let json = format!(
            r#"{{"Type": "Video", "Width": {width}, "Height": {height}}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    fn hdr_stream(width: u32, height: u32, range_type: &str) -> MediaStream {
        let json = format!(
            r#"{{"Type": "Video", "Width": {width}, "Height": {height},
                 "VideoRange": "HDR", "VideoRangeType": "{range_type}"}}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn width_primary_thresholds() {
        assert_eq!(classify_dimensions(3840, 2160), ResolutionClass::R4k);
        assert_eq!(classify_dimensions(3840, 1600), ResolutionClass::R4k);
        assert_eq!(classify_dimensions(3620, 1520), ResolutionClass::R4k);
        assert_eq!(classify_dimensions(1920, 1080), ResolutionClass::R1080p);
        assert_eq!(classify_dimensions(1808, 812), ResolutionClass::R1080p);
        assert_eq!(classify_dimensions(1280, 720), ResolutionClass::R720p);
        assert_eq!(classify_dimensions(1216, 500), ResolutionClass::R720p);
        assert_eq!(classify_dimensions(960, 540), ResolutionClass::R576p);
        assert_eq!(classify_dimensions(720, 480), ResolutionClass::R480p);
    }

    #[test]
    fn letterboxed_720p() {
        // 1280x536 scope ratio must not be demoted by its height.
        assert_eq!(classify_dimensions(1280, 536), ResolutionClass::R720p);
    }

    #[test]
    fn stream_only_detection() {
        let streams = vec![video_stream(1920, 1080)];
        let det = detect_resolution(&streams, FilenameSignals::default(), ConflictPolicy::Higher);
        assert_eq!(det.class, ResolutionClass::R1080p);
        assert_eq!(det.dynamic_range, DynamicRange::Sdr);
        assert!(det.provenance.contains("resolution", "stream:1920x1080"));
    }

    #[test]
    fn conflict_default_takes_higher() {
        let streams = vec![video_stream(1920, 1080)];
        let signals = scan_filename("Movie.2160p.mkv");
        let det = detect_resolution(&streams, signals, ConflictPolicy::Higher);
        assert_eq!(det.class, ResolutionClass::R4k);
        assert!(det.provenance.contains("resolution", "conflict:"));
    }

    #[test]
    fn conflict_prefer_filename() {
        let streams = vec![video_stream(3840, 2160)];
        let signals = scan_filename("Movie.1080p.mkv");
        let det = detect_resolution(&streams, signals, ConflictPolicy::PreferFilename);
        assert_eq!(det.class, ResolutionClass::R1080p);
    }

    #[test]
    fn hdr_from_stream_metadata() {
        let streams = vec![hdr_stream(3840, 2160, "HDR10")];
        let det = detect_resolution(&streams, FilenameSignals::default(), ConflictPolicy::Higher);
        assert_eq!(det.dynamic_range, DynamicRange::Hdr);
    }

    #[test]
    fn dv_with_hdr_combines() {
        let streams = vec![hdr_stream(3840, 2160, "DOVIWithHDR10")];
        let det = detect_resolution(&streams, FilenameSignals::default(), ConflictPolicy::Higher);
        assert_eq!(det.dynamic_range, DynamicRange::DvHdr);
    }

    #[test]
    fn flags_or_combined_with_filename() {
        // SDR stream but DV in the filename.
        let streams = vec![video_stream(3840, 2160)];
        let signals = scan_filename("Movie.2160p.DV.mkv");
        let det = detect_resolution(&streams, signals, ConflictPolicy::Higher);
        assert_eq!(det.dynamic_range, DynamicRange::Dv);
    }

    #[test]
    fn hdr_below_4k_is_allowed() {
        let streams = vec![hdr_stream(1920, 1080, "HLG")];
        let det = detect_resolution(&streams, FilenameSignals::default(), ConflictPolicy::Higher);
        assert_eq!(det.class, ResolutionClass::R1080p);
        assert_eq!(det.dynamic_range, DynamicRange::Hdr);
    }

    #[test]
    fn no_information_defaults_low() {
        let det = detect_resolution(&[], FilenameSignals::default(), ConflictPolicy::Higher);
        assert_eq!(det.class, ResolutionClass::R480p);
        assert!(det.provenance.contains("resolution", "default"));
    }
}
