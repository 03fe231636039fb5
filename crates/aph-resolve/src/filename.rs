//! Filename token scanning.
//!
//! Release names encode resolution and dynamic-range facts that streams
//! sometimes miss (or contradict). Tokens are matched between separator
//! characters so `x264` never reads as a resolution.

use std::sync::OnceLock;

use regex::Regex;

use aph_core::ResolutionClass;

/// Facts extracted from a file name or path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilenameSignals {
    pub resolution: Option<ResolutionClass>,
    pub dv: bool,
    pub hdr: bool,
    pub hdr_plus: bool,
}

impl FilenameSignals {
    pub fn any(&self) -> bool {
        self.resolution.is_some() || self.dv || self.hdr || self.hdr_plus
    }
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Split on the separators release names actually use.
        Regex::new(r"[\s._\-\[\]()]+").expect("static regex")
    })
}

/// Scan a file name (or full path) for resolution and HDR/DV tokens.
pub fn scan_filename(name: &str) -> FilenameSignals {
    let mut signals = FilenameSignals::default();

    let tokens: Vec<String> = token_re()
        .split(name)
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if let Some(class) = ResolutionClass::from_token(token) {
            signals.resolution = Some(signals.resolution.map_or(class, |r| r.max(class)));
            continue;
        }
        match token.as_str() {
            "hdr10+" | "hdr10plus" => signals.hdr_plus = true,
            "hdr" | "hdr10" | "hlg" => signals.hdr = true,
            "dv" | "dovi" | "dvhe" | "dvh1" => signals.dv = true,
            "dolby" => {
                // "Dolby Vision" spans two tokens; plain "Dolby" (Atmos,
                // Digital) must not trip the flag.
                if tokens.get(i + 1).map(String::as_str) == Some("vision") {
                    signals.dv = true;
                }
            }
            _ => {}
        }
    }

    signals
}
