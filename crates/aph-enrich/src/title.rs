//! Title cleaning for search-based lookups.
//!
//! Search endpoints match best on a bare title: year suffixes, season/part
//! markers, and bracketed release junk all depress recall.

/// Strip year, season, part, and volume markers from a title.
pub fn clean_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut depth = 0usize;

    // Drop bracketed/parenthesized segments entirely.
    for ch in title.chars() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }

    let mut words: Vec<&str> = out.split_whitespace().collect();

    // Trailing bare year. The range is plausible release years, so a
    // futuristic title number ("Blade Runner 2049") survives.
    if let Some(last) = words.last() {
        if last.len() == 4 && last.chars().all(|c| c.is_ascii_digit()) {
            let year: u32 = last.parse().unwrap_or(0);
            if (1900..=2035).contains(&year) {
                words.pop();
            }
        }
    }

    // Trailing "<marker> <n>" pairs, repeatedly (e.g. "Season 2 Part 1").
    loop {
        let n = words.len();
        if n >= 2 {
            let marker = words[n - 2].to_ascii_lowercase();
            let ordinal = words[n - 1];
            let is_marker = matches!(
                marker.as_str(),
                "season" | "part" | "vol" | "vol." | "volume" | "cour"
            );
            let is_ordinal = ordinal.chars().all(|c| c.is_ascii_digit())
                || matches!(
                    ordinal.to_ascii_lowercase().as_str(),
                    "i" | "ii" | "iii" | "iv" | "v"
                );
            if is_marker && is_ordinal {
                words.truncate(n - 2);
                continue;
            }
        }
        break;
    }

    words
        .join(" ")
        .trim_end_matches([':', '-', '–', ','])
        .trim()
        .to_string()
}

/// Search variants for a title, most specific first.
///
/// Includes the cleaned title and, when a subtitle separator is present,
/// the portion before it.
pub fn title_variants(title: &str) -> Vec<String> {
    let cleaned = clean_title(title);
    let mut variants = vec![cleaned.clone()];

    for sep in [":", " - ", "–"] {
        if let Some((head, _)) = cleaned.split_once(sep) {
            let head = head.trim().to_string();
            if !head.is_empty() && !variants.contains(&head) {
                variants.push(head);
            }
        }
    }

    variants.retain(|v| !v.is_empty());
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_year() {
        assert_eq!(clean_title("The Matrix (1999)"), "The Matrix");
        assert_eq!(clean_title("The Matrix 1999"), "The Matrix");
        // A non-year trailing number survives.
        assert_eq!(clean_title("Blade Runner 2049"), "Blade Runner 2049");
    }

    #[test]
    fn strips_season_part_volume() {
        assert_eq!(clean_title("Spy x Family Season 2"), "Spy x Family");
        assert_eq!(clean_title("Attack on Titan Part 2"), "Attack on Titan");
        assert_eq!(clean_title("Monogatari Vol 3"), "Monogatari");
        assert_eq!(
            clean_title("Re:Zero Season 2 Part 1"),
            "Re:Zero"
        );
    }

    #[test]
    fn strips_bracketed_junk() {
        assert_eq!(clean_title("Akira [Remastered] (1988)"), "Akira");
    }

    #[test]
    fn untouched_title_is_stable() {
        assert_eq!(
            clean_title("Aharen-san wa Hakarenai"),
            "Aharen-san wa Hakarenai"
        );
    }

    #[test]
    fn variants_split_subtitle() {
        let v = title_variants("Demon Slayer: Kimetsu no Yaiba (2019)");
        assert_eq!(
            v,
            vec![
                "Demon Slayer: Kimetsu no Yaiba".to_string(),
                "Demon Slayer".to_string()
            ]
        );
    }

    #[test]
    fn variants_dedupe() {
        let v = title_variants("Your Name");
        assert_eq!(v, vec!["Your Name".to_string()]);
    }
}
