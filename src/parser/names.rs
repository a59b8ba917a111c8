use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PROMO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bYoung Guns?\b").unwrap());
static ESCAPED_APOS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\+'").unwrap());

/// Canonical player name used for keys and storage:
/// `\'` → `'`, whitespace runs → one space, trimmed.
pub fn normalize(raw: &str) -> String {
    let unescaped = ESCAPED_APOS_RE.replace_all(raw, "'");
    collapse_whitespace(&unescaped)
}

/// 'Macklin Celebrini/Will Smith Young Gun' → 'Macklin Celebrini/Will Smith'.
/// Keeps multi-player names intact.
pub fn strip_promotional_suffix(raw: &str) -> String {
    let mut name = collapse_whitespace(raw);
    // Removal can join "Young" and "Gun" from either side of a match.
    while PROMO_RE.is_match(&name) {
        name = collapse_whitespace(&PROMO_RE.replace_all(&name, ""));
    }
    name
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s, " ").trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_young_guns() {
        assert_eq!(
            strip_promotional_suffix("Macklin Celebrini/Will Smith Young Gun"),
            "Macklin Celebrini/Will Smith"
        );
        assert_eq!(strip_promotional_suffix("Lane Hutson YOUNG GUNS"), "Lane Hutson");
        // Only whole words
        assert_eq!(strip_promotional_suffix("Young Gunnarsson"), "Young Gunnarsson");
    }

    #[test]
    fn unescapes_apostrophes() {
        assert_eq!(normalize("Drew O\\'Connor"), "Drew O'Connor");
        assert_eq!(normalize("Drew O'Connor"), "Drew O'Connor");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Connor \t  McDavid \n"), "Connor McDavid");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "Drew O\\'Connor",
            "  Sidney\t\tCrosby ",
            "O\\\\'Reilly",
            "Jean-Gabriel   Pageau\n",
            "Ryan O\\'Reilly Young Gun",
            "Young Young Gun Gun",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {:?}", s);
            let stripped = strip_promotional_suffix(s);
            assert_eq!(strip_promotional_suffix(&stripped), stripped, "input {:?}", s);
        }
    }
}
