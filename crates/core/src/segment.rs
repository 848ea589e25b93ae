//! Splits raw model output into displayable, independently speakable bullets.

/// Upper bound on bullets considered per turn. Surplus lines are discarded
/// for that turn, never carried over to a later one.
pub const MAX_BULLETS: usize = 10;

/// Minimum number of characters a line must keep after marker stripping.
/// Counted in chars, not bytes, since replies are Arabic text.
const MIN_BULLET_CHARS: usize = 10;

/// Splits `raw` into ordered bullets: one per line, trimmed, with a single
/// leading `•`/`-`/`*` marker (plus following whitespace) stripped, keeping
/// only lines longer than [`MIN_BULLET_CHARS`] after stripping.
///
/// If no line qualifies, the whole unmodified input becomes the single
/// bullet, so the output is never empty for non-empty input.
pub fn segment(raw: &str) -> Vec<String> {
    let bullets: Vec<String> = raw
        .lines()
        .map(|line| strip_marker(line.trim()))
        .filter(|line| line.chars().count() > MIN_BULLET_CHARS)
        .map(str::to_string)
        .collect();

    if bullets.is_empty() {
        vec![raw.to_string()]
    } else {
        bullets
    }
}

fn strip_marker(line: &str) -> &str {
    for marker in ['•', '-', '*'] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markers_and_drops_short_lines() {
        let raw = "• Fact one here\n- Fact two here\nshort\n* Fact three here";
        assert_eq!(
            segment(raw),
            vec!["Fact one here", "Fact two here", "Fact three here"]
        );
    }

    #[test]
    fn preserves_line_order() {
        let raw = "- first qualifying line\n- second qualifying line\n- third qualifying line";
        let bullets = segment(raw);
        assert_eq!(bullets[0], "first qualifying line");
        assert_eq!(bullets[1], "second qualifying line");
        assert_eq!(bullets[2], "third qualifying line");
    }

    #[test]
    fn falls_back_to_whole_input_when_nothing_qualifies() {
        let raw = "too short";
        assert_eq!(segment(raw), vec![raw.to_string()]);
    }

    #[test]
    fn fallback_keeps_input_unmodified() {
        // The fallback returns the raw text, marker and all.
        let raw = "• short one";
        assert_eq!(segment(raw), vec!["• short one".to_string()]);
    }

    #[test]
    fn counts_arabic_characters_not_bytes() {
        // 11 Arabic chars would be well past 10 bytes but must be counted
        // as characters to qualify.
        let raw = "• توت عنخ آمون حكم";
        let bullets = segment(raw);
        assert_eq!(bullets, vec!["توت عنخ آمون حكم".to_string()]);
    }

    #[test]
    fn strips_only_one_leading_marker() {
        let raw = "- - doubled marker bullet line";
        assert_eq!(segment(raw), vec!["- doubled marker bullet line"]);
    }

    #[test]
    fn never_fabricates_bullets() {
        let raw = "- only one qualifying line";
        assert_eq!(segment(raw).len(), 1);
    }
}
