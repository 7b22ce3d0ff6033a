//! Turn a script into text that is safe to hand to a speech synthesizer.
//!
//! Enhanced scripts sometimes come back with production notes mixed into the
//! narration. [`clean`] removes:
//!
//! - bold-marked spans (`**Host:**`, `**[Intro music]**`)
//! - horizontal rules (lines starting with `---` or `===`)
//! - parenthetical cues about sound effects, transitions, music, fades, or
//!   "plays to end"
//! - leading speaker labels (`Host:`, `Narrator:`, `Speaker 2:`, `Puck:`)
//!
//! and normalises whitespace: every line is trimmed, runs of blank lines
//! collapse to a single blank line, and the text is trimmed as a whole.
//!
//! The transform is applied until it reaches a fixed point, which makes
//! `clean(clean(x)) == clean(x)` hold for every input.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*.*?\*\*").unwrap());

static RULE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(?:-{3,}|={3,}).*$").unwrap());

static CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\([^()\n]*?(?:sound effect|transition|music|fades? (?:in|out|up)|plays to end)[^()\n]*?\)",
    )
    .unwrap()
});

static SPEAKER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:host|narrator|speaker(?: \d+)?|puck)\s*:\s*)+").unwrap()
});

/// Strip stage directions and markup from `script_text`.
pub fn clean(script_text: &str) -> String {
    let mut current = script_text.to_string();
    loop {
        let next = normalize_whitespace(&strip_markup(&current));
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_markup(text: &str) -> String {
    let text = BOLD_SPAN.replace_all(text, "");
    let text = RULE_LINE.replace_all(&text, "");
    let text = CUE.replace_all(&text, "");
    text.lines()
        .map(|line| SPEAKER_LABEL.replace(line.trim_start(), "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.lines().map(str::trim) {
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSY: &str = "
        **Host:** Welcome to the show!

        (music fades in)
        This is the main content.
        (sound effect: applause)



        ---
        ======= part two
        Host: Next story (Transition Swoosh) continues here.
        (Theme music plays to end)

        **Host:** That's all for today.
        ";

    #[test]
    fn test_removes_stage_directions() {
        let cleaned = clean(MESSY);

        assert!(!cleaned.contains("**"));
        assert!(!cleaned.contains("Host:"));
        assert!(!cleaned.contains("(music fades in)"));
        assert!(!cleaned.contains("(sound effect: applause)"));
        assert!(!cleaned.contains("Swoosh"));
        assert!(!cleaned.contains("plays to end"));
        assert!(!cleaned.contains("---"));
        assert!(!cleaned.contains("part two"));
        assert!(cleaned.contains("Welcome to the show!"));
        assert!(cleaned.contains("This is the main content."));
        assert!(cleaned.contains("Next story  continues here."));
        assert!(cleaned.contains("That's all for today."));
    }

    #[test]
    fn test_whitespace_normalised() {
        let cleaned = clean(MESSY);
        assert!(!cleaned.contains("\n\n\n"));
        assert!(!cleaned.starts_with(char::is_whitespace));
        assert!(!cleaned.ends_with(char::is_whitespace));
        for line in cleaned.lines() {
            assert_eq!(line, line.trim());
        }
    }

    #[test]
    fn test_clean_is_idempotent() {
        let samples = [
            MESSY,
            "(music (music) fades)\n\n\n\nHost: Host: hi",
            "   ---\n**a** **b** text\n(FADE IN) (fades out slowly)\n\n\n\nend",
            "Speaker 2: (sound effect) **** words",
            "",
        ];
        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_keeps_ordinary_parentheses() {
        let text = "Arweave (a permanent storage network) grew.";
        assert_eq!(clean(text), text);
    }

    #[test]
    fn test_plain_script_unchanged() {
        let text = "Welcome to Arweave Today.\n\nFirst up, in news news: B\n\nThanks for listening.";
        assert_eq!(clean(text), text);
    }
}
