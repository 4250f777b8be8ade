//! Quote masking and post-alignment.
//! Corner-bracket quotes are swapped for inert tags before translation so MT
//! backends cannot translate or drop them, then restored on completion.

use std::sync::OnceLock;

use regex::Regex;

pub const LEFT_QUOTE: char = '「';
pub const RIGHT_QUOTE: char = '」';
pub const LEFT_TAG: &str = "<dqxlq/>";
pub const RIGHT_TAG: &str = "<dqxrq/>";

/// Full-width space used to indent continuation lines of quoted dialogue.
pub const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// Tag variants backends produce: extra spaces, dropped slash, case changes, HTML escapes.
fn loose_tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(?:<|&lt;)\s*dqx\s*([lr])q\s*/?\s*(?:>|&gt;)").ok())
        .as_ref()
}

/// Replace quote markers with tags.
pub fn mask(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            LEFT_QUOTE => out.push_str(LEFT_TAG),
            RIGHT_QUOTE => out.push_str(RIGHT_TAG),
            _ => out.push(c),
        }
    }
    out
}

/// Restore quote markers, tolerating tags a backend has reformatted.
pub fn unmask(text: &str) -> String {
    let exact = text.replace(LEFT_TAG, "「").replace(RIGHT_TAG, "」");
    match loose_tag_pattern() {
        Some(pattern) => pattern
            .replace_all(&exact, |caps: &regex::Captures<'_>| {
                if caps[1].eq_ignore_ascii_case("l") {
                    "「"
                } else {
                    "」"
                }
            })
            .into_owned(),
        None => exact,
    }
}

/// Indent continuation lines of quoted blocks with U+3000.
///
/// A block opens on a line starting with `「` and closes after the line that
/// contains `」`, or at an empty line. Non-empty continuation lines missing the
/// indent get one.
pub fn align_quoted_block(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_block = false;

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let content = line.trim_end_matches('\r');

        if in_block {
            if content.trim().is_empty() {
                in_block = false;
                out.push_str(line);
                continue;
            }
            if !content.starts_with(IDEOGRAPHIC_SPACE) {
                out.push(IDEOGRAPHIC_SPACE);
            }
            out.push_str(line);
            if content.contains(RIGHT_QUOTE) {
                in_block = false;
            }
            continue;
        }

        out.push_str(line);
        if content.starts_with(LEFT_QUOTE) && !content.contains(RIGHT_QUOTE) {
            in_block = true;
        }
    }
    out
}

/// `unmask` followed by `align_quoted_block`.
pub fn restore(text: &str) -> String {
    align_quoted_block(&unmask(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_then_unmask_is_identity() {
        for text in [
            "「ようこそ、アストルティアへ！」",
            "村長\n「はじめまして。\n\u{3000}よろしく。」",
            "no quotes at all",
            "」stray closing and opening「",
            "",
        ] {
            let masked = mask(text);
            assert!(!masked.contains(LEFT_QUOTE) && !masked.contains(RIGHT_QUOTE));
            assert_eq!(unmask(&masked), text);
        }
    }

    #[test]
    fn unmask_tolerates_mangled_tags() {
        assert_eq!(unmask("< dqxlq />Hello< DQXRQ >"), "「Hello」");
        assert_eq!(unmask("&lt;dqxlq/&gt;Hi&lt;dqxrq/&gt;"), "「Hi」");
        assert_eq!(unmask("<dqxlq>x<dqxrq>"), "「x」");
    }

    #[test]
    fn continuation_lines_get_indented() {
        let text = "「Welcome, traveler.\nThe town is quiet today.\n\u{3000}Already indented.」\nNarration.";
        assert_eq!(
            align_quoted_block(text),
            "「Welcome, traveler.\n\u{3000}The town is quiet today.\n\u{3000}Already indented.」\nNarration."
        );
    }

    #[test]
    fn empty_line_closes_block() {
        let text = "「Line one\n\nOutside";
        assert_eq!(align_quoted_block(text), "「Line one\n\nOutside");
    }

    #[test]
    fn single_line_quote_opens_no_block() {
        let text = "「Done.」\nNext line";
        assert_eq!(align_quoted_block(text), text);
    }

    #[test]
    fn restore_unmasks_and_aligns() {
        let translated = "<dqxlq/>Hello there,\nfriend.<dqxrq/>";
        assert_eq!(restore(translated), "「Hello there,\n\u{3000}friend.」");
    }
}
