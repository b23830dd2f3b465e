//! A small abbreviation-aware sentence splitter.
//!
//! Atom decomposition needs sentence boundaries with exact byte offsets into
//! the paragraph, so the splitter returns trimmed spans rather than owned
//! strings. A boundary is a `.`/`!`/`?` run followed by whitespace and a
//! sentence opener (upper-case letter, quote, or opening parenthesis),
//! unless the run closes a known abbreviation.

use std::ops::Range;

/// Abbreviations whose trailing period never ends a sentence. Compared
/// lower-cased, without the final period.
const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "cf", "etc", "vs", "viz", "vol", "vols", "pp", "ch", "chs", "fig", "figs",
    "sec", "secs", "dr", "mr", "mrs", "ms", "prof", "st", "jr", "sr", "ed", "eds", "trans",
    "repr", "ibid", "esp", "al",
];

/// Split `text` into trimmed sentence spans, in order. Empty spans are
/// dropped; offsets index into `text`.
pub fn split_sentences(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut splits: Vec<usize> = Vec::new();

    for (pos, &(byte, ch)) in chars.iter().enumerate() {
        if !is_terminal(ch) {
            continue;
        }
        // Only the last character of a punctuation run can end the sentence.
        if let Some(&(_, next)) = chars.get(pos + 1) {
            if is_terminal(next) {
                continue;
            }
        }
        // Must be followed by whitespace and then a sentence opener.
        let Some(&(_, next)) = chars.get(pos + 1) else {
            continue; // end of text, the final span covers it
        };
        if !next.is_whitespace() {
            continue;
        }
        let Some(&(_, opener)) = chars[pos + 2..].iter().find(|(_, c)| !c.is_whitespace()) else {
            continue;
        };
        if !is_opener(opener) {
            continue;
        }
        if ch == '.' && ends_abbreviation(&chars, pos) {
            continue;
        }
        splits.push(byte + ch.len_utf8());
    }

    let mut spans = Vec::new();
    let mut start = 0;
    for split in splits.into_iter().chain(std::iter::once(text.len())) {
        if let Some(span) = trimmed_span(text, start, split) {
            spans.push(span);
        }
        start = split;
    }
    spans
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_opener(c: char) -> bool {
    c.is_uppercase() || matches!(c, '"' | '\'' | '\u{201C}' | '\u{2018}' | '(')
}

/// Does the period at `chars[pos]` close a known abbreviation? The token is
/// the run of word characters and interior periods directly before it.
fn ends_abbreviation(chars: &[(usize, char)], pos: usize) -> bool {
    let mut token: Vec<char> = Vec::new();
    for &(_, c) in chars[..pos].iter().rev() {
        if c.is_alphanumeric() || c == '.' {
            token.push(c);
        } else {
            break;
        }
    }
    if token.is_empty() {
        return false;
    }
    token.reverse();
    let token: String = token.into_iter().collect();
    let token = token.trim_matches('.').to_lowercase();
    ABBREVIATIONS.contains(&token.as_str())
}

fn trimmed_span(text: &str, start: usize, end: usize) -> Option<Range<usize>> {
    let slice = &text[start..end];
    let trimmed = slice.trim_start();
    let lead = slice.len() - trimmed.len();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(start + lead..start + lead + trimmed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn split<'a>(text: &'a str) -> Vec<&'a str> {
        split_sentences(text).into_iter().map(|r| &text[r]).collect()
    }

    #[test]
    fn plain_sentences() {
        assert_eq!(
            split("One sentence. Another one. And a third."),
            vec!["One sentence.", "Another one.", "And a third."]
        );
    }

    #[test]
    fn question_and_exclamation() {
        assert_eq!(split("Is it so? It is! Good."), vec!["Is it so?", "It is!", "Good."]);
    }

    #[rstest]
    #[case("See e.g. Williamson for details. Cf. the reply.", 2)]
    #[case("Dr. Smith disagrees.", 1)]
    #[case("It holds, viz. the claim.", 1)]
    #[case("Compare pp. 10-12 of the reply. Then move on.", 2)]
    fn abbreviation_cases(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(split(text).len(), expected, "{text:?}");
    }

    #[test]
    fn lowercase_continuation_does_not_split() {
        assert_eq!(split("It holds, viz. the claim. next comes here"), vec![
            "It holds, viz. the claim. next comes here"
        ]);
    }

    #[test]
    fn single_capital_before_period_splits() {
        assert_eq!(
            split("It follows: namely, that P. Hence Q"),
            vec!["It follows: namely, that P.", "Hence Q"]
        );
    }

    #[test]
    fn ellipsis_run_splits_once() {
        assert_eq!(split("It trails off... Then resumes."), vec![
            "It trails off...",
            "Then resumes."
        ]);
    }

    #[test]
    fn offsets_slice_back_to_input() {
        let text = "  Padded start. Second sentence.  ";
        for span in split_sentences(text) {
            let s = &text[span];
            assert_eq!(s, s.trim());
            assert!(!s.is_empty());
        }
    }
}
