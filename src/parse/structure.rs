//! Section and chapter discovery.
//!
//! Discovery is ordered: title, then front matter, then back matter, then
//! chapters between them, then subsections inside chapters. Every function
//! is total; a missing section is an empty collection, never an error.

use crate::document::{Chapter, EndSection, FrontSection, Subsection};
use crate::patterns;
use tracing::debug;

/// Minimum body size for a `Notes` heading to count as a document-level
/// end section rather than a chapter-scoped notes list.
const NOTES_SECTION_MIN_LEN: usize = 1000;

/// First heading line of the text, if any.
pub fn find_title(text: &str) -> Option<String> {
    patterns::TITLE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

/// Front-matter sections in the prefix before the first numbered chapter
/// header.
pub fn find_intro_sections(text: &str) -> Vec<FrontSection> {
    let first_chapter_start = patterns::NUMBERED_HEADER
        .find(text)
        .map(|m| m.start())
        .unwrap_or(text.len());
    let search = &text[..first_chapter_start];

    let matches: Vec<_> = patterns::INTRO_HEADER.find_iter(search).collect();
    let mut sections = Vec::new();
    for (i, m) in matches.iter().enumerate() {
        let mut title = m.as_str().trim().trim_start_matches('#').trim().to_string();
        let lower = title.to_lowercase();
        if lower.contains("publisher") && lower.contains("acknowledgement") {
            title = "Acknowledgements".to_string();
        }

        let start_offset = m.start();
        let mut content_start = m.end();
        if text[content_start..].starts_with('\n') {
            content_start += 1;
        }
        let end_offset = matches
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(first_chapter_start);

        sections.push(FrontSection {
            title,
            start_offset,
            content_start,
            end_offset,
            text: text[content_start..end_offset].trim().to_string(),
            paragraphs: Vec::new(),
        });
    }
    sections
}

/// Back-matter sections after the last numbered chapter header.
///
/// A `Notes` heading qualifies only when it reads as the book's endnotes:
/// in the last 15% of the text, after at least three numbered chapters,
/// with no numbered chapter following and a body over 1000 characters.
/// Anything else is a chapter-scoped notes list and is left for
/// `find_notes` to consume.
pub fn find_end_sections(text: &str) -> Vec<EndSection> {
    let end_matches: Vec<_> = patterns::END_HEADER.find_iter(text).collect();
    if end_matches.is_empty() {
        return Vec::new();
    }

    let numbered: Vec<_> = patterns::NUMBERED_HEADER.find_iter(text).collect();
    let (min_end_start, num_chapters) = numbered
        .last()
        .map(|last| (last.end(), numbered.len()))
        .unwrap_or((0, 0));

    let mut valid: Vec<&regex::Match> = Vec::new();
    for m in &end_matches {
        if m.start() < min_end_start {
            continue;
        }
        let title = clean_header(m.as_str());
        if title.eq_ignore_ascii_case("notes") {
            let position_ratio = (text.len() - m.start()) as f64 / text.len().max(1) as f64;
            let has_later_chapters = numbered.iter().any(|c| c.start() >= m.start());
            let mut content_start = m.end();
            if text[content_start..].starts_with('\n') {
                content_start += 1;
            }
            let next_section_start = end_matches
                .iter()
                .find(|n| n.start() > m.start())
                .map(|n| n.start())
                .unwrap_or(text.len());
            let content_len = text[content_start..next_section_start].trim().len();

            let document_level = position_ratio <= 0.15
                && num_chapters >= 3
                && !has_later_chapters
                && content_len > NOTES_SECTION_MIN_LEN;
            if !document_level {
                debug!(offset = m.start(), "skipping chapter-scoped Notes heading");
                continue;
            }
        }
        valid.push(m);
    }

    let mut sections = Vec::new();
    for (i, m) in valid.iter().enumerate() {
        let title = clean_header(m.as_str());
        let start_offset = m.start();
        let mut content_start = m.end();
        if text[content_start..].starts_with('\n') {
            content_start += 1;
        }
        let end_offset = valid
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());

        sections.push(EndSection {
            title,
            start_offset,
            content_start,
            end_offset,
            text: text[content_start..end_offset].trim().to_string(),
            paragraphs: Vec::new(),
        });
    }
    sections
}

/// Chapters between the front and back matter.
///
/// The primary shape is a numbered `#` line followed by a title heading.
/// When it never occurs, lone numbered headers are accepted if they expose
/// a meaningful title within ten lines or carry more than
/// `fallback_min_body_len` characters of body, and do not look like a
/// notes list. A chapter whose number regresses is merged into its
/// predecessor by extending the predecessor's range.
pub fn find_chapters(
    text: &str,
    intros: &[FrontSection],
    ends: &[EndSection],
    fallback_min_body_len: usize,
) -> Vec<Chapter> {
    let end_start = ends
        .iter()
        .map(|s| s.start_offset)
        .min()
        .unwrap_or(text.len());
    let intro_end = intros
        .iter()
        .map(|s| s.end_offset)
        .max()
        .unwrap_or(0)
        .min(end_start);
    debug!(intro_end, end_start, "chapter search boundaries");

    let search = &text[intro_end..end_start];
    let primary: Vec<_> = patterns::CHAPTER.captures_iter(search).collect();

    let chapters = if primary.is_empty() {
        fallback_chapters(search, intro_end, end_start, fallback_min_body_len)
    } else {
        let mut chapters = Vec::new();
        for (i, caps) in primary.iter().enumerate() {
            let whole = caps.get(0).expect("group 0 always present");
            let title_text = caps[1].trim().to_string();
            let title = match patterns::CHAPTER_NUMBER.find(whole.as_str()) {
                Some(num) => format!("Chapter {}: {}", num.as_str(), title_text),
                None => title_text,
            };
            chapters.push(Chapter {
                title,
                start_offset: intro_end + whole.start(),
                end_offset: primary
                    .get(i + 1)
                    .map(|next| intro_end + next.get(0).expect("matched").start())
                    .unwrap_or(end_start),
                header_end_offset: intro_end + whole.end(),
                paragraphs: Vec::new(),
                subsections: Vec::new(),
            });
        }
        chapters
    };

    merge_regressions(chapters)
}

fn fallback_chapters(
    search: &str,
    intro_end: usize,
    end_start: usize,
    min_body_len: usize,
) -> Vec<Chapter> {
    let matches: Vec<_> = patterns::NUMBERED_HEADER.find_iter(search).collect();
    debug!(candidates = matches.len(), "chapter fallback pattern in use");

    let mut chapters = Vec::new();
    for (i, m) in matches.iter().enumerate() {
        let mut content_start = m.end();
        if search[content_start..].starts_with('\n') {
            content_start += 1;
        }
        let end_rel = matches
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(end_start - intro_end);
        let content = &search[content_start..end_rel];

        // Hunt for a title heading in the first ten lines of the body.
        let mut title_text = String::new();
        for line in content.lines().take(10) {
            let line = line.trim();
            if line.starts_with('#') && !patterns::NUMBERED_HEADER.is_match(line) {
                title_text = line.trim_start_matches('#').trim().to_string();
                break;
            }
        }

        let trimmed = content.trim();
        let is_likely_notes = title_text.eq_ignore_ascii_case("notes")
            || trimmed.to_lowercase().starts_with("notes")
            || patterns::NUMBERED_LIST_START.is_match(trimmed);
        let has_meaningful_title =
            !title_text.is_empty() && !title_text.eq_ignore_ascii_case("notes");
        let has_substantial_content = trimmed.len() > min_body_len;

        if (has_meaningful_title || has_substantial_content) && !is_likely_notes {
            let title = match patterns::CHAPTER_NUMBER.find(m.as_str()) {
                Some(num) if title_text.is_empty() => format!("Chapter {}", num.as_str()),
                Some(num) => format!("Chapter {}: {}", num.as_str(), title_text),
                None => title_text,
            };
            chapters.push(Chapter {
                title,
                start_offset: intro_end + m.start(),
                end_offset: intro_end + end_rel,
                header_end_offset: intro_end + m.end(),
                paragraphs: Vec::new(),
                subsections: Vec::new(),
            });
        }
    }
    chapters
}

/// Content-preserving post-filter. A chapter whose arabic number is lower
/// than the highest seen so far was misidentified subsection content; it is
/// folded into the preceding chapter instead of dropped. Duplicate
/// `(number, title)` pairs fold the same way.
fn merge_regressions(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut filtered: Vec<Chapter> = Vec::new();
    let mut seen: std::collections::HashSet<(u64, String)> = std::collections::HashSet::new();
    let mut max_number = 0u64;

    for chapter in chapters {
        let number = patterns::CHAPTER_TITLE_NUMBER
            .captures(&chapter.title)
            .and_then(|caps| caps[1].parse::<u64>().ok());
        let Some(number) = number else {
            filtered.push(chapter);
            continue;
        };

        if number < max_number {
            debug!(title = %chapter.title, number, max_number, "merging regressed chapter into predecessor");
            if let Some(prev) = filtered.last_mut() {
                prev.end_offset = chapter.end_offset;
            }
            continue;
        }
        if !seen.insert((number, chapter.title.clone())) {
            debug!(title = %chapter.title, "merging duplicate chapter into predecessor");
            if let Some(prev) = filtered.last_mut() {
                prev.end_offset = chapter.end_offset;
            }
            continue;
        }
        max_number = max_number.max(number);
        filtered.push(chapter);
    }
    filtered
}

/// Markdown headings inside one chapter's content, as 1-based subsections.
pub fn find_subsections(text: &str, chapter: &Chapter) -> Vec<Subsection> {
    let base = chapter.header_end_offset;
    let region = &text[base..chapter.end_offset];

    let matches: Vec<_> = patterns::SUBSECTION_HEADER.captures_iter(region).collect();
    let mut subsections = Vec::new();
    for (j, caps) in matches.iter().enumerate() {
        let whole = caps.get(0).expect("group 0 always present");
        let start_offset = base + whole.start();
        let mut content_start = base + whole.end();
        if text[content_start..].starts_with('\n') {
            content_start += 1;
        }
        let end_offset = matches
            .get(j + 1)
            .map(|next| base + next.get(0).expect("matched").start())
            .unwrap_or(chapter.end_offset);

        subsections.push(Subsection {
            id: j + 1,
            title: caps[1].trim().to_string(),
            start_offset,
            content_start,
            end_offset,
            text: text[content_start..end_offset].trim().to_string(),
            paragraphs: Vec::new(),
        });
    }
    subsections
}

fn clean_header(header: &str) -> String {
    header.trim().trim_start_matches('#').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_the_first_heading() {
        assert_eq!(find_title("# The A Priori\n\nText."), Some("The A Priori".to_string()));
        assert_eq!(find_title("No heading here."), None);
    }

    #[test]
    fn intro_sections_stop_at_first_chapter() {
        let text = "# Book\n\n# Contents\n\nlist\n\n# Preface\n\nwords\n\n# 1\n\n## First\n\nbody\n";
        let intros = find_intro_sections(text);
        let titles: Vec<&str> = intros.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Contents", "Preface"]);
        // The last intro runs up to the numbered chapter header (whose
        // match begins at the blank line before it).
        let last = intros.last().unwrap();
        assert_eq!(&text[last.end_offset..last.end_offset + 4], "\n# 1");
    }

    #[test]
    fn publishers_acknowledgements_is_normalized() {
        let text = "# Publisher's Acknowledgements\n\nthanks\n\n# 1\n\n## One\n\nbody\n";
        let intros = find_intro_sections(text);
        assert_eq!(intros[0].title, "Acknowledgements");
    }

    #[test]
    fn end_sections_after_last_chapter() {
        let text = "# 1\n\n## Only\n\nbody text\n\n# Bibliography\n\nSmith, J. (2020). A Book.\n\n# Index\n\na, 1\n";
        let ends = find_end_sections(text);
        let titles: Vec<&str> = ends.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Bibliography", "Index"]);
        assert_eq!(ends[0].end_offset, ends[1].start_offset);
    }

    #[test]
    fn short_early_notes_heading_is_chapter_scoped() {
        // A Notes heading with a small body, early in the text: not an end
        // section.
        let mut text = String::from("# 1\n\n## One\n\nbody\n\n# Notes\n\n1. small\n\n# 2\n\n## Two\n\n");
        text.push_str(&"filler text ".repeat(300));
        let ends = find_end_sections(&text);
        assert!(ends.iter().all(|s| s.title != "Notes"));
    }

    #[test]
    fn substantial_final_notes_heading_is_document_level() {
        let mut text = String::new();
        for i in 1..=3 {
            text.push_str(&format!("# {i}\n\n## Chapter {i} Title\n\n"));
            text.push_str(&"chapter body sentence. ".repeat(200));
            text.push_str("\n\n");
        }
        // Roughly 1.4k characters of notes at the tail of a 14k document:
        // inside the last 15% and over the length floor.
        text.push_str("# Notes\n\n");
        for i in 1..=30 {
            text.push_str(&format!("{i}. A note with enough text to matter, number {i}.\n"));
        }
        let ends = find_end_sections(&text);
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].title, "Notes");
    }

    #[test]
    fn primary_chapter_pattern() {
        let text = "# 1\n\n## The Problem\n\nbody one\n\n# 2\n\n## The Reply\n\nbody two\n";
        let chapters = find_chapters(text, &[], &[], 1000);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1: The Problem", "Chapter 2: The Reply"]);
        assert_eq!(chapters[0].end_offset, chapters[1].start_offset);
    }

    #[test]
    fn regressed_chapter_number_merges_into_predecessor() {
        let text = "# 1\n\n## One\n\nbody\n\n# 2\n\n## Two\n\nbody\n\n# 1\n\n## Stray\n\nstray body\n\n# 3\n\n## Three\n\nbody\n";
        let chapters = find_chapters(text, &[], &[], 1000);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Chapter 1: One", "Chapter 2: Two", "Chapter 3: Three"]
        );
        // Chapter 2 swallowed the stray block.
        let two = &chapters[1];
        assert!(text[two.start_offset..two.end_offset].contains("stray body"));
    }

    #[test]
    fn duplicate_chapter_merges_into_predecessor() {
        let text = "# 1\n\n## One\n\nbody\n\n# 1\n\n## One\n\nrepeat body\n\n# 2\n\n## Two\n\nbody\n";
        let chapters = find_chapters(text, &[], &[], 1000);
        assert_eq!(chapters.len(), 2);
        assert!(text[chapters[0].start_offset..chapters[0].end_offset].contains("repeat body"));
    }

    #[test]
    fn fallback_accepts_titled_lone_headers() {
        let text = "# 1\nSome preamble without its own heading line\n# Real Title\nmore body\n\n# 2\nSecond preamble comes first\n# Second Title\nsecond body\n";
        let chapters = find_chapters(text, &[], &[], 1000);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1: Real Title", "Chapter 2: Second Title"]);
    }

    #[test]
    fn fallback_rejects_notes_lists() {
        let text = "# 1\n1. a note item\n2. another note item\n\n# 2\nEnough body?\n";
        let chapters = find_chapters(text, &[], &[], 1000);
        assert!(chapters.iter().all(|c| !c.title.starts_with("Chapter 1")));
    }

    #[test]
    fn subsections_are_numbered_within_chapter() {
        let text = "# 1\n\n## Title\n\nintro para\n\n## First Sub\n\nalpha\n\n## Second Sub\n\nbeta\n";
        let chapters = find_chapters(text, &[], &[], 1000);
        let subs = find_subsections(text, &chapters[0]);
        let titles: Vec<&str> = subs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First Sub", "Second Sub"]);
        assert_eq!(subs[0].id, 1);
        assert_eq!(subs[1].id, 2);
        assert_eq!(subs[0].end_offset, subs[1].start_offset);
        assert_eq!(subs[1].end_offset, chapters[0].end_offset);
    }
}
