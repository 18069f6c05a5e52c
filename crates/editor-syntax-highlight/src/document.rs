//! Whole-document highlighting and fold region derivation.

use crate::error::HighlightError;
use crate::intervals::{FoldRegion, Interval, format_at};
use crate::line::{LineHighlight, highlight_line};
use crate::state::State;
use editor_syntax::{
    DefinitionRef, FoldingKind, FormatId, Repository, SyntaxError,
};
use regex::Regex;
use tracing::warn;

/// Columns a tab advances to for indentation-based folding.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Highlighting output produced by [`highlight_document`].
pub struct HighlightResult {
    /// Format intervals in char offsets, sorted and non-overlapping.
    pub intervals: Vec<Interval>,
    /// Fold regions from folding markers and, if the grammar asks for it,
    /// indentation.
    pub fold_regions: Vec<FoldRegion>,
}

impl HighlightResult {
    /// Format at a char offset of the document.
    pub fn format_at(&self, offset: usize) -> Option<FormatId> {
        format_at(&self.intervals, offset)
    }
}

/// Splits on `\n`, dropping a trailing `\r` from each line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Highlights a document from its start.
///
/// - Intervals are in **char offsets** of `text`; lines are separated by one
///   `\n` (a `\r` before it is counted as part of the line).
/// - Fails only if the definition cannot be loaded or has no contexts.
pub fn highlight_document(
    repo: &mut Repository,
    definition: DefinitionRef,
    text: &str,
) -> Result<HighlightResult, HighlightError> {
    ensure_loaded(repo, definition)?;

    let raw_lines: Vec<&str> = text.split('\n').collect();
    let lines = split_lines(text);
    let mut state = State::new();
    let mut highlights = Vec::with_capacity(lines.len());
    for line in &lines {
        let highlight = highlight_line(repo, definition, line, &state);
        state = highlight.state.clone();
        highlights.push(highlight);
    }
    Ok(collect(repo, definition, &raw_lines, &highlights))
}

pub(crate) fn ensure_loaded(
    repo: &mut Repository,
    definition: DefinitionRef,
) -> Result<(), HighlightError> {
    repo.load(definition)?;
    let loaded = repo
        .definition(definition)
        .ok_or(SyntaxError::ExpiredDefinition)?;
    if loaded.initial_context().is_none() {
        return Err(HighlightError::NoInitialContext(loaded.name().to_string()));
    }
    Ok(())
}

/// Builds document output from per-line results. `lines[i]` is the text
/// `highlights[i]` was computed from, possibly followed by a `\r`.
pub(crate) fn collect<S: AsRef<str>>(
    repo: &Repository,
    definition: DefinitionRef,
    lines: &[S],
    highlights: &[LineHighlight],
) -> HighlightResult {
    let mut intervals: Vec<Interval> = Vec::new();
    let mut line_start = 0;
    for (line, highlight) in lines.iter().zip(highlights) {
        let text = line.as_ref();
        let mut char_pos = line_start;
        let mut byte_pos = 0;
        for span in &highlight.spans {
            char_pos += text[byte_pos..span.offset].chars().count();
            let start = char_pos;
            char_pos += text[span.offset..span.offset + span.len].chars().count();
            byte_pos = span.offset + span.len;

            let Some(format) = span.format else {
                continue;
            };
            if let Some(last) = intervals.last_mut()
                && last.format == format
                && last.end == start
            {
                last.end = char_pos;
                continue;
            }
            intervals.push(Interval::new(start, char_pos, format));
        }
        line_start += text.chars().count() + 1;
    }

    let mut fold_regions = marker_regions(highlights);
    if repo
        .definition(definition)
        .is_some_and(|d| d.indentation_based_folding_enabled())
    {
        fold_regions.extend(indentation_regions(repo, definition, lines, highlights));
    }
    fold_regions.sort();
    fold_regions.dedup();

    HighlightResult {
        intervals,
        fold_regions,
    }
}

/// Pairs begin and end markers with the same id; the innermost open region
/// is closed first. Regions still open at the end run to the last line.
fn marker_regions(highlights: &[LineHighlight]) -> Vec<FoldRegion> {
    let mut open: Vec<(u16, usize)> = Vec::new();
    let mut regions = Vec::new();

    for (line, highlight) in highlights.iter().enumerate() {
        for marker in &highlight.folding {
            let id = marker.region.id();
            match marker.region.kind() {
                FoldingKind::Begin => open.push((id, line)),
                FoldingKind::End => {
                    if let Some(index) = open.iter().rposition(|(open_id, _)| *open_id == id) {
                        let (_, start) = open.remove(index);
                        if line > start {
                            regions.push(FoldRegion::new(start, line));
                        }
                    }
                }
            }
        }
    }

    let last_line = highlights.len().saturating_sub(1);
    regions.extend(
        open.into_iter()
            .filter(|(_, start)| *start < last_line)
            .map(|(_, start)| FoldRegion::new(start, last_line)),
    );
    regions
}

fn indentation(text: &str) -> usize {
    let mut columns = 0;
    for c in text.chars() {
        match c {
            ' ' => columns += 1,
            '\t' => columns += TAB_WIDTH - columns % TAB_WIDTH,
            _ => break,
        }
    }
    columns
}

/// Regions of lines indented deeper than the line before them. Blank lines
/// and lines matching the grammar's empty-line patterns take no part. Lines
/// starting in a context with `noIndentationBasedFolding` belong to the
/// enclosing regions whatever their indentation.
fn indentation_regions<S: AsRef<str>>(
    repo: &Repository,
    definition: DefinitionRef,
    lines: &[S],
    highlights: &[LineHighlight],
) -> Vec<FoldRegion> {
    let Some(loaded) = repo.definition(definition) else {
        return Vec::new();
    };
    let ignore: Vec<Regex> = loaded
        .folding_ignore_list()
        .iter()
        .filter_map(|pattern| match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(definition = loaded.name(), pattern = %pattern, %err, "Invalid empty line pattern");
                None
            }
        })
        .collect();
    let initial = loaded.initial_context();

    // (indentation, first line, last line inside the region so far)
    let mut open: Vec<(usize, usize, Option<usize>)> = Vec::new();
    let mut regions = Vec::new();

    for (line, text) in lines.iter().enumerate() {
        let text = text.as_ref().trim_end_matches('\r');
        if text.trim().is_empty() || ignore.iter().any(|re| re.is_match(text)) {
            continue;
        }
        let start_context = match line {
            0 => initial,
            _ => highlights
                .get(line - 1)
                .and_then(|h| h.state.top())
                .map(|f| f.context())
                .or(initial),
        };
        if start_context
            .and_then(|c| repo.context(c))
            .is_some_and(|c| !c.indentation_based_folding())
        {
            // Extends the regions already holding deeper lines.
            for (_, _, end) in open.iter_mut().filter(|(_, _, end)| end.is_some()) {
                *end = Some(line);
            }
            continue;
        }

        let indent = indentation(text);
        while let Some(&(open_indent, start, end)) = open.last() {
            if open_indent < indent {
                break;
            }
            open.pop();
            if let Some(end) = end {
                regions.push(FoldRegion::new(start, end));
            }
        }
        for (_, _, end) in &mut open {
            *end = Some(line);
        }
        open.push((indent, line, None));
    }

    regions.extend(
        open.into_iter()
            .filter_map(|(_, start, end)| end.map(|end| FoldRegion::new(start, end))),
    );
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation_columns() {
        assert_eq!(indentation("abc"), 0);
        assert_eq!(indentation("  abc"), 2);
        assert_eq!(indentation("\tabc"), 4);
        assert_eq!(indentation("  \tabc"), 4);
        assert_eq!(indentation("\t  abc"), 6);
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\r\nb\n\nc"), vec!["a", "b", "", "c"]);
        assert_eq!(split_lines(""), vec![""]);
    }
}
