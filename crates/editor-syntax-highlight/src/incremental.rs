use crate::document::{HighlightResult, collect, ensure_loaded};
use crate::error::HighlightError;
use crate::line::{LineHighlight, highlight_line};
use crate::state::State;
use editor_syntax::{DefinitionRef, Repository};
use std::ops::Range;

/// Keeps per-line results of a document and re-highlights only what an edit
/// can have changed.
///
/// After an edit, report it with [`DocumentHighlighter::edit`] and call
/// [`DocumentHighlighter::update`] with the new lines. Highlighting restarts at
/// the first edited line and stops as soon as a line ends in the same state
/// as before and no edited line follows.
#[derive(Debug, Clone)]
pub struct DocumentHighlighter {
    definition: DefinitionRef,
    lines: Vec<Option<LineHighlight>>,
}

impl DocumentHighlighter {
    /// Highlighter for documents in `definition`'s language. Nothing is
    /// cached until the first [`DocumentHighlighter::update`].
    pub fn new(definition: DefinitionRef) -> Self {
        Self {
            definition,
            lines: Vec::new(),
        }
    }

    #[allow(missing_docs)]
    pub fn definition(&self) -> DefinitionRef {
        self.definition
    }

    /// Switch to another language, dropping every cached line.
    pub fn set_definition(&mut self, definition: DefinitionRef) {
        self.definition = definition;
        self.invalidate();
    }

    /// Drop every cached line, e.g. after the repository was reloaded.
    pub fn invalidate(&mut self) {
        self.lines.clear();
    }

    /// Record that `removed` lines starting at `line` were replaced by
    /// `inserted` lines. The replacement lines are marked for highlighting.
    pub fn edit(&mut self, line: usize, removed: usize, inserted: usize) {
        let start = line.min(self.lines.len());
        let end = line.saturating_add(removed).min(self.lines.len());
        self.lines
            .splice(start..end, std::iter::repeat_n(None, inserted));
        // After a pure deletion the following line has a new predecessor.
        if inserted == 0
            && let Some(next) = self.lines.get_mut(start)
        {
            *next = None;
        }
    }

    /// Brings the cache in line with `lines` and returns the range of lines
    /// that were highlighted again.
    pub fn update<S: AsRef<str>>(
        &mut self,
        repo: &mut Repository,
        lines: &[S],
    ) -> Result<Range<usize>, HighlightError> {
        ensure_loaded(repo, self.definition)?;
        self.lines.resize(lines.len(), None);

        let Some(first) = self.lines.iter().position(Option::is_none) else {
            return Ok(lines.len()..lines.len());
        };
        let mut state = self.start_state(first);
        let mut line = first;
        let mut last = first;

        while line < lines.len() {
            let highlight = highlight_line(repo, self.definition, lines[line].as_ref(), &state);
            let converged = self.lines[line]
                .as_ref()
                .is_some_and(|old| old.state == highlight.state);
            state = highlight.state.clone();
            self.lines[line] = Some(highlight);
            last = line;
            line += 1;

            if converged {
                // Lines up to the next edited one are still valid.
                match self.lines[line..].iter().position(Option::is_none) {
                    Some(gap) => {
                        line += gap;
                        state = self.start_state(line);
                    }
                    None => break,
                }
            }
        }
        Ok(first..last + 1)
    }

    fn start_state(&self, line: usize) -> State {
        line.checked_sub(1)
            .and_then(|prev| self.lines.get(prev))
            .and_then(Option::as_ref)
            .map(|h| h.state.clone())
            .unwrap_or_default()
    }

    /// Cached result of a line.
    pub fn line(&self, line: usize) -> Option<&LineHighlight> {
        self.lines.get(line).and_then(Option::as_ref)
    }

    /// Number of lines the cache covers.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Document output for the cached lines; `lines` must be the text of the
    /// last [`DocumentHighlighter::update`].
    pub fn result<S: AsRef<str>>(&self, repo: &Repository, lines: &[S]) -> HighlightResult {
        let highlights: Vec<LineHighlight> = self.lines.iter().map_while(Clone::clone).collect();
        collect(repo, self.definition, lines, &highlights)
    }
}
