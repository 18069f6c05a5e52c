//! Tokenizing a single line against the context stack.

use crate::state::State;
use editor_syntax::{
    ContextRef, ContextSwitch, DefinitionRef, FoldingRegion, FormatId, Repository, RuleRef,
};
use std::collections::HashMap;
use tracing::debug;

/// Bound on context switches that do not consume text, per position.
const MAX_ZERO_WIDTH_SWITCHES: usize = 1024;

/// A formatted byte range of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset.
    pub offset: usize,
    /// Length in bytes.
    pub len: usize,
    /// Format, `None` where the grammar assigns none.
    pub format: Option<FormatId>,
}

/// A folding marker emitted by a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldingMarker {
    /// Byte offset of the match that carried the marker.
    pub offset: usize,
    #[allow(missing_docs)]
    pub region: FoldingRegion,
}

/// Result of [`highlight_line`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineHighlight {
    /// Adjacent ranges, merged by format, covering the whole line.
    pub spans: Vec<Span>,
    /// Folding markers in line order.
    pub folding: Vec<FoldingMarker>,
    /// State at the end of the line; input for the next line.
    pub state: State,
}

impl LineHighlight {
    fn unformatted(text: &str, state: &State) -> Self {
        let spans = if text.is_empty() {
            Vec::new()
        } else {
            vec![Span {
                offset: 0,
                len: text.len(),
                format: None,
            }]
        };
        Self {
            spans,
            folding: Vec::new(),
            state: state.clone(),
        }
    }
}

/// Highlights one line of text.
///
/// `state` is the end state of the previous line ([`State::new`] for the
/// first line). The definition is loaded on first use; if that fails the line
/// comes back as a single unformatted span and the state is passed through.
pub fn highlight_line(
    repo: &mut Repository,
    definition: DefinitionRef,
    text: &str,
    state: &State,
) -> LineHighlight {
    if repo.load(definition).is_err() {
        return LineHighlight::unformatted(text, state);
    }
    let repo = &*repo;
    let Some(initial) = repo
        .definition(definition)
        .and_then(|d| d.initial_context())
    else {
        return LineHighlight::unformatted(text, state);
    };

    let mut tokenizer = Tokenizer {
        repo,
        initial,
        state: state.clone(),
        spans: Vec::new(),
        folding: Vec::new(),
    };
    if text.is_empty() {
        tokenizer.empty_line();
    } else {
        tokenizer.line(text);
    }
    LineHighlight {
        spans: tokenizer.spans,
        folding: tokenizer.folding,
        state: tokenizer.state,
    }
}

struct Tokenizer<'a> {
    repo: &'a Repository,
    initial: ContextRef,
    state: State,
    spans: Vec<Span>,
    folding: Vec<FoldingMarker>,
}

impl Tokenizer<'_> {
    fn top(&self) -> ContextRef {
        self.state.top().map_or(self.initial, |f| f.context())
    }

    fn top_captures(&self) -> &[String] {
        self.state.top().map_or(&[], |f| f.captures())
    }

    /// Applies a switch. Returns `false` when it tried to pop the initial
    /// context without pushing anything, which ends line-end processing.
    fn switch(&mut self, switch: &ContextSwitch, captures: Vec<String>) -> bool {
        let survived = self.state.pop(switch.pop_count());
        match switch.target() {
            Some(target) => {
                let dynamic = self.repo.context(target).is_some_and(|c| c.dynamic());
                let captures = if dynamic { captures } else { Vec::new() };
                self.state.push(target, captures);
                true
            }
            None => survived,
        }
    }

    fn push_span(&mut self, start: usize, end: usize, format: Option<FormatId>) {
        if start >= end {
            return;
        }
        if let Some(last) = self.spans.last_mut()
            && last.format == format
            && last.offset + last.len == start
        {
            last.len = end - last.offset;
            return;
        }
        self.spans.push(Span {
            offset: start,
            len: end - start,
            format,
        });
    }

    fn empty_line(&mut self) {
        let repo = self.repo;
        for _ in 0..MAX_ZERO_WIDTH_SWITCHES {
            let Some(context) = repo.context(self.top()) else {
                return;
            };
            let switch = if !context.line_empty().is_stay() {
                context.line_empty()
            } else if !context.line_end().is_stay() {
                context.line_end()
            } else {
                return;
            };
            if !self.switch(switch, Vec::new()) {
                return;
            }
        }
        debug!("Endless context switching on an empty line");
    }

    fn line(&mut self, text: &str) {
        let repo = self.repo;
        let first_non_space = text
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .map_or(text.len(), |(i, _)| i);

        let mut skip_offsets: HashMap<RuleRef, usize> = HashMap::new();
        let mut skip_captures: Vec<String> = Vec::new();
        let mut line_continue = false;
        let mut zero_width_switches = 0;
        let mut offset = 0;

        while offset < text.len() {
            let current = self.top();
            let Some(context) = repo.context(current) else {
                self.push_span(offset, text.len(), None);
                break;
            };
            if self.top_captures() != skip_captures.as_slice() {
                skip_offsets.clear();
                skip_captures = self.top_captures().to_vec();
            }

            let mut matched = None;
            for &rule_ref in context.rules() {
                if skip_offsets.get(&rule_ref).is_some_and(|&skip| skip > offset) {
                    continue;
                }
                let Some((owner, rule)) = repo.rule(rule_ref) else {
                    continue;
                };
                if rule.first_non_space() && offset > first_non_space {
                    continue;
                }
                if let Some(column) = rule.column()
                    && text[..offset].chars().count() != column
                {
                    continue;
                }

                let result = rule.matches(text, offset, self.top_captures(), owner);
                if let Some(skip) = result.skip_offset()
                    && skip > result.offset()
                {
                    skip_offsets.insert(rule_ref, skip);
                }
                if result.offset() > offset {
                    matched = Some((rule, result));
                    break;
                }
            }

            let Some((rule, result)) = matched else {
                if context.fallthrough() && zero_width_switches < MAX_ZERO_WIDTH_SWITCHES {
                    zero_width_switches += 1;
                    self.switch(context.fallthrough_context(), Vec::new());
                    continue;
                }
                let next = text[offset..]
                    .chars()
                    .next()
                    .map_or(text.len(), |c| offset + c.len_utf8());
                self.push_span(offset, next, context.attribute_format());
                offset = next;
                zero_width_switches = 0;
                continue;
            };

            let end = result.offset();
            for region in [rule.end_region(), rule.begin_region()].into_iter().flatten() {
                self.folding.push(FoldingMarker { offset, region });
            }

            if rule.look_ahead() {
                zero_width_switches += 1;
                if zero_width_switches > MAX_ZERO_WIDTH_SWITCHES {
                    debug!(offset, "Endless look-ahead switching, consuming the rest of the line");
                    self.push_span(offset, text.len(), context.attribute_format());
                    break;
                }
                self.switch(rule.context(), result.into_captures().unwrap_or_default());
                continue;
            }

            // Without its own attribute a match takes the format of the
            // context it switched to.
            self.switch(rule.context(), result.into_captures().unwrap_or_default());
            let format = rule
                .attribute_format()
                .or_else(|| repo.context(self.top()).and_then(|c| c.attribute_format()));
            self.push_span(offset, end, format);
            if end == text.len() && rule.is_line_continue() {
                line_continue = true;
            }
            offset = end;
            zero_width_switches = 0;
        }

        if line_continue {
            return;
        }
        for _ in 0..MAX_ZERO_WIDTH_SWITCHES {
            let Some(context) = repo.context(self.top()) else {
                return;
            };
            if context.line_end().is_stay() || !self.switch(context.line_end(), Vec::new()) {
                return;
            }
        }
        debug!("Endless context switching at line end");
    }
}
