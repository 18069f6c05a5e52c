use super::MatchResult;
use super::scan;
use crate::error::SyntaxError;
use crate::keyword_list::CaseSensitivity;
use onig::{Regex, RegexOptions, Region, SearchOptions, Syntax};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Compiled dynamic variants kept per rule before the cache is flushed.
const DYNAMIC_CACHE_LIMIT: usize = 64;

/// Payload of a `RegExpr` rule.
#[derive(Debug)]
pub struct RegExpr {
    pattern: String,
    minimal: bool,
    case_sensitivity: CaseSensitivity,
    dynamic: bool,
    compiled: Option<Arc<Regex>>,
    dynamic_cache: RefCell<HashMap<String, Arc<Regex>>>,
}

impl RegExpr {
    pub(crate) fn new(
        pattern: &str,
        minimal: bool,
        case_sensitivity: CaseSensitivity,
        dynamic: bool,
    ) -> Result<Self, SyntaxError> {
        if pattern.is_empty() {
            return Err(SyntaxError::MissingAttribute {
                rule: "RegExpr",
                attribute: "String",
            });
        }

        // Dynamic patterns contain `%N` placeholders and are compiled per match.
        let compiled = if dynamic {
            None
        } else {
            Some(Arc::new(compile(pattern, minimal, case_sensitivity)?))
        };

        Ok(Self {
            pattern: pattern.to_string(),
            minimal,
            case_sensitivity,
            dynamic,
            compiled,
            dynamic_cache: RefCell::new(HashMap::new()),
        })
    }

    /// The pattern as written in the grammar.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether quantifiers are non-greedy.
    pub fn is_minimal(&self) -> bool {
        self.minimal
    }

    /// Case sensitivity of the pattern.
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Whether `%N` placeholders are substituted from captures.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn matches(&self, text: &str, offset: usize, captures: &[String]) -> MatchResult {
        let regex = if self.dynamic {
            let pattern = scan::replace_captures(&self.pattern, captures, true);
            match self.dynamic_regex(&pattern) {
                Some(regex) => regex,
                None => return MatchResult::at(offset),
            }
        } else {
            match &self.compiled {
                Some(regex) => Arc::clone(regex),
                None => return MatchResult::at(offset),
            }
        };

        let mut region = Region::new();
        let hit = regex.search_with_options(
            text,
            offset,
            text.len(),
            SearchOptions::SEARCH_OPTION_NONE,
            Some(&mut region),
        );

        match hit.and_then(|_| region.pos(0)) {
            Some((start, end)) if start == offset => {
                if region.len() > 1 {
                    let captured = (0..region.len())
                        .map(|i| {
                            region
                                .pos(i)
                                .map(|(s, e)| text[s..e].to_string())
                                .unwrap_or_default()
                        })
                        .collect();
                    MatchResult::with_captures(end, captured)
                } else {
                    MatchResult::at(end)
                }
            }
            // Nothing can match before the next hit.
            Some((start, _)) => MatchResult::with_skip(offset, start),
            None => MatchResult::with_skip(offset, text.len()),
        }
    }

    fn dynamic_regex(&self, pattern: &str) -> Option<Arc<Regex>> {
        let mut cache = self.dynamic_cache.borrow_mut();
        if let Some(regex) = cache.get(pattern) {
            return Some(Arc::clone(regex));
        }

        let regex = match compile(pattern, self.minimal, self.case_sensitivity) {
            Ok(regex) => Arc::new(regex),
            Err(err) => {
                debug!(%err, "Dynamic pattern failed to compile");
                return None;
            }
        };
        if cache.len() >= DYNAMIC_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(pattern.to_string(), Arc::clone(&regex));
        Some(regex)
    }

    #[cfg(test)]
    fn cached_variants(&self) -> usize {
        self.dynamic_cache.borrow().len()
    }
}

fn compile(
    pattern: &str,
    minimal: bool,
    case_sensitivity: CaseSensitivity,
) -> Result<Regex, SyntaxError> {
    let source = if minimal {
        invert_greediness(pattern)
    } else {
        pattern.to_string()
    };
    let options = match case_sensitivity {
        CaseSensitivity::Sensitive => RegexOptions::REGEX_OPTION_NONE,
        CaseSensitivity::Insensitive => RegexOptions::REGEX_OPTION_IGNORECASE,
    };
    Regex::with_options(&source, options, Syntax::perl_ng()).map_err(|e| {
        SyntaxError::RegexCompile {
            pattern: source,
            message: e.to_string(),
        }
    })
}

/// Swap greedy and lazy quantifiers: `a*` becomes `a*?` and `a*?` becomes `a*`.
///
/// Escapes, character classes and `(?` group prefixes are copied untouched.
/// Possessive quantifiers (`a*+`) stay possessive.
pub(crate) fn invert_greediness(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            }
            '[' => i = copy_class(&chars, i, &mut out),
            '(' => {
                out.push(c);
                if chars.get(i + 1) == Some(&'?') {
                    out.push('?');
                    i += 1;
                }
            }
            '*' | '+' | '?' => {
                out.push(c);
                i = toggle_lazy(&chars, i, &mut out);
            }
            '{' => match interval_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = toggle_lazy(&chars, end, &mut out);
                }
                None => out.push(c),
            },
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Copies the bracket expression starting at `start` and returns the index of
/// its closing `]` (or the last index if unterminated).
///
/// Inside the class a `[` is a literal unless it opens a POSIX `[:name:]`.
fn copy_class(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('[');
    let mut i = start + 1;
    if chars.get(i) == Some(&'^') {
        out.push('^');
        i += 1;
    }
    // A `]` right after `[` or `[^` is a literal.
    if chars.get(i) == Some(&']') {
        out.push(']');
        i += 1;
    }
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        match c {
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            }
            '[' if chars.get(i + 1) == Some(&':') => {
                if let Some(len) = chars[i + 2..].windows(2).position(|w| w == [':', ']']) {
                    let close = i + 2 + len + 1;
                    out.extend(&chars[i + 1..=close]);
                    i = close;
                }
            }
            ']' => return i,
            _ => {}
        }
        i += 1;
    }
    chars.len().saturating_sub(1)
}

/// Index of the `}` closing a `{n}`, `{n,}`, `{,m}` or `{n,m}` quantifier.
fn interval_end(chars: &[char], start: usize) -> Option<usize> {
    let mut digits = 0;
    let mut comma = false;
    for (i, &c) in chars.iter().enumerate().skip(start + 1) {
        match c {
            '0'..='9' => digits += 1,
            ',' if !comma => comma = true,
            '}' if digits > 0 => return Some(i),
            _ => return None,
        }
    }
    None
}

/// Called with `i` on the last char of a quantifier. Returns the index of the
/// last consumed char.
fn toggle_lazy(chars: &[char], i: usize, out: &mut String) -> usize {
    match chars.get(i + 1) {
        Some('?') => i + 1,
        Some('+') => {
            out.push('+');
            i + 1
        }
        _ => {
            out.push('?');
            i
        }
    }
}
