//! The rule family: atomic matchers tried in order inside a context.

mod regexpr;
pub(crate) mod scan;

pub use regexpr::RegExpr;

use crate::context_switch::ContextSwitch;
use crate::definition::Definition;
use crate::delimiters::WordDelimiters;
use crate::error::SyntaxError;
use crate::folding::{FoldingKind, FoldingRegion};
use crate::format::FormatId;
use crate::handle::DefinitionRef;
use crate::ids::LoadScope;
use crate::keyword_list::CaseSensitivity;
use crate::xml;
use roxmltree::Node;
use std::sync::Arc;
use tracing::debug;

/// Outcome of [`Rule::matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    offset: usize,
    skip_offset: Option<usize>,
    captures: Option<Vec<String>>,
}

impl MatchResult {
    /// A result ending at `offset`. Equal to the input offset means no match.
    pub fn at(offset: usize) -> Self {
        Self {
            offset,
            skip_offset: None,
            captures: None,
        }
    }

    /// No match, but the rule cannot match before `skip_offset` either.
    pub fn with_skip(offset: usize, skip_offset: usize) -> Self {
        Self {
            offset,
            skip_offset: Some(skip_offset),
            captures: None,
        }
    }

    /// A match that also produced capture groups (group 0 first).
    pub fn with_captures(offset: usize, captures: Vec<String>) -> Self {
        Self {
            offset,
            skip_offset: None,
            captures: Some(captures),
        }
    }

    /// The new offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Where the next attempt of the same rule may start.
    pub fn skip_offset(&self) -> Option<usize> {
        self.skip_offset
    }

    /// Captured texts of a capturing `RegExpr`.
    pub fn captures(&self) -> Option<&[String]> {
        self.captures.as_deref()
    }

    /// Consume the result, keeping only the captures.
    pub fn into_captures(self) -> Option<Vec<String>> {
        self.captures
    }
}

/// Reference to another context whose rules get spliced in at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRules {
    context_name: Option<String>,
    definition_name: Option<String>,
    include_attribute: bool,
}

impl IncludeRules {
    /// Included context name. `None` means the initial context of the definition.
    pub fn context_name(&self) -> Option<&str> {
        self.context_name.as_deref()
    }

    /// Definition to look the context up in. `None` means the owning one.
    pub fn definition_name(&self) -> Option<&str> {
        self.definition_name.as_deref()
    }

    /// Whether spliced rules without an attribute use the included context's format.
    pub fn include_attribute(&self) -> bool {
        self.include_attribute
    }
}

/// Variant-specific rule data.
#[derive(Debug)]
pub enum RuleKind {
    /// One of a set of characters.
    AnyChar {
        /// Accepted characters.
        chars: String,
    },
    /// A single character, or the first character of a capture when dynamic.
    DetectChar {
        /// The character, or the capture index digit when dynamic.
        char: char,
        /// Read the character from the captures.
        dynamic: bool,
    },
    /// Two consecutive characters.
    Detect2Chars {
        /// First character.
        first: char,
        /// Second character.
        second: char,
    },
    /// `[letter_][letter digit _]*`.
    DetectIdentifier,
    /// A run of whitespace.
    DetectSpaces,
    /// A floating point literal.
    Float,
    /// An integer literal.
    Int,
    /// A C character literal.
    HlCChar,
    /// A C hexadecimal literal.
    HlCHex,
    /// A C octal literal.
    HlCOct,
    /// A C escape sequence.
    HlCStringChar,
    /// Resolved away at load time; never matches.
    IncludeRules(IncludeRules),
    /// A word from a keyword list.
    Keyword {
        /// Keyword list name.
        list: String,
        /// Overrides the list's default sensitivity.
        case_sensitivity: Option<CaseSensitivity>,
    },
    /// The continuation character as the last character of the line.
    LineContinue {
        /// Continuation character.
        char: char,
    },
    /// Begin character through the first end character on the line.
    RangeDetect {
        /// Opening character.
        begin: char,
        /// Closing character.
        end: char,
    },
    /// A regular expression anchored at the offset.
    RegExpr(RegExpr),
    /// A literal string.
    StringDetect {
        /// The string, with `%N` placeholders when dynamic.
        string: String,
        /// Comparison mode.
        case_sensitivity: CaseSensitivity,
        /// Substitute captures into the string.
        dynamic: bool,
    },
    /// A literal string bounded by word delimiters.
    WordDetect {
        /// The word.
        word: String,
        /// Comparison mode.
        case_sensitivity: CaseSensitivity,
    },
}

impl RuleKind {
    fn load(name: &str, node: Node<'_, '_>, scope: &LoadScope<'_>) -> Result<Self, SyntaxError> {
        let insensitive = || CaseSensitivity::from_insensitive_flag(xml::bool_attr(node, "insensitive"));
        let required_char = |rule: &'static str, attribute: &'static str| {
            xml::first_char(node, attribute)
                .ok_or(SyntaxError::MissingAttribute { rule, attribute })
        };
        let required_string = |rule: &'static str| match xml::attr(node, "String") {
            "" => Err(SyntaxError::MissingAttribute {
                rule,
                attribute: "String",
            }),
            s => Ok(s.to_string()),
        };

        let kind = match name {
            "AnyChar" => {
                let chars = required_string("AnyChar")?;
                if chars.chars().count() == 1 {
                    debug!(chars = %chars, "AnyChar rule with a single character");
                }
                Self::AnyChar { chars }
            }
            "DetectChar" => Self::DetectChar {
                char: required_char("DetectChar", "char")?,
                dynamic: xml::bool_attr(node, "dynamic"),
            },
            "Detect2Chars" => Self::Detect2Chars {
                first: required_char("Detect2Chars", "char")?,
                second: required_char("Detect2Chars", "char1")?,
            },
            "DetectIdentifier" => Self::DetectIdentifier,
            "DetectSpaces" => Self::DetectSpaces,
            "Float" => Self::Float,
            "Int" => Self::Int,
            "HlCChar" => Self::HlCChar,
            "HlCHex" => Self::HlCHex,
            "HlCOct" => Self::HlCOct,
            "HlCStringChar" => Self::HlCStringChar,
            "IncludeRules" => {
                let target = xml::attr(node, "context");
                let (context, definition) = target.split_once("##").unwrap_or((target, ""));
                if context.is_empty() && definition.is_empty() {
                    return Err(SyntaxError::MissingAttribute {
                        rule: "IncludeRules",
                        attribute: "context",
                    });
                }
                Self::IncludeRules(IncludeRules {
                    context_name: (!context.is_empty()).then(|| context.to_string()),
                    definition_name: (!definition.is_empty()).then(|| definition.to_string()),
                    include_attribute: xml::bool_attr(node, "includeAttrib"),
                })
            }
            "keyword" => {
                let list = required_string("keyword")?;
                match scope.keyword_lists.get(&list) {
                    None => return Err(SyntaxError::UnknownKeywordList(list)),
                    Some(l) if l.is_empty() => return Err(SyntaxError::EmptyKeywordList(list)),
                    Some(_) => {}
                }
                Self::Keyword {
                    list,
                    case_sensitivity: node
                        .attribute("insensitive")
                        .map(|v| CaseSensitivity::from_insensitive_flag(xml::attr_to_bool(v))),
                }
            }
            "LineContinue" => Self::LineContinue {
                char: xml::first_char(node, "char").unwrap_or('\\'),
            },
            "RangeDetect" => Self::RangeDetect {
                begin: required_char("RangeDetect", "char")?,
                end: required_char("RangeDetect", "char1")?,
            },
            "RegExpr" => Self::RegExpr(RegExpr::new(
                xml::attr(node, "String"),
                xml::bool_attr(node, "minimal"),
                insensitive(),
                xml::bool_attr(node, "dynamic"),
            )?),
            "StringDetect" => Self::StringDetect {
                string: required_string("StringDetect")?,
                case_sensitivity: insensitive(),
                dynamic: xml::bool_attr(node, "dynamic"),
            },
            "WordDetect" => Self::WordDetect {
                word: required_string("WordDetect")?,
                case_sensitivity: insensitive(),
            },
            other => return Err(SyntaxError::UnknownRule(other.to_string())),
        };
        Ok(kind)
    }

    /// Grammar element name of the variant.
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::AnyChar { .. } => "AnyChar",
            Self::DetectChar { .. } => "DetectChar",
            Self::Detect2Chars { .. } => "Detect2Chars",
            Self::DetectIdentifier => "DetectIdentifier",
            Self::DetectSpaces => "DetectSpaces",
            Self::Float => "Float",
            Self::Int => "Int",
            Self::HlCChar => "HlCChar",
            Self::HlCHex => "HlCHex",
            Self::HlCOct => "HlCOct",
            Self::HlCStringChar => "HlCStringChar",
            Self::IncludeRules(_) => "IncludeRules",
            Self::Keyword { .. } => "keyword",
            Self::LineContinue { .. } => "LineContinue",
            Self::RangeDetect { .. } => "RangeDetect",
            Self::RegExpr(_) => "RegExpr",
            Self::StringDetect { .. } => "StringDetect",
            Self::WordDetect { .. } => "WordDetect",
        }
    }
}

/// A single matcher of a context, with the switch and styling it applies.
#[derive(Debug)]
pub struct Rule {
    kind: RuleKind,
    attribute: String,
    attribute_format: Option<FormatId>,
    context: ContextSwitch,
    first_non_space: bool,
    look_ahead: bool,
    column: Option<usize>,
    begin_region: Option<FoldingRegion>,
    end_region: Option<FoldingRegion>,
    definition: DefinitionRef,
    word_delimiters: Arc<WordDelimiters>,
}

impl Rule {
    /// Build a rule from its grammar element.
    ///
    /// Folding-region ids are allocated before the variant is parsed, so a
    /// rule that is later rejected still reserves its region names.
    pub(crate) fn load(node: Node<'_, '_>, scope: &mut LoadScope<'_>) -> Result<Self, SyntaxError> {
        let name = node.tag_name().name();

        let context = if name == "IncludeRules" {
            ContextSwitch::default()
        } else {
            ContextSwitch::parse(xml::attr(node, "context"))
        };
        let begin_region = match xml::attr(node, "beginRegion") {
            "" => None,
            region => Some(FoldingRegion::new(
                FoldingKind::Begin,
                scope.folding_region_id(region),
            )),
        };
        let end_region = match xml::attr(node, "endRegion") {
            "" => None,
            region => Some(FoldingRegion::new(
                FoldingKind::End,
                scope.folding_region_id(region),
            )),
        };

        let kind = RuleKind::load(name, node, scope)?;
        let look_ahead = xml::bool_attr(node, "lookAhead");
        if look_ahead && context.is_stay() {
            return Err(SyntaxError::LookAheadWithoutSwitch(kind.element_name()));
        }

        Ok(Self {
            kind,
            attribute: xml::attr(node, "attribute").to_string(),
            attribute_format: None,
            context,
            first_non_space: xml::bool_attr(node, "firstNonSpace"),
            look_ahead,
            column: node.attribute("column").and_then(|c| c.trim().parse().ok()),
            begin_region,
            end_region,
            definition: scope.definition,
            word_delimiters: Arc::default(),
        })
    }

    /// Variant data.
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Format name, empty if a match takes the format of the context it
    /// switches to.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Resolved format id of [`Rule::attribute`].
    pub fn attribute_format(&self) -> Option<FormatId> {
        self.attribute_format
    }

    /// Context switch applied on match.
    pub fn context(&self) -> &ContextSwitch {
        &self.context
    }

    /// Only match at the first non-space character of the line.
    pub fn first_non_space(&self) -> bool {
        self.first_non_space
    }

    /// Switch context without consuming the match.
    pub fn look_ahead(&self) -> bool {
        self.look_ahead
    }

    /// Only match at this (character) column.
    pub fn column(&self) -> Option<usize> {
        self.column
    }

    /// Folding region opened by a match.
    pub fn begin_region(&self) -> Option<FoldingRegion> {
        self.begin_region
    }

    /// Folding region closed by a match.
    pub fn end_region(&self) -> Option<FoldingRegion> {
        self.end_region
    }

    /// Definition the rule was declared in.
    pub fn definition(&self) -> DefinitionRef {
        self.definition
    }

    /// Whether the result depends on the captures passed to [`Rule::matches`].
    pub fn is_dynamic(&self) -> bool {
        match &self.kind {
            RuleKind::DetectChar { dynamic, .. } | RuleKind::StringDetect { dynamic, .. } => {
                *dynamic
            }
            RuleKind::RegExpr(re) => re.is_dynamic(),
            _ => false,
        }
    }

    /// `true` for `LineContinue` rules.
    pub fn is_line_continue(&self) -> bool {
        matches!(self.kind, RuleKind::LineContinue { .. })
    }

    pub(crate) fn context_mut(&mut self) -> &mut ContextSwitch {
        &mut self.context
    }

    pub(crate) fn set_attribute_format(&mut self, format: Option<FormatId>) {
        self.attribute_format = format;
    }

    pub(crate) fn bind_word_delimiters(&mut self, delimiters: Arc<WordDelimiters>) {
        self.word_delimiters = delimiters;
    }

    /// Try the rule at `offset` of `text`.
    ///
    /// `captures` are the texts captured by the last capturing rule that
    /// pushed the current context. `definition` must be the definition owning
    /// the rule; keyword rules read their list from it.
    pub fn matches(
        &self,
        text: &str,
        offset: usize,
        captures: &[String],
        definition: &Definition,
    ) -> MatchResult {
        if offset >= text.len() {
            return MatchResult::at(offset);
        }
        let delimiters = self.word_delimiters.as_ref();

        let end = match &self.kind {
            RuleKind::AnyChar { chars } => match scan::char_at(text, offset) {
                Some(c) if chars.contains(c) => offset + c.len_utf8(),
                _ => offset,
            },
            RuleKind::DetectChar { char, dynamic } => {
                let expected = if *dynamic {
                    match char.to_digit(10).map(|d| d as usize) {
                        Some(index) if index > 0 => {
                            match captures.get(index).and_then(|c| c.chars().next()) {
                                Some(c) => c,
                                None => return MatchResult::at(offset),
                            }
                        }
                        _ => return MatchResult::at(offset),
                    }
                } else {
                    *char
                };
                match scan::char_at(text, offset) {
                    Some(c) if c == expected => offset + c.len_utf8(),
                    _ => offset,
                }
            }
            RuleKind::Detect2Chars { first, second } => {
                let mut chars = text[offset..].chars();
                match (chars.next(), chars.next()) {
                    (Some(a), Some(b)) if a == *first && b == *second => {
                        offset + a.len_utf8() + b.len_utf8()
                    }
                    _ => offset,
                }
            }
            RuleKind::DetectIdentifier => scan::identifier(text, offset),
            RuleKind::DetectSpaces => scan::spaces(text, offset),
            RuleKind::Float => scan::float(text, offset, delimiters),
            RuleKind::Int => scan::int(text, offset, delimiters),
            RuleKind::HlCChar => scan::c_char(text, offset),
            RuleKind::HlCHex => scan::c_hex(text, offset, delimiters),
            RuleKind::HlCOct => scan::c_oct(text, offset, delimiters),
            RuleKind::HlCStringChar => scan::escaped_char(text, offset),
            RuleKind::IncludeRules(_) => offset,
            RuleKind::Keyword {
                list,
                case_sensitivity,
            } => {
                let end = text[offset..]
                    .char_indices()
                    .find(|(_, c)| delimiters.contains(*c))
                    .map_or(text.len(), |(i, _)| offset + i);
                if end == offset {
                    return MatchResult::at(offset);
                }

                let word = &text[offset..end];
                let known = definition.keyword_list(list).is_some_and(|l| match case_sensitivity {
                    Some(cs) => l.contains_with(word, *cs),
                    None => l.contains(word),
                });
                // A keyword cannot start inside the rejected token.
                return if known {
                    MatchResult::at(end)
                } else {
                    MatchResult::with_skip(offset, end)
                };
            }
            RuleKind::LineContinue { char } => match scan::char_at(text, offset) {
                Some(c) if c == *char && offset + c.len_utf8() == text.len() => text.len(),
                _ => offset,
            },
            RuleKind::RangeDetect { begin, end } => scan::range(text, offset, *begin, *end),
            RuleKind::RegExpr(re) => return re.matches(text, offset, captures),
            RuleKind::StringDetect {
                string,
                case_sensitivity,
                dynamic,
            } => {
                let literal = if *dynamic {
                    scan::replace_captures(string, captures, false)
                } else {
                    string.clone()
                };
                scan::literal(text, offset, &literal, *case_sensitivity).unwrap_or(offset)
            }
            RuleKind::WordDetect {
                word,
                case_sensitivity,
            } => word_detect(text, offset, word, *case_sensitivity, delimiters),
        };
        MatchResult::at(end)
    }
}

fn word_detect(
    text: &str,
    offset: usize,
    word: &str,
    case_sensitivity: CaseSensitivity,
    delimiters: &WordDelimiters,
) -> usize {
    let is_delimiter = |c: Option<char>| c.is_some_and(|c| delimiters.contains(c));

    if offset > 0
        && !is_delimiter(scan::char_before(text, offset))
        && !is_delimiter(scan::char_at(text, offset))
    {
        return offset;
    }

    let Some(end) = scan::literal(text, offset, word, case_sensitivity) else {
        return offset;
    };
    if end == text.len()
        || is_delimiter(scan::char_at(text, end))
        || is_delimiter(scan::char_before(text, end))
    {
        end
    } else {
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdAllocator;
    use crate::keyword_list::KeywordList;
    use std::collections::BTreeMap;

    fn load(xml_text: &str) -> Result<Rule, SyntaxError> {
        let doc = xml::parse_document(xml_text).expect("parse");
        let lists = BTreeMap::from([(
            "kw".to_string(),
            KeywordList::new("kw", vec!["if".to_string()]),
        )]);
        let mut ids = IdAllocator::default();
        let mut scope = LoadScope {
            definition: DefinitionRef::new(0, 0),
            definition_name: "Test",
            keyword_lists: &lists,
            ids: &mut ids,
            has_folding_regions: false,
        };
        Rule::load(doc.root_element(), &mut scope)
    }

    #[test]
    fn test_common_attributes() {
        let rule = load(
            r#"<DetectChar char="{" attribute="Symbol" context="Block" firstNonSpace="1" column="0" beginRegion="Brace"/>"#,
        )
        .expect("rule");
        assert_eq!(rule.kind().element_name(), "DetectChar");
        assert_eq!(rule.attribute(), "Symbol");
        assert_eq!(rule.context().context_name(), Some("Block"));
        assert!(rule.first_non_space());
        assert_eq!(rule.column(), Some(0));
        assert_eq!(rule.begin_region().map(|r| r.signed_id()), Some(1));
        assert_eq!(rule.end_region(), None);
        assert!(!rule.is_dynamic());
    }

    #[test]
    fn test_look_ahead_requires_switch() {
        let err = load(r#"<DetectChar char="x" lookAhead="1"/>"#).unwrap_err();
        assert!(matches!(err, SyntaxError::LookAheadWithoutSwitch("DetectChar")));
        assert!(load(r##"<DetectChar char="x" lookAhead="1" context="#pop"/>"##).is_ok());
    }

    #[test]
    fn test_rejected_rules() {
        assert!(matches!(
            load(r#"<DetectChar/>"#),
            Err(SyntaxError::MissingAttribute {
                rule: "DetectChar",
                attribute: "char"
            })
        ));
        assert!(matches!(
            load(r#"<RangeDetect char="("/>"#),
            Err(SyntaxError::MissingAttribute {
                attribute: "char1",
                ..
            })
        ));
        assert!(matches!(
            load(r#"<Bogus/>"#),
            Err(SyntaxError::UnknownRule(name)) if name == "Bogus"
        ));
        assert!(matches!(
            load(r#"<keyword String="missing"/>"#),
            Err(SyntaxError::UnknownKeywordList(_))
        ));
        assert!(matches!(
            load(r#"<StringDetect String=""/>"#),
            Err(SyntaxError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_include_rules_target() {
        let rule = load(r#"<IncludeRules context="Normal##C++" includeAttrib="true"/>"#)
            .expect("rule");
        let RuleKind::IncludeRules(include) = rule.kind() else {
            panic!("expected IncludeRules");
        };
        assert_eq!(include.context_name(), Some("Normal"));
        assert_eq!(include.definition_name(), Some("C++"));
        assert!(include.include_attribute());
        assert!(rule.context().is_stay());

        let rule = load(r###"<IncludeRules context="##Doxygen"/>"###).expect("rule");
        let RuleKind::IncludeRules(include) = rule.kind() else {
            panic!("expected IncludeRules");
        };
        assert_eq!(include.context_name(), None);
        assert_eq!(include.definition_name(), Some("Doxygen"));
    }

    #[test]
    fn test_keyword_override_and_defaults() {
        let rule = load(r#"<keyword String="kw" insensitive="true"/>"#).expect("rule");
        assert!(matches!(
            rule.kind(),
            RuleKind::Keyword {
                case_sensitivity: Some(CaseSensitivity::Insensitive),
                ..
            }
        ));

        let rule = load(r#"<LineContinue/>"#).expect("rule");
        assert!(rule.is_line_continue());
        assert!(matches!(rule.kind(), RuleKind::LineContinue { char: '\\' }));
    }

    #[test]
    fn test_word_detect_boundaries() {
        let d = WordDelimiters::default();
        let cs = CaseSensitivity::Sensitive;
        assert_eq!(word_detect("a foo b", 2, "foo", cs, &d), 5);
        assert_eq!(word_detect("afoo b", 1, "foo", cs, &d), 1);
        assert_eq!(word_detect("a foob", 2, "foo", cs, &d), 2);
        assert_eq!(word_detect("foo", 0, "foo", cs, &d), 3);
        assert_eq!(word_detect("a FOO", 2, "foo", CaseSensitivity::Insensitive, &d), 5);
    }
}
