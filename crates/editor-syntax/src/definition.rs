use crate::context::Context;
use crate::delimiters::WordDelimiters;
use crate::error::SyntaxError;
use crate::format::{Format, FormatId};
use crate::handle::{ContextRef, DefinitionRef};
use crate::ids::{IdAllocator, LoadScope};
use crate::keyword_list::{CaseSensitivity, KeywordList};
use crate::rule::Rule;
use crate::xml;
use globset::{Glob, GlobSet, GlobSetBuilder};
use roxmltree::Node;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Highest `kateversion` major this engine understands.
pub const SUPPORTED_KATE_VERSION_MAJOR: u32 = 5;
/// Highest `kateversion` minor (for the supported major).
pub const SUPPORTED_KATE_VERSION_MINOR: u32 = 62;

/// Where a single-line comment marker goes when commenting out a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentPosition {
    /// Column 0.
    #[default]
    StartOfLine,
    /// After the leading whitespace.
    AfterWhitespace,
}

/// Progress of the lazy grammar load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LoadState {
    /// Only metadata is known.
    #[default]
    Unloaded,
    /// Keyword lists are parsed and their includes resolved.
    KeywordsOnly,
    /// Contexts, rules, formats and general settings are parsed and resolved.
    FullyLoaded,
}

/// Backing text of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionSource {
    /// A grammar file, re-read on every load.
    File(PathBuf),
    /// Grammar text held in memory.
    Inline(Arc<str>),
}

impl DefinitionSource {
    pub(crate) fn read(&self) -> Result<Arc<str>, SyntaxError> {
        match self {
            Self::File(path) => Ok(Arc::from(std::fs::read_to_string(path)?)),
            Self::Inline(text) => Ok(Arc::clone(text)),
        }
    }

    /// The file path, for file-backed definitions.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Inline(_) => None,
        }
    }
}

/// `<language>` attributes, known without loading the grammar body.
#[derive(Debug, Clone, Default)]
pub(crate) struct Metadata {
    pub(crate) name: String,
    pub(crate) section: String,
    pub(crate) version: f32,
    pub(crate) priority: i32,
    pub(crate) hidden: bool,
    pub(crate) style: String,
    pub(crate) indenter: String,
    pub(crate) author: String,
    pub(crate) license: String,
    pub(crate) extensions: Vec<String>,
    pub(crate) mime_types: Vec<String>,
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Metadata {
    /// Reads `<language>`, rejecting grammars newer than this engine.
    pub(crate) fn load(language: Node<'_, '_>) -> Result<Self, SyntaxError> {
        if language.tag_name().name() != "language" {
            return Err(SyntaxError::MissingLanguage);
        }
        check_kate_version(language.attribute("kateversion").unwrap_or_default())?;

        Ok(Self {
            name: xml::attr(language, "name").to_string(),
            section: xml::attr(language, "section").to_string(),
            version: xml::attr(language, "version").trim().parse().unwrap_or(0.0),
            priority: xml::attr(language, "priority").trim().parse().unwrap_or(0),
            hidden: xml::bool_attr(language, "hidden"),
            style: xml::attr(language, "style").to_string(),
            indenter: xml::attr(language, "indenter").to_string(),
            author: xml::attr(language, "author").to_string(),
            license: xml::attr(language, "license").to_string(),
            extensions: split_list(xml::attr(language, "extensions")),
            mime_types: split_list(xml::attr(language, "mimetype")),
        })
    }
}

/// Checks a `major.minor` version string against the supported version.
pub fn check_kate_version(version: &str) -> Result<(), SyntaxError> {
    let invalid = || SyntaxError::InvalidVersion(version.to_string());
    let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
    if major.is_empty() {
        return Err(invalid());
    }
    let major: u32 = major.trim().parse().map_err(|_| invalid())?;
    let minor: u32 = minor.trim().parse().unwrap_or(0);

    if major > SUPPORTED_KATE_VERSION_MAJOR
        || (major == SUPPORTED_KATE_VERSION_MAJOR && minor > SUPPORTED_KATE_VERSION_MINOR)
    {
        return Err(SyntaxError::UnsupportedVersion {
            version: version.to_string(),
            supported: format!("{SUPPORTED_KATE_VERSION_MAJOR}.{SUPPORTED_KATE_VERSION_MINOR}"),
        });
    }
    Ok(())
}

/// A named grammar.
///
/// Created from metadata only; [`crate::Repository::load`] fills in the body.
/// Accessors for body data return empty values until then.
#[derive(Debug)]
pub struct Definition {
    handle: DefinitionRef,
    source: DefinitionSource,
    meta: Metadata,
    extension_globs: GlobSet,
    state: LoadState,
    case_sensitivity: CaseSensitivity,
    word_delimiters: Arc<WordDelimiters>,
    word_wrap_delimiters: WordDelimiters,
    single_line_comment_marker: String,
    single_line_comment_position: CommentPosition,
    multi_line_comment_marker: (String, String),
    character_encodings: Vec<(char, String)>,
    formats: Vec<Format>,
    format_index: HashMap<String, usize>,
    contexts: Vec<Context>,
    rules: Vec<Rule>,
    keyword_lists: BTreeMap<String, KeywordList>,
    folding_ignore_list: Vec<String>,
    indentation_based_folding: bool,
    has_folding_regions: bool,
}

impl Definition {
    pub(crate) fn new(meta: Metadata, source: DefinitionSource) -> Self {
        let extension_globs = build_globs(&meta.name, &meta.extensions);
        Self {
            handle: DefinitionRef::new(0, 0),
            source,
            meta,
            extension_globs,
            state: LoadState::Unloaded,
            case_sensitivity: CaseSensitivity::Sensitive,
            word_delimiters: Arc::default(),
            word_wrap_delimiters: WordDelimiters::default(),
            single_line_comment_marker: String::new(),
            single_line_comment_position: CommentPosition::default(),
            multi_line_comment_marker: (String::new(), String::new()),
            character_encodings: Vec::new(),
            formats: Vec::new(),
            format_index: HashMap::new(),
            contexts: Vec::new(),
            rules: Vec::new(),
            keyword_lists: BTreeMap::new(),
            folding_ignore_list: Vec::new(),
            indentation_based_folding: false,
            has_folding_regions: false,
        }
    }

    pub(crate) fn set_handle(&mut self, handle: DefinitionRef) {
        self.handle = handle;
    }

    /// Drop everything but identity and metadata; the next load re-parses.
    pub(crate) fn clear(&mut self) {
        let meta = std::mem::take(&mut self.meta);
        let source = self.source.clone();
        let handle = self.handle;
        *self = Self::new(meta, source);
        self.handle = handle;
    }

    /// This definition's handle.
    pub fn handle(&self) -> DefinitionRef {
        self.handle
    }

    /// Where the grammar text comes from.
    pub fn source(&self) -> &DefinitionSource {
        &self.source
    }

    /// Load progress.
    pub fn load_state(&self) -> LoadState {
        self.state
    }

    /// `true` once the full body is parsed.
    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::FullyLoaded
    }

    /// Language name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Menu section, e.g. `Sources`.
    pub fn section(&self) -> &str {
        &self.meta.section
    }

    /// Grammar version.
    pub fn version(&self) -> f32 {
        self.meta.version
    }

    /// Among same-named grammars the highest priority wins.
    pub fn priority(&self) -> i32 {
        self.meta.priority
    }

    /// Hidden grammars are only used through includes.
    pub fn is_hidden(&self) -> bool {
        self.meta.hidden
    }

    #[allow(missing_docs)]
    pub fn style(&self) -> &str {
        &self.meta.style
    }

    #[allow(missing_docs)]
    pub fn indenter(&self) -> &str {
        &self.meta.indenter
    }

    #[allow(missing_docs)]
    pub fn author(&self) -> &str {
        &self.meta.author
    }

    #[allow(missing_docs)]
    pub fn license(&self) -> &str {
        &self.meta.license
    }

    /// File name globs, e.g. `*.c`.
    pub fn extensions(&self) -> &[String] {
        &self.meta.extensions
    }

    /// Mime types handled by the grammar.
    pub fn mime_types(&self) -> &[String] {
        &self.meta.mime_types
    }

    /// Whether `file_name` (a bare file name, not a path) matches one of the
    /// extension globs.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        self.extension_globs.is_match(file_name)
    }

    /// Default keyword case sensitivity.
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Binary search in the word delimiter set.
    pub fn is_word_delimiter(&self, c: char) -> bool {
        self.word_delimiters.contains(c)
    }

    /// Binary search in the word-wrap delimiter set.
    pub fn is_word_wrap_delimiter(&self, c: char) -> bool {
        self.word_wrap_delimiters.contains(c)
    }

    /// The word delimiter set.
    pub fn word_delimiters(&self) -> &WordDelimiters {
        &self.word_delimiters
    }

    /// The word-wrap delimiter set.
    pub fn word_wrap_delimiters(&self) -> &WordDelimiters {
        &self.word_wrap_delimiters
    }

    #[allow(missing_docs)]
    pub fn single_line_comment_marker(&self) -> &str {
        &self.single_line_comment_marker
    }

    #[allow(missing_docs)]
    pub fn single_line_comment_position(&self) -> CommentPosition {
        self.single_line_comment_position
    }

    /// `(start, end)` of a block comment; empty strings if none.
    pub fn multi_line_comment_marker(&self) -> (&str, &str) {
        (
            &self.multi_line_comment_marker.0,
            &self.multi_line_comment_marker.1,
        )
    }

    /// Spell-checking substitutions: a character and the text it stands for.
    pub fn character_encodings(&self) -> &[(char, String)] {
        &self.character_encodings
    }

    /// Formats sorted by id, which is document order.
    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    /// Format declared under `name`.
    pub fn format_by_name(&self, name: &str) -> Option<&Format> {
        self.format_index.get(name).map(|&i| &self.formats[i])
    }

    /// Contexts in document order.
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// Handle of the entry context.
    pub fn initial_context(&self) -> Option<ContextRef> {
        (!self.contexts.is_empty()).then(|| ContextRef::new(self.handle, 0))
    }

    /// Handle of the context called `name`.
    pub fn context_by_name(&self, name: &str) -> Option<ContextRef> {
        self.contexts
            .iter()
            .position(|c| c.name() == name)
            .map(|i| ContextRef::new(self.handle, i))
    }

    pub(crate) fn context_at(&self, index: usize) -> Option<&Context> {
        self.contexts.get(index)
    }

    pub(crate) fn context_at_mut(&mut self, index: usize) -> Option<&mut Context> {
        self.contexts.get_mut(index)
    }

    /// Rules declared in this definition, in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn rule_at_mut(&mut self, index: usize) -> Option<&mut Rule> {
        self.rules.get_mut(index)
    }

    /// Whether the resolved body points into `other`: spliced rules, context
    /// switches or an adopted attribute.
    pub(crate) fn references(&self, other: DefinitionRef) -> bool {
        let into_other = |target: Option<ContextRef>| target.is_some_and(|t| t.definition() == other);
        self.contexts.iter().any(|context| {
            [context.line_end(), context.line_empty(), context.fallthrough_context()]
                .into_iter()
                .any(|switch| into_other(switch.target()))
                || into_other(context.attribute_context())
                || context.rules().iter().any(|r| r.definition() == other)
        }) || self.rules.iter().any(|rule| into_other(rule.context().target()))
    }

    /// Keyword lists by name.
    pub fn keyword_lists(&self) -> &BTreeMap<String, KeywordList> {
        &self.keyword_lists
    }

    /// Keyword list called `name`.
    pub fn keyword_list(&self, name: &str) -> Option<&KeywordList> {
        self.keyword_lists.get(name)
    }

    /// Replace the keywords of an existing list. Returns `false` if there is
    /// no list called `name`.
    pub fn set_keyword_list(&mut self, name: &str, keywords: Vec<String>) -> bool {
        match self.keyword_lists.get_mut(name) {
            Some(list) => {
                list.set_keywords(keywords);
                true
            }
            None => false,
        }
    }

    /// Regexes of lines ignored by indentation-based folding.
    pub fn folding_ignore_list(&self) -> &[String] {
        &self.folding_ignore_list
    }

    /// `<folding indentationsensitive="1">`.
    pub fn indentation_based_folding_enabled(&self) -> bool {
        self.indentation_based_folding
    }

    /// Whether any rule of this definition opens or closes a folding region.
    pub fn has_folding_regions(&self) -> bool {
        self.has_folding_regions
    }

    /// Parses the grammar body. `language` has already passed the version gate;
    /// the metadata registered with the repository is kept as is.
    ///
    /// Keyword lists are parsed only once per load cycle, so lists edited
    /// through [`Definition::set_keyword_list`] after a keyword-only load
    /// survive the full load.
    pub(crate) fn parse_body(
        &mut self,
        language: Node<'_, '_>,
        ids: &mut IdAllocator,
        keywords_only: bool,
    ) {
        if let Some(value) = language.attribute("casesensitive") {
            self.case_sensitivity = CaseSensitivity::from_insensitive_flag(!xml::attr_to_bool(value));
        }

        let highlighting = xml::child_elements(language).find(|n| n.has_tag_name("highlighting"));
        let general = xml::child_elements(language).find(|n| n.has_tag_name("general"));

        if self.state == LoadState::Unloaded {
            if let Some(highlighting) = highlighting {
                for node in xml::child_elements(highlighting).filter(|n| n.has_tag_name("list")) {
                    let list = KeywordList::load(node);
                    self.keyword_lists.insert(list.name().to_string(), list);
                }
            }
            let names: Vec<String> = self.keyword_lists.keys().cloned().collect();
            for name in names {
                KeywordList::resolve_include_keywords(&mut self.keyword_lists, &name);
            }
            self.state = LoadState::KeywordsOnly;
        }

        if let Some(keywords) = general
            .and_then(|g| xml::child_elements(g).find(|n| n.has_tag_name("keywords")))
            && let Some(value) = keywords.attribute("casesensitive")
        {
            self.case_sensitivity = CaseSensitivity::from_insensitive_flag(!xml::attr_to_bool(value));
        }
        for list in self.keyword_lists.values_mut() {
            list.set_case_sensitivity(self.case_sensitivity);
        }

        if keywords_only {
            return;
        }

        // Rules bind the delimiter set at resolve time, but parsing <general>
        // first keeps the set final before any rule exists.
        if let Some(general) = general {
            self.load_general(general);
        }

        if let Some(highlighting) = highlighting {
            let mut scope = LoadScope {
                definition: self.handle,
                definition_name: &self.meta.name,
                keyword_lists: &self.keyword_lists,
                ids: &mut *ids,
                has_folding_regions: false,
            };
            for node in xml::child_elements(highlighting).filter(|n| n.has_tag_name("contexts")) {
                for context in xml::child_elements(node).filter(|n| n.has_tag_name("context")) {
                    self.contexts
                        .push(Context::load(context, &mut scope, &mut self.rules));
                }
            }
            self.has_folding_regions |= scope.has_folding_regions;

            for node in xml::child_elements(highlighting).filter(|n| n.has_tag_name("itemDatas")) {
                for item in xml::child_elements(node).filter(|n| n.has_tag_name("itemData")) {
                    let format = Format::load(item, self.handle, ids.next_format_id());
                    self.insert_format(format);
                }
            }
        }

        self.state = LoadState::FullyLoaded;
    }

    fn insert_format(&mut self, format: Format) {
        if let Some(old) = self.format_index.remove(format.name()) {
            self.formats.remove(old);
            for index in self.format_index.values_mut() {
                if *index > old {
                    *index -= 1;
                }
            }
        }
        self.format_index
            .insert(format.name().to_string(), self.formats.len());
        self.formats.push(format);
    }

    fn load_general(&mut self, general: Node<'_, '_>) {
        for node in xml::child_elements(general) {
            match node.tag_name().name() {
                "keywords" => {
                    // Repeated <keywords> elements adjust the set cumulatively.
                    let mut delimiters = WordDelimiters::clone(&self.word_delimiters);
                    delimiters.add(xml::attr(node, "additionalDeliminator"));
                    delimiters.remove(xml::attr(node, "weakDeliminator"));

                    let wrap = xml::attr(node, "wordWrapDeliminator");
                    self.word_wrap_delimiters = if wrap.is_empty() {
                        delimiters.clone()
                    } else {
                        WordDelimiters::from_chars(wrap)
                    };
                    self.word_delimiters = Arc::new(delimiters);
                }
                "folding" => {
                    if let Some(value) = node.attribute("indentationsensitive") {
                        self.indentation_based_folding = xml::attr_to_bool(value);
                    }
                }
                "emptyLines" => {
                    for line in xml::child_elements(node).filter(|n| n.has_tag_name("emptyLine")) {
                        self.folding_ignore_list
                            .push(xml::attr(line, "regexpr").to_string());
                    }
                }
                "comments" => {
                    for comment in xml::child_elements(node).filter(|n| n.has_tag_name("comment")) {
                        if xml::attr(comment, "name") == "singleLine" {
                            self.single_line_comment_marker = xml::attr(comment, "start").to_string();
                            self.single_line_comment_position =
                                if xml::attr(comment, "position") == "afterwhitespace" {
                                    CommentPosition::AfterWhitespace
                                } else {
                                    CommentPosition::StartOfLine
                                };
                        } else {
                            self.multi_line_comment_marker = (
                                xml::attr(comment, "start").to_string(),
                                xml::attr(comment, "end").to_string(),
                            );
                        }
                    }
                }
                "spellchecking" => {
                    for encoding in xml::child_elements(node).filter(|n| n.has_tag_name("encoding")) {
                        if let Some(c) = xml::first_char(encoding, "char") {
                            self.character_encodings
                                .push((c, xml::attr(encoding, "string").to_string()));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Binds every rule to the final delimiter set and resolves format names.
    pub(crate) fn resolve_local(&mut self) {
        for rule in &mut self.rules {
            rule.bind_word_delimiters(Arc::clone(&self.word_delimiters));
            if rule.attribute().is_empty() {
                continue;
            }
            let format = self.format_index.get(rule.attribute()).map(|&i| self.formats[i].id());
            if format.is_none() {
                warn!(
                    definition = %self.meta.name,
                    format = rule.attribute(),
                    "Rule: unknown format"
                );
            }
            rule.set_attribute_format(format);
        }

        for context in &mut self.contexts {
            if context.attribute().is_empty() {
                continue;
            }
            let format: Option<FormatId> = self
                .format_index
                .get(context.attribute())
                .map(|&i| self.formats[i].id());
            if format.is_none() {
                warn!(
                    definition = %self.meta.name,
                    context = context.name(),
                    format = context.attribute(),
                    "Context: unknown format"
                );
            }
            context.set_attribute_format(format);
        }
    }
}

fn build_globs(definition: &str, patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!(definition, pattern = %pattern, %err, "Invalid extension glob"),
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!(definition, %err, "Failed to build extension globs");
        GlobSet::empty()
    })
}
