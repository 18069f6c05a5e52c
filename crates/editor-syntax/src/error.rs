use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced while loading syntax definitions and their rules.
///
/// Most of these are not fatal for a whole grammar: a failing rule or an
/// unresolved reference is logged and skipped by the loader. Only errors
/// returned from [`crate::Repository::load`] and friends leave a definition
/// unloaded.
pub enum SyntaxError {
    #[error("I/O error: {0}")]
    /// Reading a grammar or index file failed.
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    /// The grammar document is not well-formed XML.
    Xml(#[from] roxmltree::Error),

    #[error("index parse error: {0}")]
    /// The JSON metadata index could not be parsed.
    Index(#[from] serde_json::Error),

    #[error("missing <language> element")]
    /// The document has no `<language>` root element.
    MissingLanguage,

    #[error("invalid kateversion attribute '{0}'")]
    /// The `kateversion` attribute is missing or not `major.minor`.
    InvalidVersion(String),

    #[error("kateversion {version} is newer than the supported {supported}")]
    /// The grammar requires a newer engine than this one.
    UnsupportedVersion {
        /// Declared version.
        version: String,
        /// Highest supported version.
        supported: String,
    },

    #[error("unknown rule type '{0}'")]
    /// A rule element name is not part of the rule family.
    UnknownRule(String),

    #[error("rule '{rule}' is missing required attribute '{attribute}'")]
    /// A rule lacks an attribute it cannot work without.
    MissingAttribute {
        /// Rule element name.
        rule: &'static str,
        /// Attribute name.
        attribute: &'static str,
    },

    #[error("look-ahead rule '{0}' must switch context")]
    /// A look-ahead rule that stays in the current context would loop forever.
    LookAheadWithoutSwitch(&'static str),

    #[error("unknown keyword list '{0}'")]
    /// A keyword rule references a list that does not exist.
    UnknownKeywordList(String),

    #[error("keyword list '{0}' is empty")]
    /// A keyword rule references an empty list.
    EmptyKeywordList(String),

    #[error("regex compile error for pattern '{pattern}': {message}")]
    /// A `RegExpr` pattern failed to compile.
    RegexCompile {
        /// The pattern after preprocessing.
        pattern: String,
        /// The compiler error message.
        message: String,
    },

    #[error("unknown definition '{0}'")]
    /// No definition with this name is registered.
    UnknownDefinition(String),

    #[error("definition handle is no longer valid")]
    /// The handle refers to a definition the repository has evicted.
    ExpiredDefinition,
}
