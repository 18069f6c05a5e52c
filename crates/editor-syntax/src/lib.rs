#![warn(missing_docs)]
//! `editor-syntax` - Kate-style XML syntax definitions.
//!
//! A [`Repository`] discovers grammar files, loads them lazily and resolves
//! references between them. A loaded [`Definition`] is a set of [`Context`]s,
//! each an ordered list of [`Rule`]s that match at a byte offset of a line.
//! Turning that into highlighted lines is the job of `editor-syntax-highlight`.

mod context;
mod context_switch;
mod definition;
mod delimiters;
mod error;
mod folding;
mod format;
mod handle;
mod ids;
mod keyword_list;
mod repository;
mod rule;
mod xml;

pub use context::Context;
pub use context_switch::ContextSwitch;
pub use definition::{
    CommentPosition, Definition, DefinitionSource, LoadState, SUPPORTED_KATE_VERSION_MAJOR,
    SUPPORTED_KATE_VERSION_MINOR, check_kate_version,
};
pub use delimiters::{DEFAULT_WORD_DELIMITERS, WordDelimiters};
pub use error::SyntaxError;
pub use folding::{FoldingKind, FoldingRegion};
pub use format::{Format, FormatId, FormatStyle, TextStyle};
pub use handle::{ContextRef, DefinitionRef, RuleRef};
pub use keyword_list::{CaseSensitivity, KeywordList};
pub use repository::{INDEX_FILE_NAME, Repository};
pub use rule::{IncludeRules, MatchResult, RegExpr, Rule, RuleKind};
