use editor_syntax::SyntaxError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors of whole-document highlighting.
///
/// Line highlighting itself never fails: text that cannot be tokenized is
/// returned without formats.
pub enum HighlightError {
    #[error(transparent)]
    /// The definition could not be loaded.
    Syntax(#[from] SyntaxError),

    #[error("definition '{0}' has no contexts")]
    /// A loaded definition without an initial context.
    NoInitialContext(String),
}
