//! Small helpers over `roxmltree` nodes used by the grammar loaders.

use crate::error::SyntaxError;
use roxmltree::{Document, Node, ParsingOptions};

/// Parses a grammar document. Kate grammars routinely declare entities in an
/// internal DTD, so DTD processing is enabled.
pub(crate) fn parse_document(text: &str) -> Result<Document<'_>, SyntaxError> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    Ok(Document::parse_with_options(text, options)?)
}

/// Kate's boolean attribute convention: `1` or `true` (any case).
pub(crate) fn attr_to_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

pub(crate) fn attr<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or_default()
}

pub(crate) fn bool_attr(node: Node<'_, '_>, name: &str) -> bool {
    node.attribute(name).is_some_and(attr_to_bool)
}

pub(crate) fn first_char(node: Node<'_, '_>, name: &str) -> Option<char> {
    node.attribute(name).and_then(|s| s.chars().next())
}

pub(crate) fn child_elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn element_text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for child in node.descendants().filter(|n| n.is_text()) {
        if let Some(t) = child.text() {
            out.push_str(t);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_to_bool() {
        assert!(attr_to_bool("1"));
        assert!(attr_to_bool("true"));
        assert!(attr_to_bool("TRUE"));
        assert!(!attr_to_bool("0"));
        assert!(!attr_to_bool("false"));
        assert!(!attr_to_bool(""));
    }

    #[test]
    fn test_document_with_internal_dtd() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE language SYSTEM "language.dtd" [
  <!ENTITY ident "[a-zA-Z_][a-zA-Z0-9_]*">
]>
<language name="X"><item>&ident;</item></language>"#;
        let doc = parse_document(text).expect("parse");
        let root = doc.root_element();
        assert_eq!(attr(root, "name"), "X");
        let item = child_elements(root).next().expect("item");
        assert_eq!(element_text(item), "[a-zA-Z_][a-zA-Z0-9_]*");
    }
}
