//! The `index.katesyntax` metadata index of a search path.

use crate::definition::{Metadata, split_list};
use crate::error::SyntaxError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the per-directory metadata index.
pub const INDEX_FILE_NAME: &str = "index.katesyntax";

/// Metadata of one grammar file, keyed by file name in the index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct IndexEntry {
    name: String,
    section: String,
    version: f32,
    priority: i32,
    style: String,
    author: String,
    license: String,
    indenter: String,
    hidden: bool,
    extensions: String,
    mimetype: String,
}

impl IndexEntry {
    pub(crate) fn is_unnamed(&self) -> bool {
        self.name.trim().is_empty()
    }

    pub(crate) fn into_metadata(self) -> Metadata {
        Metadata {
            name: self.name,
            section: self.section,
            version: self.version,
            priority: self.priority,
            hidden: self.hidden,
            style: self.style,
            indenter: self.indenter,
            author: self.author,
            license: self.license,
            extensions: split_list(&self.extensions),
            mime_types: split_list(&self.mimetype),
        }
    }
}

pub(crate) fn read_index(path: &Path) -> Result<BTreeMap<String, IndexEntry>, SyntaxError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
