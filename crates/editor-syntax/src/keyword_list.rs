use crate::xml;
use roxmltree::Node;
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Case sensitivity of keyword and literal comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseSensitivity {
    /// Exact comparison.
    #[default]
    Sensitive,
    /// Comparison after lowercasing both sides.
    Insensitive,
}

impl CaseSensitivity {
    pub(crate) fn from_insensitive_flag(insensitive: bool) -> Self {
        if insensitive {
            Self::Insensitive
        } else {
            Self::Sensitive
        }
    }
}

/// A named list of keywords (`<list>`), optionally including other lists.
#[derive(Debug, Clone, Default)]
pub struct KeywordList {
    name: String,
    keywords: Vec<String>,
    includes: Vec<String>,
    case_sensitivity: CaseSensitivity,
    sensitive_lookup: OnceCell<HashSet<String>>,
    insensitive_lookup: OnceCell<HashSet<String>>,
    resolved: bool,
}

impl KeywordList {
    /// Create a list from keywords.
    pub fn new(name: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            name: name.into(),
            keywords,
            ..Self::default()
        }
    }

    pub(crate) fn load(node: Node<'_, '_>) -> Self {
        let mut list = Self {
            name: xml::attr(node, "name").to_string(),
            ..Self::default()
        };
        for child in xml::child_elements(node) {
            let text = xml::element_text(child);
            if text.is_empty() {
                continue;
            }
            match child.tag_name().name() {
                "item" => list.keywords.push(text),
                "include" => list.includes.push(text),
                _ => {}
            }
        }
        list
    }

    /// The list name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keywords in declaration order (after include resolution: own keywords first).
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Names of the lists included by this one.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Returns `true` if the list has no keywords.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Default sensitivity used by [`KeywordList::contains`].
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    pub(crate) fn set_case_sensitivity(&mut self, case_sensitivity: CaseSensitivity) {
        self.case_sensitivity = case_sensitivity;
    }

    /// Replace the keywords. Lookup sets are rebuilt lazily on the next query.
    pub fn set_keywords(&mut self, keywords: Vec<String>) {
        self.keywords = keywords;
        self.sensitive_lookup = OnceCell::new();
        self.insensitive_lookup = OnceCell::new();
    }

    /// Membership test with the list's default sensitivity.
    pub fn contains(&self, word: &str) -> bool {
        self.contains_with(word, self.case_sensitivity)
    }

    /// Membership test with an explicit sensitivity. Each lookup set is built
    /// the first time its sensitivity is queried.
    pub fn contains_with(&self, word: &str, case_sensitivity: CaseSensitivity) -> bool {
        match case_sensitivity {
            CaseSensitivity::Sensitive => self
                .sensitive_lookup
                .get_or_init(|| self.keywords.iter().cloned().collect())
                .contains(word),
            CaseSensitivity::Insensitive => self
                .insensitive_lookup
                .get_or_init(|| self.keywords.iter().map(|k| k.to_lowercase()).collect())
                .contains(&word.to_lowercase()),
        }
    }

    #[cfg(test)]
    fn lookup_built(&self, case_sensitivity: CaseSensitivity) -> bool {
        match case_sensitivity {
            CaseSensitivity::Sensitive => self.sensitive_lookup.get().is_some(),
            CaseSensitivity::Insensitive => self.insensitive_lookup.get().is_some(),
        }
    }

    /// Append the keywords of every included sibling list.
    ///
    /// Included lists are resolved first. The per-list resolved flag makes
    /// repeated passes cheap and include cycles terminate.
    pub fn resolve_include_keywords(lists: &mut BTreeMap<String, KeywordList>, name: &str) {
        let includes = match lists.get_mut(name) {
            Some(list) if !list.resolved => {
                list.resolved = true;
                list.includes.clone()
            }
            _ => return,
        };

        for include in includes {
            Self::resolve_include_keywords(lists, &include);
            let Some(included) = lists.get(&include) else {
                warn!(list = name, include = %include, "Unresolved keyword list include");
                continue;
            };
            let words = included.keywords.clone();
            if let Some(list) = lists.get_mut(name) {
                let mut merged = list.keywords.clone();
                for word in words {
                    if !merged.contains(&word) {
                        merged.push(word);
                    }
                }
                list.set_keywords(merged);
            }
        }
    }
}
