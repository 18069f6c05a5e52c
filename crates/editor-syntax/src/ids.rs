use crate::format::FormatId;
use crate::handle::DefinitionRef;
use crate::keyword_list::KeywordList;
use std::collections::{BTreeMap, HashMap};

/// Repository-wide id counters.
///
/// Format ids and folding-region ids must be unique across every definition a
/// repository loads, so they are allocated from this single owner.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    last_format_id: FormatId,
    last_folding_id: u16,
    folding_ids: HashMap<(String, String), u16>,
}

impl IdAllocator {
    pub(crate) fn next_format_id(&mut self) -> FormatId {
        self.last_format_id += 1;
        self.last_format_id
    }

    /// Stable id for a (definition name, region name) pair.
    pub(crate) fn folding_region_id(&mut self, definition: &str, region: &str) -> u16 {
        let key = (definition.to_string(), region.to_string());
        if let Some(&id) = self.folding_ids.get(&key) {
            return id;
        }
        self.last_folding_id = self.last_folding_id.wrapping_add(1).max(1);
        self.folding_ids.insert(key, self.last_folding_id);
        self.last_folding_id
    }
}

/// What a context or rule may consult while it is being parsed.
pub(crate) struct LoadScope<'a> {
    pub(crate) definition: DefinitionRef,
    pub(crate) definition_name: &'a str,
    pub(crate) keyword_lists: &'a BTreeMap<String, KeywordList>,
    pub(crate) ids: &'a mut IdAllocator,
    pub(crate) has_folding_regions: bool,
}

impl LoadScope<'_> {
    pub(crate) fn folding_region_id(&mut self, region: &str) -> u16 {
        self.has_folding_regions = true;
        self.ids.folding_region_id(self.definition_name, region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ids_are_monotonic_from_one() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.next_format_id(), 1);
        assert_eq!(ids.next_format_id(), 2);
        assert_eq!(ids.next_format_id(), 3);
    }

    #[test]
    fn test_folding_ids_per_definition_and_name() {
        let mut ids = IdAllocator::default();
        let a = ids.folding_region_id("C", "Brace");
        let b = ids.folding_region_id("C", "Comment");
        let c = ids.folding_region_id("Java", "Brace");
        assert_eq!(ids.folding_region_id("C", "Brace"), a);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a > 0 && b > 0 && c > 0);
    }
}
