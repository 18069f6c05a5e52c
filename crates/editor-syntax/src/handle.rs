/// A weak, copyable handle to a definition owned by a [`crate::Repository`].
///
/// The handle survives `clear` + reload of the definition. Once the repository
/// evicts the definition the generation no longer matches and every lookup
/// through the handle returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionRef {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl DefinitionRef {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    pub(crate) fn slot(&self) -> usize {
        self.index as usize
    }
}

/// Identifies a context inside a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextRef {
    definition: DefinitionRef,
    index: usize,
}

impl ContextRef {
    pub(crate) fn new(definition: DefinitionRef, index: usize) -> Self {
        Self { definition, index }
    }

    /// The definition owning the context.
    pub fn definition(&self) -> DefinitionRef {
        self.definition
    }

    /// Position of the context in its definition.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Identifies a rule inside the rule arena of its definition.
///
/// Contexts reference rules through this handle, so rules spliced in by
/// `IncludeRules` stay shared with the context (and definition) they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleRef {
    definition: DefinitionRef,
    index: usize,
}

impl RuleRef {
    pub(crate) fn new(definition: DefinitionRef, index: usize) -> Self {
        Self { definition, index }
    }

    /// The definition owning the rule.
    pub fn definition(&self) -> DefinitionRef {
        self.definition
    }

    /// Position of the rule in its definition's arena.
    pub fn index(&self) -> usize {
        self.index
    }
}
