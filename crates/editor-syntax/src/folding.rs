/// Whether a folding marker opens or closes a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoldingKind {
    /// Opens a region.
    Begin,
    /// Closes the region with the same id.
    End,
}

/// A folding marker attached to a rule (`beginRegion` / `endRegion`).
///
/// Ids are allocated by the [`crate::Repository`] per (definition, region name)
/// pair, so a begin and its matching end share the same id even when they come
/// from different rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FoldingRegion {
    kind: FoldingKind,
    id: u16,
}

impl FoldingRegion {
    /// Create a region marker.
    pub const fn new(kind: FoldingKind, id: u16) -> Self {
        Self { kind, id }
    }

    /// Begin or end.
    pub fn kind(&self) -> FoldingKind {
        self.kind
    }

    /// The unsigned region id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Positive for a begin marker, negative for an end marker.
    pub fn signed_id(&self) -> i32 {
        match self.kind {
            FoldingKind::Begin => i32::from(self.id),
            FoldingKind::End => -i32::from(self.id),
        }
    }
}
