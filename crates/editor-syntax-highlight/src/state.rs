use editor_syntax::ContextRef;

/// An active context together with the captures it was entered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    context: ContextRef,
    captures: Vec<String>,
}

impl Frame {
    /// The context.
    pub fn context(&self) -> ContextRef {
        self.context
    }

    /// Texts captured by the rule that pushed a dynamic context. Empty for
    /// other contexts.
    pub fn captures(&self) -> &[String] {
        &self.captures
    }
}

/// Tokenizer state carried from the end of one line to the start of the next.
///
/// The initial context of the definition is always active and not stored, so
/// the default state is "at the start of the document".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct State {
    frames: Vec<Frame>,
}

impl State {
    /// The state at the start of a document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of contexts pushed above the initial one.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// `true` when only the initial context is active.
    pub fn is_initial(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pushed contexts, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The innermost pushed context.
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(crate) fn push(&mut self, context: ContextRef, captures: Vec<String>) {
        self.frames.push(Frame { context, captures });
    }

    /// Pops up to `count` frames. Returns `false` if that would have popped
    /// the initial context too.
    pub(crate) fn pop(&mut self, count: usize) -> bool {
        let survived = count <= self.frames.len();
        self.frames
            .truncate(self.frames.len().saturating_sub(count));
        survived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use editor_syntax::Repository;

    fn contexts() -> (ContextRef, ContextRef) {
        let mut repo = Repository::new();
        let handle = repo
            .add_definition_from_str(
                r##"<language name="S" kateversion="5.0">
                  <highlighting><contexts>
                    <context name="A" lineEndContext="#stay"/>
                    <context name="B" lineEndContext="#stay"/>
                  </contexts></highlighting>
                </language>"##,
            )
            .expect("register");
        repo.load(handle).expect("load");
        let definition = repo.definition(handle).expect("definition");
        (
            definition.context_by_name("A").expect("A"),
            definition.context_by_name("B").expect("B"),
        )
    }

    #[test]
    fn test_push_pop_depth() {
        let (a, b) = contexts();
        let mut state = State::new();
        assert!(state.is_initial());

        state.push(a, Vec::new());
        state.push(b, vec!["x".to_string()]);
        assert_eq!(state.depth(), 2);
        assert_eq!(state.top().map(Frame::context), Some(b));
        assert_eq!(state.top().map(|f| f.captures().len()), Some(1));

        assert!(state.pop(1));
        assert_eq!(state.depth(), 1);
        assert!(state.pop(1));
        assert!(state.is_initial());

        // Popping past the initial context empties the stack and reports it.
        state.push(a, Vec::new());
        assert!(!state.pop(3));
        assert!(state.is_initial());
    }

    #[test]
    fn test_equality_includes_captures() {
        let (a, _) = contexts();
        let mut left = State::new();
        let mut right = State::new();
        left.push(a, vec!["'".to_string()]);
        right.push(a, vec!["\"".to_string()]);
        assert_ne!(left, right);

        right.pop(1);
        right.push(a, vec!["'".to_string()]);
        assert_eq!(left, right);
    }
}
