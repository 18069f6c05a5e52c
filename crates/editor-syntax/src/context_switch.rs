use crate::handle::ContextRef;

/// A context transition parsed from a context attribute such as `#stay`, `#pop#pop`,
/// `#pop!Comment`, `String` or `Normal##C++`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSwitch {
    pop_count: usize,
    context_name: Option<String>,
    definition_name: Option<String>,
    target: Option<ContextRef>,
}

impl ContextSwitch {
    /// Parse a context attribute. An empty value or `#stay` stays in place.
    pub fn parse(value: &str) -> Self {
        let mut out = Self::default();
        let mut rest = value.trim();
        if rest.is_empty() || rest == "#stay" {
            return out;
        }

        while let Some(after) = rest.strip_prefix("#pop") {
            out.pop_count += 1;
            if let Some(target) = after.strip_prefix('!') {
                rest = target;
                break;
            }
            rest = after;
        }

        if rest.is_empty() {
            return out;
        }

        match rest.split_once("##") {
            Some((context, definition)) => {
                if !context.is_empty() {
                    out.context_name = Some(context.to_string());
                }
                if !definition.is_empty() {
                    out.definition_name = Some(definition.to_string());
                }
            }
            None => out.context_name = Some(rest.to_string()),
        }
        out
    }

    /// Number of contexts popped before the (optional) push.
    pub fn pop_count(&self) -> usize {
        self.pop_count
    }

    /// Named target context, if any.
    pub fn context_name(&self) -> Option<&str> {
        self.context_name.as_deref()
    }

    /// Target definition for cross-definition switches.
    pub fn definition_name(&self) -> Option<&str> {
        self.definition_name.as_deref()
    }

    /// The resolved target context. `None` before resolution or when the
    /// target could not be found, in which case only the pops apply.
    pub fn target(&self) -> Option<ContextRef> {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: Option<ContextRef>) {
        self.target = target;
    }

    /// `true` if the switch neither pops nor pushes.
    pub fn is_stay(&self) -> bool {
        self.pop_count == 0
            && self.target.is_none()
            && self.context_name.is_none()
            && self.definition_name.is_none()
    }
}
