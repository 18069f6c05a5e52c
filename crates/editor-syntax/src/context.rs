use crate::context_switch::ContextSwitch;
use crate::format::FormatId;
use crate::handle::{ContextRef, DefinitionRef, RuleRef};
use crate::ids::LoadScope;
use crate::rule::Rule;
use crate::xml;
use roxmltree::Node;
use tracing::warn;

/// Progress of `IncludeRules` splicing for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ResolveState {
    #[default]
    Unresolved,
    Resolving,
    Resolved,
}

/// A state of the line tokenizer: an ordered rule list plus the transitions
/// taken at line end, on empty lines and when no rule matches.
#[derive(Debug)]
pub struct Context {
    name: String,
    definition: DefinitionRef,
    attribute: String,
    attribute_format: Option<FormatId>,
    attribute_context: Option<ContextRef>,
    line_end: ContextSwitch,
    line_empty: ContextSwitch,
    fallthrough_context: ContextSwitch,
    fallthrough: bool,
    dynamic: bool,
    indentation_based_folding: bool,
    rules: Vec<RuleRef>,
    resolve_state: ResolveState,
}

impl Context {
    /// Parses a `<context>` element. Accepted rules are appended to the
    /// definition's rule arena; rejected ones are logged and dropped.
    pub(crate) fn load(
        node: Node<'_, '_>,
        scope: &mut LoadScope<'_>,
        arena: &mut Vec<Rule>,
    ) -> Self {
        let name = xml::attr(node, "name").to_string();
        let fallthrough_context = ContextSwitch::parse(xml::attr(node, "fallthroughContext"));
        let fallthrough = node
            .attribute("fallthrough")
            .is_none_or(xml::attr_to_bool)
            && !fallthrough_context.is_stay();

        let mut rules = Vec::new();
        for child in xml::child_elements(node) {
            match Rule::load(child, scope) {
                Ok(rule) => {
                    rules.push(RuleRef::new(scope.definition, arena.len()));
                    arena.push(rule);
                }
                Err(err) => warn!(
                    definition = scope.definition_name,
                    context = %name,
                    %err,
                    "Skipping rule"
                ),
            }
        }

        Self {
            definition: scope.definition,
            attribute: xml::attr(node, "attribute").to_string(),
            attribute_format: None,
            attribute_context: None,
            line_end: ContextSwitch::parse(xml::attr(node, "lineEndContext")),
            line_empty: ContextSwitch::parse(xml::attr(node, "lineEmptyContext")),
            fallthrough_context,
            fallthrough,
            dynamic: xml::bool_attr(node, "dynamic"),
            indentation_based_folding: !xml::bool_attr(node, "noIndentationBasedFolding"),
            rules,
            resolve_state: ResolveState::Unresolved,
            name,
        }
    }

    /// Context name, unique within its definition.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definition the context belongs to.
    pub fn definition(&self) -> DefinitionRef {
        self.definition
    }

    /// Name of the default format.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Resolved default format, used for text no rule claims and for rules
    /// without their own attribute.
    pub fn attribute_format(&self) -> Option<FormatId> {
        self.attribute_format
    }

    /// Switch taken at the end of a line.
    pub fn line_end(&self) -> &ContextSwitch {
        &self.line_end
    }

    /// Switch taken on an empty line.
    pub fn line_empty(&self) -> &ContextSwitch {
        &self.line_empty
    }

    /// Switch taken when no rule matches, if [`Context::fallthrough`] is set.
    pub fn fallthrough_context(&self) -> &ContextSwitch {
        &self.fallthrough_context
    }

    /// Whether unmatched text triggers [`Context::fallthrough_context`].
    pub fn fallthrough(&self) -> bool {
        self.fallthrough
    }

    /// Whether rules of this context consume captures of the rule that
    /// pushed it.
    pub fn dynamic(&self) -> bool {
        self.dynamic
    }

    /// `false` when `noIndentationBasedFolding` is set.
    pub fn indentation_based_folding(&self) -> bool {
        self.indentation_based_folding
    }

    /// Effective rules in match order, including spliced ones.
    pub fn rules(&self) -> &[RuleRef] {
        &self.rules
    }

    pub(crate) fn resolve_state(&self) -> ResolveState {
        self.resolve_state
    }

    pub(crate) fn set_resolve_state(&mut self, state: ResolveState) {
        self.resolve_state = state;
    }

    pub(crate) fn set_rules(&mut self, rules: Vec<RuleRef>) {
        self.rules = rules;
    }

    /// The context whose definition owns [`Context::attribute`] after an
    /// `includeAttrib` include.
    pub(crate) fn attribute_context(&self) -> Option<ContextRef> {
        self.attribute_context
    }

    pub(crate) fn set_attribute_format(&mut self, format: Option<FormatId>) {
        self.attribute_format = format;
    }

    /// Take over the default format of an included context.
    pub(crate) fn adopt_attribute(
        &mut self,
        attribute: String,
        format: Option<FormatId>,
        from: ContextRef,
    ) {
        self.attribute = attribute;
        self.attribute_format = format;
        self.attribute_context = Some(from);
    }

    pub(crate) fn switches_mut(&mut self) -> [&mut ContextSwitch; 3] {
        [
            &mut self.line_end,
            &mut self.line_empty,
            &mut self.fallthrough_context,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdAllocator;
    use std::collections::BTreeMap;

    fn load(text: &str) -> (Context, Vec<Rule>) {
        let doc = xml::parse_document(text).expect("parse");
        let lists = BTreeMap::new();
        let mut ids = IdAllocator::default();
        let mut scope = LoadScope {
            definition: DefinitionRef::new(0, 0),
            definition_name: "Test",
            keyword_lists: &lists,
            ids: &mut ids,
            has_folding_regions: false,
        };
        let mut arena = Vec::new();
        let context = Context::load(doc.root_element(), &mut scope, &mut arena);
        (context, arena)
    }

    #[test]
    fn test_load_attributes_and_rules() {
        let (context, arena) = load(
            r##"<context name="Normal" attribute="Text" lineEndContext="#pop" lineEmptyContext="Empty" dynamic="1">
                  <DetectChar char="{" context="Block"/>
                  <Bogus/>
                  <DetectChar/>
                  <StringDetect String="//"/>
                </context>"##,
        );
        assert_eq!(context.name(), "Normal");
        assert_eq!(context.attribute(), "Text");
        assert_eq!(context.line_end().pop_count(), 1);
        assert_eq!(context.line_empty().context_name(), Some("Empty"));
        assert!(context.dynamic());
        assert!(!context.fallthrough());
        assert!(context.indentation_based_folding());
        assert_eq!(arena.len(), 2);
        assert_eq!(
            context.rules().iter().map(|r| r.index()).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(context.resolve_state(), ResolveState::Unresolved);
    }

    #[test]
    fn test_fallthrough_needs_target() {
        let (context, _) = load(r#"<context name="A" fallthrough="true"/>"#);
        assert!(!context.fallthrough());

        let (context, _) =
            load(r##"<context name="A" fallthrough="true" fallthroughContext="#pop"/>"##);
        assert!(context.fallthrough());

        let (context, _) =
            load(r##"<context name="A" fallthrough="false" fallthroughContext="#pop"/>"##);
        assert!(!context.fallthrough());

        let (context, _) = load(r##"<context name="A" fallthroughContext="#pop" noIndentationBasedFolding="1"/>"##);
        assert!(context.fallthrough());
        assert!(!context.indentation_based_folding());
    }
}
