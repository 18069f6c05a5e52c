//! Cross-definition resolution run after a definition's body is parsed.
//!
//! Resolving may load further definitions. The definition being resolved is
//! already marked fully loaded at that point, so a cycle of switches or
//! includes between definitions ends in an early return from `load`.

use super::Repository;
use crate::context::ResolveState;
use crate::context_switch::ContextSwitch;
use crate::handle::{ContextRef, DefinitionRef};
use crate::rule::{IncludeRules, RuleKind};
use tracing::warn;

fn needs_target(switch: &ContextSwitch) -> bool {
    switch.context_name().is_some() || switch.definition_name().is_some()
}

impl Repository {
    pub(super) fn resolve(&mut self, handle: DefinitionRef) {
        let Some(definition) = self.definition_mut(handle) else {
            return;
        };
        definition.resolve_local();
        let context_count = definition.contexts().len();

        self.resolve_context_switches(handle);
        for index in 0..context_count {
            self.resolve_includes(ContextRef::new(handle, index));
        }
    }

    fn resolve_context_switches(&mut self, handle: DefinitionRef) {
        let Some(definition) = self.definition(handle) else {
            return;
        };

        let mut context_switches = Vec::new();
        for (index, context) in definition.contexts().iter().enumerate() {
            let switches = [
                context.line_end(),
                context.line_empty(),
                context.fallthrough_context(),
            ];
            for (which, switch) in switches.into_iter().enumerate() {
                if needs_target(switch) {
                    context_switches.push((index, which, switch.clone()));
                }
            }
        }
        let rule_switches: Vec<(usize, ContextSwitch)> = definition
            .rules()
            .iter()
            .enumerate()
            .filter(|(_, rule)| needs_target(rule.context()))
            .map(|(index, rule)| (index, rule.context().clone()))
            .collect();

        for (index, which, switch) in context_switches {
            let target = self.resolve_switch(handle, &switch);
            if let Some(slot) = self
                .definition_mut(handle)
                .and_then(|d| d.context_at_mut(index))
                .and_then(|c| c.switches_mut().into_iter().nth(which))
            {
                slot.set_target(target);
            }
        }

        for (index, switch) in rule_switches {
            let target = self.resolve_switch(handle, &switch);
            if let Some(rule) = self
                .definition_mut(handle)
                .and_then(|d| d.rule_at_mut(index))
            {
                rule.context_mut().set_target(target);
            }
        }
    }

    /// Target of a switch declared in `owner`. Unknown targets are logged and
    /// leave only the pops in effect.
    fn resolve_switch(&mut self, owner: DefinitionRef, switch: &ContextSwitch) -> Option<ContextRef> {
        let owner_name = self.definition(owner)?.name().to_string();

        let Some(definition_name) = switch.definition_name() else {
            let name = switch.context_name()?;
            let target = self.definition(owner)?.context_by_name(name);
            if target.is_none() {
                warn!(definition = %owner_name, context = name, "Cannot find context");
            }
            return target;
        };

        let Some(other) = self.definition_for_name(definition_name) else {
            warn!(
                definition = %owner_name,
                target = definition_name,
                "Context switch to unknown definition"
            );
            return None;
        };
        // Failures are logged by load itself.
        let _ = self.load(other);
        let other_definition = self.definition(other)?;
        match switch.context_name() {
            Some(name) => {
                let target = other_definition.context_by_name(name);
                if target.is_none() {
                    warn!(
                        definition = %owner_name,
                        target = definition_name,
                        context = name,
                        "Cannot find context"
                    );
                }
                target
            }
            None => other_definition.initial_context(),
        }
    }

    /// Splices the rules of included contexts into `context_ref`, depth first.
    fn resolve_includes(&mut self, context_ref: ContextRef) {
        let Some(context) = self.context(context_ref) else {
            return;
        };
        match context.resolve_state() {
            ResolveState::Resolved => return,
            ResolveState::Resolving => {
                warn!(context = context.name(), "Recursive IncludeRules");
                return;
            }
            ResolveState::Unresolved => {}
        }
        let rules = context.rules().to_vec();
        let context_name = context.name().to_string();
        if let Some(context) = self.context_mut(context_ref) {
            context.set_resolve_state(ResolveState::Resolving);
        }

        let mut resolved = Vec::with_capacity(rules.len());
        for rule_ref in rules {
            let include = match self.rule(rule_ref).map(|(_, rule)| rule.kind()) {
                Some(RuleKind::IncludeRules(include)) => include.clone(),
                _ => {
                    resolved.push(rule_ref);
                    continue;
                }
            };

            let Some(target) = self.find_include_target(rule_ref.definition(), &include) else {
                warn!(
                    context = %context_name,
                    include = include.context_name().unwrap_or_default(),
                    definition = include.definition_name().unwrap_or_default(),
                    "Unable to resolve IncludeRules"
                );
                resolved.push(rule_ref);
                continue;
            };
            if target == context_ref {
                warn!(context = %context_name, "Context includes itself");
                continue;
            }

            self.resolve_includes(target);
            let Some(included) = self.context(target) else {
                continue;
            };
            let spliced = included.rules().to_vec();
            let adopted = include.include_attribute().then(|| {
                (
                    included.attribute().to_string(),
                    included.attribute_format(),
                    included.attribute_context().unwrap_or(target),
                )
            });
            if let Some((attribute, format, from)) = adopted
                && let Some(context) = self.context_mut(context_ref)
            {
                context.adopt_attribute(attribute, format, from);
            }
            resolved.extend(spliced);
        }

        if let Some(context) = self.context_mut(context_ref) {
            context.set_rules(resolved);
            context.set_resolve_state(ResolveState::Resolved);
        }
    }

    fn find_include_target(
        &mut self,
        owner: DefinitionRef,
        include: &IncludeRules,
    ) -> Option<ContextRef> {
        let Some(definition_name) = include.definition_name() else {
            return self.definition(owner)?.context_by_name(include.context_name()?);
        };
        let other = self.definition_for_name(definition_name)?;
        let _ = self.load(other);
        let definition = self.definition(other)?;
        match include.context_name() {
            Some(name) => definition.context_by_name(name),
            None => definition.initial_context(),
        }
    }
}
