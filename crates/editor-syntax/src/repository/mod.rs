mod index;
mod resolve;

pub use index::INDEX_FILE_NAME;

use crate::context::Context;
use crate::definition::{Definition, DefinitionSource, LoadState, Metadata};
use crate::error::SyntaxError;
use crate::format::{Format, FormatId};
use crate::handle::{ContextRef, DefinitionRef, RuleRef};
use crate::ids::IdAllocator;
use crate::keyword_list::KeywordList;
use crate::rule::Rule;
use crate::xml;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    definition: Option<Definition>,
    stale: bool,
}

#[derive(Debug, Default)]
/// Registry owning every known definition.
///
/// Definitions are stored in an arena of slots and handed out as
/// [`DefinitionRef`] handles. Format ids and folding-region ids are allocated
/// here, so they are unique across all definitions of one repository.
pub struct Repository {
    slots: Vec<Slot>,
    free: Vec<usize>,
    ids: IdAllocator,
    search_paths: Vec<PathBuf>,
    extra_sources: Vec<DefinitionSource>,
}

impl Repository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of grammars and registers its definitions.
    ///
    /// The directory's `index.katesyntax` is used when present, otherwise
    /// every `*.xml` file is opened for its `<language>` metadata.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let found = scan_search_path(&path);
        self.search_paths.push(path);
        for definition in found {
            self.register(definition);
        }
    }

    /// Directories scanned by [`Repository::reload`].
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Registers a single grammar file.
    pub fn add_definition_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<DefinitionRef, SyntaxError> {
        let source = DefinitionSource::File(path.as_ref().to_path_buf());
        let definition = read_metadata(source.clone())?;
        self.extra_sources.push(source);
        Ok(self.register(definition))
    }

    /// Registers a grammar held in memory.
    pub fn add_definition_from_str(&mut self, text: &str) -> Result<DefinitionRef, SyntaxError> {
        let source = DefinitionSource::Inline(Arc::from(text));
        let definition = read_metadata(source.clone())?;
        self.extra_sources.push(source);
        Ok(self.register(definition))
    }

    /// Returns the handle registered under the definition's name, which is
    /// the new one unless an existing definition has a higher or equal priority.
    fn register(&mut self, mut definition: Definition) -> DefinitionRef {
        if let Some(index) = self.slot_by_name(definition.name()) {
            let slot = &mut self.slots[index];
            let replace = slot.stale
                || slot
                    .definition
                    .as_ref()
                    .is_none_or(|d| definition.priority() > d.priority());
            if !replace {
                debug!(
                    definition = definition.name(),
                    "Ignoring lower priority duplicate definition"
                );
                return DefinitionRef::new(index, slot.generation);
            }
            // A real replacement invalidates references into the old body.
            if !slot.stale {
                slot.generation = slot.generation.wrapping_add(1);
            }
            let handle = DefinitionRef::new(index, slot.generation);
            definition.set_handle(handle);
            slot.definition = Some(definition);
            slot.stale = false;
            return handle;
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        let handle = DefinitionRef::new(index, slot.generation);
        definition.set_handle(handle);
        slot.definition = Some(definition);
        slot.stale = false;
        handle
    }

    fn slot_by_name(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.definition
                .as_ref()
                .is_some_and(|d| d.name() == name)
        })
    }

    fn live(&self) -> impl Iterator<Item = &Definition> {
        self.slots.iter().filter_map(|s| s.definition.as_ref())
    }

    /// The definition behind `handle`, unless it was evicted.
    pub fn definition(&self, handle: DefinitionRef) -> Option<&Definition> {
        self.slots
            .get(handle.slot())
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.definition.as_ref())
    }

    /// Mutable access to the definition behind `handle`.
    pub fn definition_mut(&mut self, handle: DefinitionRef) -> Option<&mut Definition> {
        self.slots
            .get_mut(handle.slot())
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.definition.as_mut())
    }

    /// Definition registered under `name`.
    pub fn definition_for_name(&self, name: &str) -> Option<DefinitionRef> {
        self.live().find(|d| d.name() == name).map(Definition::handle)
    }

    /// Best definition for a file, by extension globs and priority.
    pub fn definition_for_file_name(&self, path: impl AsRef<Path>) -> Option<DefinitionRef> {
        self.definitions_for_file_name(path).into_iter().next()
    }

    /// All definitions whose extension globs match the file name, highest
    /// priority first.
    pub fn definitions_for_file_name(&self, path: impl AsRef<Path>) -> Vec<DefinitionRef> {
        let Some(file_name) = path.as_ref().file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let mut matches: Vec<&Definition> = self
            .live()
            .filter(|d| d.matches_file_name(file_name))
            .collect();
        matches.sort_by(|a, b| b.priority().cmp(&a.priority()));
        matches.into_iter().map(Definition::handle).collect()
    }

    /// Best definition for a mime type.
    pub fn definition_for_mime_type(&self, mime_type: &str) -> Option<DefinitionRef> {
        self.live()
            .filter(|d| d.mime_types().iter().any(|m| m == mime_type))
            .max_by_key(|d| d.priority())
            .map(Definition::handle)
    }

    /// Every registered definition, sorted by section then name.
    pub fn definitions(&self) -> Vec<DefinitionRef> {
        let mut all: Vec<&Definition> = self.live().collect();
        all.sort_by_cached_key(|d| (d.section().to_lowercase(), d.name().to_lowercase()));
        all.into_iter().map(Definition::handle).collect()
    }

    /// The context behind `handle`.
    pub fn context(&self, handle: ContextRef) -> Option<&Context> {
        self.definition(handle.definition())?
            .context_at(handle.index())
    }

    pub(crate) fn context_mut(&mut self, handle: ContextRef) -> Option<&mut Context> {
        self.definition_mut(handle.definition())?
            .context_at_mut(handle.index())
    }

    /// The rule behind `handle`, together with the definition owning it.
    pub fn rule(&self, handle: RuleRef) -> Option<(&Definition, &Rule)> {
        let definition = self.definition(handle.definition())?;
        let rule = definition.rules().get(handle.index())?;
        Some((definition, rule))
    }

    /// Format with the given repository-wide id.
    pub fn format(&self, id: FormatId) -> Option<&Format> {
        self.live().find_map(|d| {
            d.formats()
                .binary_search_by_key(&id, Format::id)
                .ok()
                .map(|i| &d.formats()[i])
        })
    }

    /// Fully load a definition and every definition it refers to.
    ///
    /// Loading is idempotent. A failure is logged and leaves the definition
    /// without a body.
    pub fn load(&mut self, handle: DefinitionRef) -> Result<(), SyntaxError> {
        self.load_with(handle, false)
    }

    /// Look a definition up by name and fully load it.
    pub fn load_by_name(&mut self, name: &str) -> Result<DefinitionRef, SyntaxError> {
        let handle = self
            .definition_for_name(name)
            .ok_or_else(|| SyntaxError::UnknownDefinition(name.to_string()))?;
        self.load(handle)?;
        Ok(handle)
    }

    /// Load only the keyword lists of a definition.
    pub fn load_keywords(&mut self, handle: DefinitionRef) -> Result<(), SyntaxError> {
        self.load_with(handle, true)
    }

    fn load_with(&mut self, handle: DefinitionRef, keywords_only: bool) -> Result<(), SyntaxError> {
        let definition = self
            .definition(handle)
            .ok_or(SyntaxError::ExpiredDefinition)?;
        let wanted = if keywords_only {
            LoadState::KeywordsOnly
        } else {
            LoadState::FullyLoaded
        };
        if definition.load_state() >= wanted {
            return Ok(());
        }
        let name = definition.name().to_string();

        if let Err(err) = self.parse_into(handle, keywords_only) {
            warn!(definition = %name, %err, "Failed to load syntax definition");
            return Err(err);
        }
        debug!(definition = %name, keywords_only, "Loaded syntax definition");

        if !keywords_only {
            self.resolve(handle);
        }
        Ok(())
    }

    fn parse_into(&mut self, handle: DefinitionRef, keywords_only: bool) -> Result<(), SyntaxError> {
        let source = self
            .definition(handle)
            .ok_or(SyntaxError::ExpiredDefinition)?
            .source()
            .clone();
        let text = source.read()?;
        let doc = xml::parse_document(&text)?;
        let language = doc.root_element();
        // Nothing is touched before the version gate passed.
        Metadata::load(language)?;

        let Self { slots, ids, .. } = self;
        let definition = slots
            .get_mut(handle.slot())
            .and_then(|s| s.definition.as_mut())
            .ok_or(SyntaxError::ExpiredDefinition)?;
        definition.parse_body(language, ids, keywords_only);
        Ok(())
    }

    /// Definitions reachable from `handle` through context switches and
    /// included rules, in breadth-first order, without `handle` itself.
    pub fn included_definitions(&mut self, handle: DefinitionRef) -> Vec<DefinitionRef> {
        if self.load(handle).is_err() {
            return Vec::new();
        }

        let mut seen = vec![handle];
        let mut queue = std::collections::VecDeque::from([handle]);
        while let Some(current) = queue.pop_front() {
            let Some(definition) = self.definition(current) else {
                continue;
            };

            let mut found = Vec::new();
            for context in definition.contexts() {
                for switch in [
                    context.line_end(),
                    context.line_empty(),
                    context.fallthrough_context(),
                ] {
                    found.extend(switch.target().map(|t| t.definition()));
                }
                for &rule_ref in context.rules() {
                    found.push(rule_ref.definition());
                    if let Some((_, rule)) = self.rule(rule_ref) {
                        found.extend(rule.context().target().map(|t| t.definition()));
                    }
                }
            }

            for other in found {
                if !seen.contains(&other) {
                    seen.push(other);
                    queue.push_back(other);
                }
            }
        }

        seen.remove(0);
        seen
    }

    /// Whether folding markers can occur in text highlighted with `handle`:
    /// it or an included definition has folding regions or indentation
    /// based folding.
    pub fn folding_enabled(&mut self, handle: DefinitionRef) -> bool {
        if self.load(handle).is_err() {
            return false;
        }
        let folds = |d: &Definition| d.has_folding_regions() || d.indentation_based_folding_enabled();
        if self.definition(handle).is_some_and(folds) {
            return true;
        }
        self.included_definitions(handle)
            .into_iter()
            .any(|d| self.definition(d).is_some_and(folds))
    }

    /// Names of the keyword lists of a definition.
    pub fn keyword_list_names(&mut self, handle: DefinitionRef) -> Vec<String> {
        if self.load_keywords(handle).is_err() {
            return Vec::new();
        }
        self.definition(handle)
            .map(|d| d.keyword_lists().keys().cloned().collect())
            .unwrap_or_default()
    }

    /// A keyword list of a definition, loading keyword lists on demand.
    pub fn keyword_list(&mut self, handle: DefinitionRef, name: &str) -> Option<&KeywordList> {
        self.load_keywords(handle).ok()?;
        self.definition(handle)?.keyword_list(name)
    }

    /// Replace the keywords of a list. Returns `false` if the definition or
    /// the list does not exist.
    pub fn set_keyword_list(
        &mut self,
        handle: DefinitionRef,
        name: &str,
        keywords: Vec<String>,
    ) -> bool {
        if self.load_keywords(handle).is_err() {
            return false;
        }
        self.definition_mut(handle)
            .is_some_and(|d| d.set_keyword_list(name, keywords))
    }

    /// Drop the parsed body of a definition. The handle stays valid and the
    /// next [`Repository::load`] parses the grammar again.
    ///
    /// Loaded definitions that refer into it are cleared as well, so loading
    /// them resolves against the new body.
    pub fn clear_definition(&mut self, handle: DefinitionRef) -> bool {
        match self.definition_mut(handle) {
            Some(definition) => {
                definition.clear();
                self.clear_dependents(handle);
                true
            }
            None => false,
        }
    }

    /// Clears every loaded definition that refers into `handle`, directly or
    /// through another cleared definition.
    fn clear_dependents(&mut self, handle: DefinitionRef) {
        let mut pending = vec![handle];
        while let Some(current) = pending.pop() {
            for slot in &mut self.slots {
                let Some(definition) = slot.definition.as_mut() else {
                    continue;
                };
                if definition.is_loaded() && definition.references(current) {
                    debug!(
                        definition = definition.name(),
                        "Clearing definition that refers to a cleared one"
                    );
                    definition.clear();
                    pending.push(definition.handle());
                }
            }
        }
    }

    /// Evict a definition. Every outstanding handle to it expires and
    /// definitions that refer into it are cleared.
    pub fn remove(&mut self, handle: DefinitionRef) -> Option<Definition> {
        self.definition(handle)?;
        let slot = &mut self.slots[handle.slot()];
        let definition = slot.definition.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.stale = false;
        self.free.push(handle.slot());
        self.extra_sources.retain(|s| s != definition.source());
        self.clear_dependents(handle);
        Some(definition)
    }

    /// Re-scan every source.
    ///
    /// Definitions that still exist keep their slot, so handles stay valid;
    /// all of them are back to unloaded. Vanished definitions are evicted.
    /// Id counters restart from 1.
    pub fn reload(&mut self) {
        debug!("Reloading syntax definitions");
        for slot in &mut self.slots {
            if let Some(definition) = slot.definition.as_mut() {
                definition.clear();
                slot.stale = true;
            }
        }
        self.ids = IdAllocator::default();

        let mut found = Vec::new();
        for path in &self.search_paths {
            found.extend(scan_search_path(path));
        }
        for source in &self.extra_sources {
            match read_metadata(source.clone()) {
                Ok(definition) => found.push(definition),
                Err(err) => warn!(?source, %err, "Skipping syntax definition"),
            }
        }

        for definition in pick_highest_priority(found) {
            self.register(definition);
        }

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.stale {
                slot.definition = None;
                slot.generation = slot.generation.wrapping_add(1);
                slot.stale = false;
                self.free.push(index);
            }
        }
    }
}

/// Keeps the first of the highest-priority definitions per name.
fn pick_highest_priority(found: Vec<Definition>) -> Vec<Definition> {
    let mut winners: Vec<Definition> = Vec::with_capacity(found.len());
    for definition in found {
        match winners.iter_mut().find(|w| w.name() == definition.name()) {
            Some(winner) if definition.priority() > winner.priority() => *winner = definition,
            Some(_) => {}
            None => winners.push(definition),
        }
    }
    winners
}

fn read_metadata(source: DefinitionSource) -> Result<Definition, SyntaxError> {
    let text = source.read()?;
    let doc = xml::parse_document(&text)?;
    let meta = Metadata::load(doc.root_element())?;
    if meta.name.is_empty() {
        return Err(SyntaxError::MissingLanguage);
    }
    Ok(Definition::new(meta, source))
}

fn scan_search_path(dir: &Path) -> Vec<Definition> {
    let index_path = dir.join(INDEX_FILE_NAME);
    if index_path.is_file() {
        match index::read_index(&index_path) {
            Ok(entries) => {
                return entries
                    .into_iter()
                    .filter(|(_, entry)| !entry.is_unnamed())
                    .map(|(file, entry)| {
                        Definition::new(entry.into_metadata(), DefinitionSource::File(dir.join(file)))
                    })
                    .collect();
            }
            Err(err) => warn!(path = %index_path.display(), %err, "Ignoring syntax index"),
        }
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), %err, "Cannot read syntax search path");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "xml") && p.is_file())
        .collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| match read_metadata(DefinitionSource::File(path.clone())) {
            Ok(definition) => Some(definition),
            Err(err) => {
                warn!(path = %path.display(), %err, "Skipping syntax definition");
                None
            }
        })
        .collect()
}
