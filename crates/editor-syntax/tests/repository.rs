use editor_syntax::{
    CaseSensitivity, ContextRef, DefinitionRef, FoldingKind, INDEX_FILE_NAME, LoadState,
    Repository, RuleKind, SyntaxError,
};
use pretty_assertions::assert_eq;
use std::fs;

const HOST: &str = r###"<?xml version="1.0" encoding="UTF-8"?>
<language name="Host" section="Sources" version="2" kateversion="5.0" priority="1"
          extensions="*.host;*.hh" mimetype="text/x-host">
  <highlighting>
    <contexts>
      <context name="Normal" attribute="Text" lineEndContext="#stay">
        <DetectChar char="{" attribute="Text" beginRegion="Brace"/>
        <DetectChar char="}" attribute="Text" endRegion="Brace"/>
        <DetectChar char="&quot;" attribute="Text" context="String##Guest"/>
        <IncludeRules context="##Guest"/>
      </context>
    </contexts>
    <itemDatas>
      <itemData name="Text" defStyleNum="dsNormal"/>
    </itemDatas>
  </highlighting>
</language>"###;

const GUEST: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<language name="Guest" section="Other" version="1" kateversion="5.0" hidden="true"
          extensions="*.hh" priority="3">
  <highlighting>
    <contexts>
      <context name="Main" attribute="Plain" lineEndContext="#stay">
        <DetectChar char="[" beginRegion="Brace"/>
        <DetectChar char="]" endRegion="Brace"/>
      </context>
      <context name="String" attribute="Str" lineEndContext="#pop">
        <DetectChar char="&quot;" context="#pop"/>
      </context>
    </contexts>
    <itemDatas>
      <itemData name="Plain" defStyleNum="dsNormal"/>
      <itemData name="Str" defStyleNum="dsString"/>
    </itemDatas>
  </highlighting>
</language>"##;

const SPLICE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<language name="Splice" section="Test" version="1" kateversion="5.62">
  <highlighting>
    <list name="words"><item>one</item></list>
    <contexts>
      <context name="Normal" attribute="Text" lineEndContext="#stay">
        <DetectChar char="a"/>
        <IncludeRules context="Common"/>
        <DetectChar char="z"/>
      </context>
      <context name="Common" attribute="Text" lineEndContext="#stay">
        <DetectChar char="b"/>
        <IncludeRules context="Inner" includeAttrib="true"/>
      </context>
      <context name="Inner" attribute="Code" lineEndContext="#stay">
        <DetectChar char="c"/>
        <DetectChar char="d"/>
      </context>
      <context name="Loop" attribute="Text" lineEndContext="#stay">
        <IncludeRules context="Loop"/>
        <IncludeRules context="Missing"/>
        <DetectChar char="x"/>
      </context>
    </contexts>
    <itemDatas>
      <itemData name="Text" defStyleNum="dsNormal"/>
      <itemData name="Code" defStyleNum="dsFunction"/>
    </itemDatas>
  </highlighting>
</language>"##;

fn grammar(name: &str, priority: i32, kateversion: &str) -> String {
    format!(
        r##"<language name="{name}" section="Test" version="1" kateversion="{kateversion}" priority="{priority}" extensions="*.{name}">
  <highlighting>
    <contexts><context name="Normal" attribute="Text" lineEndContext="#stay"/></contexts>
    <itemDatas><itemData name="Text" defStyleNum="dsNormal"/></itemDatas>
  </highlighting>
</language>"##
    )
}

fn detect_chars(repo: &Repository, context: ContextRef) -> Vec<char> {
    repo.context(context)
        .expect("context")
        .rules()
        .iter()
        .map(|&r| match repo.rule(r).expect("rule").1.kind() {
            RuleKind::DetectChar { char, .. } => *char,
            RuleKind::IncludeRules(_) => '+',
            _ => '?',
        })
        .collect()
}

fn host_and_guest() -> (Repository, DefinitionRef, DefinitionRef) {
    let mut repo = Repository::new();
    let host = repo.add_definition_from_str(HOST).expect("host");
    let guest = repo.add_definition_from_str(GUEST).expect("guest");
    (repo, host, guest)
}

#[test]
fn test_load_is_idempotent() {
    let mut repo = Repository::new();
    let handle = repo.add_definition_from_str(SPLICE).expect("register");
    repo.load(handle).expect("first load");

    let snapshot = |repo: &Repository| {
        let definition = repo.definition(handle).expect("definition");
        let contexts: Vec<(String, usize)> = definition
            .contexts()
            .iter()
            .map(|c| (c.name().to_string(), c.rules().len()))
            .collect();
        let formats: Vec<u32> = definition.formats().iter().map(|f| f.id()).collect();
        (contexts, formats, definition.rules().len())
    };
    let first = snapshot(&repo);
    repo.load(handle).expect("second load");
    assert_eq!(snapshot(&repo), first);
    assert_eq!(
        repo.definition(handle).expect("definition").load_state(),
        LoadState::FullyLoaded
    );
}

#[test]
fn test_include_rules_splicing() {
    let mut repo = Repository::new();
    assert!(matches!(
        repo.load_by_name("Splice"),
        Err(SyntaxError::UnknownDefinition(_))
    ));

    repo.add_definition_from_str(SPLICE).expect("register");
    let handle = repo.load_by_name("Splice").expect("load");
    let definition = repo.definition(handle).expect("definition");
    let normal = definition.context_by_name("Normal").expect("Normal");
    let common = definition.context_by_name("Common").expect("Common");
    let looping = definition.context_by_name("Loop").expect("Loop");
    let code = definition.format_by_name("Code").expect("Code").id();
    let text = definition.format_by_name("Text").expect("Text").id();

    assert_eq!(detect_chars(&repo, normal), vec!['a', 'b', 'c', 'd', 'z']);
    assert_eq!(detect_chars(&repo, common), vec!['b', 'c', 'd']);
    // The self include is dropped, the unresolvable one stays inert.
    assert_eq!(detect_chars(&repo, looping), vec!['+', 'x']);

    // includeAttrib hands the included context's format to the includer.
    assert_eq!(repo.context(common).expect("context").attribute(), "Code");
    assert_eq!(
        repo.context(common).expect("context").attribute_format(),
        Some(code)
    );
    assert_eq!(
        repo.context(normal).expect("context").attribute_format(),
        Some(text)
    );

    // Spliced rules stay owned by the context that declared them.
    let spliced = repo.context(normal).expect("context").rules()[2];
    let inner_first = repo
        .context(definition.context_by_name("Inner").expect("Inner"))
        .expect("context")
        .rules()[0];
    assert_eq!(spliced, inner_first);
}

#[test]
fn test_cross_definition_references() {
    let (mut repo, host, guest) = host_and_guest();
    repo.load(host).expect("load");

    // Resolving Host loaded Guest on demand.
    assert!(repo.definition(guest).expect("guest").is_loaded());

    let normal = repo
        .definition(host)
        .expect("host")
        .initial_context()
        .expect("initial");
    assert_eq!(detect_chars(&repo, normal), vec!['{', '}', '"', '[', ']']);

    let string = repo
        .definition(guest)
        .expect("guest")
        .context_by_name("String")
        .expect("String");
    let quote = repo.context(normal).expect("context").rules()[2];
    assert_eq!(
        repo.rule(quote).expect("rule").1.context().target(),
        Some(string)
    );

    assert_eq!(repo.included_definitions(host), vec![guest]);
    assert!(repo.included_definitions(guest).is_empty());
    assert!(repo.folding_enabled(host));
}

#[test]
fn test_folding_region_ids() {
    let (mut repo, host, guest) = host_and_guest();
    repo.load(host).expect("load");

    let region = |handle: DefinitionRef, index: usize| {
        let rule = &repo.definition(handle).expect("definition").rules()[index];
        rule.begin_region().or(rule.end_region()).expect("region")
    };

    let open = region(host, 0);
    let close = region(host, 1);
    assert_eq!(open.kind(), FoldingKind::Begin);
    assert_eq!(close.kind(), FoldingKind::End);
    assert_eq!(open.id(), close.id());
    assert_eq!(open.signed_id(), -close.signed_id());
    assert!(open.signed_id() > 0);

    // Same region name, different definition: a different id.
    let guest_open = region(guest, 0);
    assert_ne!(guest_open.id(), open.id());
    assert_eq!(guest_open.id(), region(guest, 1).id());
}

#[test]
fn test_version_gate() {
    let mut repo = Repository::new();
    assert!(matches!(
        repo.add_definition_from_str(&grammar("New", 0, "6.0")),
        Err(SyntaxError::UnsupportedVersion { .. })
    ));
    assert!(matches!(
        repo.add_definition_from_str(&grammar("Newer", 0, "5.63")),
        Err(SyntaxError::UnsupportedVersion { .. })
    ));
    assert!(matches!(
        repo.add_definition_from_str(&grammar("Bad", 0, "five")),
        Err(SyntaxError::InvalidVersion(_))
    ));
    assert!(matches!(
        repo.add_definition_from_str("<notlanguage/>"),
        Err(SyntaxError::MissingLanguage)
    ));
    assert!(matches!(
        repo.add_definition_from_str("<language"),
        Err(SyntaxError::Xml(_))
    ));
    assert!(repo.definitions().is_empty());
}

#[test]
fn test_failed_load_leaves_definition_unloaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("late.xml");
    fs::write(&path, grammar("Late", 0, "5.0")).expect("write");

    let mut repo = Repository::new();
    let handle = repo.add_definition_file(&path).expect("register");
    fs::write(&path, grammar("Late", 0, "9.0")).expect("rewrite");

    assert!(matches!(
        repo.load(handle),
        Err(SyntaxError::UnsupportedVersion { .. })
    ));
    let definition = repo.definition(handle).expect("definition");
    assert_eq!(definition.load_state(), LoadState::Unloaded);
    assert!(definition.contexts().is_empty());
    assert!(!repo.folding_enabled(handle));
}

#[test]
fn test_higher_priority_wins() {
    let mut repo = Repository::new();
    let low = repo
        .add_definition_from_str(&grammar("Same", 1, "5.0"))
        .expect("low");
    let high = repo
        .add_definition_from_str(&grammar("Same", 5, "5.0"))
        .expect("high");
    assert_ne!(low, high);
    assert!(repo.definition(low).is_none());
    assert_eq!(repo.definition(high).expect("high").priority(), 5);

    let ignored = repo
        .add_definition_from_str(&grammar("Same", 0, "5.0"))
        .expect("ignored");
    assert_eq!(ignored, high);
    assert_eq!(repo.definition_for_name("Same"), Some(high));
    assert_eq!(repo.definitions().len(), 1);
}

#[test]
fn test_lookup_by_file_name_and_mime_type() {
    let (repo, host, guest) = host_and_guest();

    assert_eq!(repo.definition_for_file_name("src/main.host"), Some(host));
    // Both claim *.hh; Guest has the higher priority.
    assert_eq!(
        repo.definitions_for_file_name("/tmp/x.hh"),
        vec![guest, host]
    );
    assert_eq!(repo.definition_for_file_name("main.c"), None);
    assert_eq!(repo.definition_for_mime_type("text/x-host"), Some(host));
    assert_eq!(repo.definition_for_mime_type("text/plain"), None);

    // Sorted by section, then name.
    assert_eq!(repo.definitions(), vec![guest, host]);
}

#[test]
fn test_format_lookup_by_id() {
    let (mut repo, host, guest) = host_and_guest();
    repo.load(host).expect("load");

    let text = repo
        .definition(host)
        .expect("host")
        .format_by_name("Text")
        .expect("Text")
        .id();
    let string = repo
        .definition(guest)
        .expect("guest")
        .format_by_name("Str")
        .expect("Str")
        .id();

    assert_eq!(repo.format(text).expect("format").name(), "Text");
    assert_eq!(repo.format(text).expect("format").definition(), host);
    assert_eq!(repo.format(string).expect("format").name(), "Str");
    assert_ne!(text, string);
    assert!(repo.format(0).is_none());
}

#[test]
fn test_keyword_lists_load_on_their_own() {
    let mut repo = Repository::new();
    let handle = repo.add_definition_from_str(SPLICE).expect("register");

    assert_eq!(repo.keyword_list_names(handle), vec!["words".to_string()]);
    let definition = repo.definition(handle).expect("definition");
    assert_eq!(definition.load_state(), LoadState::KeywordsOnly);
    assert!(definition.contexts().is_empty());

    assert!(repo.set_keyword_list(handle, "words", vec!["two".into(), "three".into()]));
    assert!(!repo.set_keyword_list(handle, "missing", Vec::new()));

    // Edits made after a keyword-only load survive the full load.
    repo.load(handle).expect("load");
    let list = repo.keyword_list(handle, "words").expect("list");
    assert_eq!(list.keywords(), ["two", "three"]);
    assert_eq!(list.case_sensitivity(), CaseSensitivity::Sensitive);
    assert!(list.contains("three"));
    assert!(!list.contains("one"));
}

#[test]
fn test_clear_and_remove() {
    let (mut repo, host, guest) = host_and_guest();
    repo.load(host).expect("load");

    assert!(repo.clear_definition(host));
    let definition = repo.definition(host).expect("handle survives clear");
    assert_eq!(definition.load_state(), LoadState::Unloaded);
    assert!(definition.contexts().is_empty());
    repo.load(host).expect("reload");
    assert!(repo.definition(host).expect("host").is_loaded());

    let removed = repo.remove(guest).expect("removed");
    assert_eq!(removed.name(), "Guest");
    assert!(repo.definition(guest).is_none());
    assert!(repo.definition_for_name("Guest").is_none());
    assert!(!repo.clear_definition(guest));
    assert!(repo.remove(guest).is_none());
    assert!(matches!(repo.load(guest), Err(SyntaxError::ExpiredDefinition)));

    // The freed slot is reused, but not by the old handle.
    let again = repo.add_definition_from_str(GUEST).expect("guest");
    assert_ne!(again, guest);
    assert!(repo.definition(guest).is_none());
}

#[test]
fn test_clear_reloads_including_definitions() {
    let (mut repo, host, guest) = host_and_guest();
    repo.load(host).expect("load");
    let normal = repo
        .definition(host)
        .and_then(|d| d.initial_context())
        .expect("Normal");
    assert_eq!(detect_chars(&repo, normal), vec!['{', '}', '"', '[', ']']);

    assert!(repo.clear_definition(guest));
    assert_eq!(
        repo.definition(host).expect("host").load_state(),
        LoadState::Unloaded
    );

    repo.load(host).expect("reload");
    assert!(repo.definition(guest).expect("guest").is_loaded());
    assert_eq!(detect_chars(&repo, normal), vec!['{', '}', '"', '[', ']']);

    let rules = repo.context(normal).expect("Normal").rules().to_vec();
    let (owner, bracket) = repo.rule(rules[3]).expect("spliced rule");
    assert_eq!(owner.name(), "Guest");
    assert_eq!(bracket.matches("[", 0, &[], owner).offset(), 1);

    let (_, quote) = repo.rule(rules[2]).expect("quote rule");
    let target = quote.context().target().expect("String##Guest");
    assert_eq!(repo.context(target).expect("String").name(), "String");

    // Evicting the guest leaves the host to resolve without it.
    repo.remove(guest).expect("removed");
    assert!(!repo.definition(host).expect("host").is_loaded());
    repo.load(host).expect("load without guest");
    assert_eq!(detect_chars(&repo, normal), vec!['{', '}', '"', '+']);
}

#[test]
fn test_search_path_scanning() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("host.xml"), HOST).expect("write");
    fs::write(dir.path().join("guest.xml"), GUEST).expect("write");
    fs::write(dir.path().join("broken.xml"), "<language").expect("write");
    fs::write(dir.path().join("notes.txt"), "not a grammar").expect("write");

    let mut repo = Repository::new();
    repo.add_search_path(dir.path());
    assert_eq!(repo.search_paths(), [dir.path().to_path_buf()]);

    let names: Vec<String> = repo
        .definitions()
        .into_iter()
        .map(|d| repo.definition(d).expect("definition").name().to_string())
        .collect();
    assert_eq!(names, vec!["Guest".to_string(), "Host".to_string()]);

    let host = repo.definition_for_name("Host").expect("Host");
    assert_eq!(
        repo.definition(host).expect("host").source().path(),
        Some(dir.path().join("host.xml").as_path())
    );
    repo.load(host).expect("load");
    assert_eq!(repo.included_definitions(host).len(), 1);
}

#[test]
fn test_search_path_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("host.xml"), HOST).expect("write");
    fs::write(dir.path().join("guest.xml"), GUEST).expect("write");
    // The index wins over the files' own metadata, and unlisted files are
    // not scanned.
    fs::write(
        dir.path().join(INDEX_FILE_NAME),
        r#"{
            "host.xml": {"name": "Host", "section": "Indexed", "priority": 7,
                         "extensions": "*.idx", "mimetype": "text/x-indexed"}
        }"#,
    )
    .expect("write");

    let mut repo = Repository::new();
    repo.add_search_path(dir.path());
    assert_eq!(repo.definitions().len(), 1);

    let host = repo.definition_for_file_name("a.idx").expect("Host");
    let definition = repo.definition(host).expect("host");
    assert_eq!(definition.section(), "Indexed");
    assert_eq!(definition.priority(), 7);
    assert_eq!(definition.load_state(), LoadState::Unloaded);

    // Host refers to Guest, which the index does not know.
    repo.load(host).expect("load");
    let normal = repo
        .definition(host)
        .expect("host")
        .initial_context()
        .expect("initial");
    assert_eq!(detect_chars(&repo, normal), vec!['{', '}', '"', '+']);
    assert!(repo.included_definitions(host).is_empty());
}

#[test]
fn test_broken_index_falls_back_to_scanning() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("host.xml"), HOST).expect("write");
    fs::write(dir.path().join(INDEX_FILE_NAME), "{ not json").expect("write");

    let mut repo = Repository::new();
    repo.add_search_path(dir.path());
    let host = repo.definition_for_name("Host").expect("Host");
    assert_eq!(repo.definition(host).expect("host").section(), "Sources");
}

#[test]
fn test_reload_keeps_handles_of_surviving_definitions() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("host.xml"), HOST).expect("write");
    fs::write(dir.path().join("guest.xml"), GUEST).expect("write");

    let mut repo = Repository::new();
    repo.add_search_path(dir.path());
    let inline = repo
        .add_definition_from_str(&grammar("Inline", 0, "5.0"))
        .expect("inline");
    let host = repo.definition_for_name("Host").expect("Host");
    let guest = repo.definition_for_name("Guest").expect("Guest");
    repo.load(host).expect("load");
    let first_text = repo
        .definition(host)
        .expect("host")
        .format_by_name("Text")
        .expect("Text")
        .id();

    fs::remove_file(dir.path().join("guest.xml")).expect("remove");
    fs::write(
        dir.path().join("host.xml"),
        HOST.replace(r#"section="Sources""#, r#"section="Changed""#),
    )
    .expect("rewrite");
    repo.reload();

    let definition = repo.definition(host).expect("host survives");
    assert_eq!(definition.load_state(), LoadState::Unloaded);
    assert_eq!(definition.section(), "Changed");
    assert!(repo.definition(guest).is_none());
    assert!(repo.definition(inline).is_some());

    // Id counters restart with the reload.
    repo.load(host).expect("load");
    let text = repo
        .definition(host)
        .expect("host")
        .format_by_name("Text")
        .expect("Text")
        .id();
    assert_eq!(text, first_text);
    assert!(repo.included_definitions(host).is_empty());
}
