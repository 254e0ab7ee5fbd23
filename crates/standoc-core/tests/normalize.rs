/*
 * tests/normalize.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end normalization tests.
 */

//! End-to-end normalization tests.
//!
//! Each test parses a whole document, runs the [`Orchestrator`] and checks the
//! serialized tree and the diagnostics.

use std::path::Path;
use std::sync::Arc;

use standoc_bib::{
    CacheScopes, DirectorySource, FetchError, MemoryCacheStore, Resolver, ResolverOptions,
    StaticSource, TieredCache,
};
use standoc_core::{
    BibliographyConfig, IdGenerator, Orchestrator, RunContext, StandocConfig,
};
use standoc_error_reporting::DiagnosticCollector;
use standoc_xml::Document;

const DOCUMENT: &str = concat!(
    "<standard-document><sections>",
    r#"<clause id="a:b"><title>A</title>"#,
    r#"<p>See <xref target=":a#b:"/></p>"#,
    r#"<table id="t"><tbody><tr><td>1</td></tr></tbody></table>"#,
    "<p>Key</p><dl><dt>x</dt><dd>width</dd></dl>",
    "<p>para</p><note><p>a note</p></note><p>after</p>",
    r#"<note keep-separate="true"><p>kept apart</p></note><p>last</p>"#,
    r#"<sourcecode id="s">puts x <callout>1</callout></sourcecode>"#,
    "<annotation><p>prints x</p></annotation>",
    "</clause>",
    r#"<terms id="terms"><term id="t1">"#,
    "<p><preferred><expression><name>velocity</name></expression></preferred></p>",
    "<p>rate of change of position</p><termnote><p>n</p></termnote>",
    "</term></terms>",
    "<definitions><dl><dt>x</dt><dd>first</dd><dt>a</dt><dd>second</dd></dl></definitions>",
    "</sections><bibliography>",
    r#"<references id="norm"><title>Normative references</title>"#,
    r#"<ul><li><ref id="iso1">[ISO 1:2002]</ref> Tolerances</li></ul>"#,
    "</references></bibliography></standard-document>"
);

fn ctx() -> RunContext {
    RunContext::new(StandocConfig::default()).with_ids(IdGenerator::sequential())
}

async fn normalize_offline(xml: &str) -> (Document, DiagnosticCollector) {
    let mut doc = standoc_xml::parse(xml).unwrap();
    let mut ctx = ctx();
    Orchestrator::default()
        .normalize_offline(&mut doc, &mut ctx)
        .await
        .unwrap();
    (doc, ctx.sink)
}

fn texts(doc: &Document, query: &str) -> Vec<String> {
    doc.select_str(doc.root(), query)
        .unwrap()
        .into_iter()
        .map(|n| doc.text_content(n))
        .collect()
}

#[tokio::test]
async fn test_whole_document_is_normalized() {
    let (doc, sink) = normalize_offline(DOCUMENT).await;
    let root = doc.root();
    let has = |query: &str| !doc.select_str(root, query).unwrap().is_empty();

    assert!(has("//clause[@id='a_b']"));
    assert!(has("//xref[@target='_a#b_']"));
    assert!(has("//table[@id='t']/dl[@key='true']"));
    assert!(has("//p/note"));
    assert!(has("//clause/note[@keep-separate='true']"));
    assert!(has("//sourcecode/annotation[@id]"));
    assert!(has("//term/definition/verbal-definition/p"));
    assert_eq!(texts(&doc, "//definitions/dl/dt"), vec!["a", "x"]);
    assert!(has("//references[@id='norm']/bibitem[@id='iso1']"));
    assert!(!has("//references/ul"));

    let normalised: Vec<_> = sink.with_code("S-1-1").collect();
    assert_eq!(normalised.len(), 2);
    assert_eq!(
        normalised[0].problem.as_ref().unwrap().as_str(),
        r#"normalised identifier in <clause id="a_b"/> from a:b"#
    );
}

#[tokio::test]
async fn test_normalizing_twice_changes_nothing() {
    let (once, _) = normalize_offline(DOCUMENT).await;
    let once = once.to_string();
    let (twice, sink) = normalize_offline(&once).await;
    assert_eq!(twice.to_string(), once);
    assert!(sink.is_empty());
}

fn online(source: StaticSource) -> Resolver {
    let cache = TieredCache::new(
        CacheScopes::GlobalOnly,
        None,
        Some(Box::new(MemoryCacheStore::new())),
    );
    Resolver::new(Some(Arc::new(source)), cache, ResolverOptions::default())
}

fn record(title: &str, id: &str) -> String {
    format!("<bibitem><title>{title}</title><docidentifier>{id}</docidentifier></bibitem>")
}

#[tokio::test]
async fn test_one_failed_fetch_leaves_the_others() {
    let source = StaticSource::new()
        .with_record("ISO 1", Some("2002"), record("One", "ISO 1:2002"))
        .with_failure(
            "ISO 2",
            Some("2002"),
            FetchError::Unavailable("timed out".to_string()),
        )
        .with_record("ISO 3", Some("2002"), record("Three", "ISO 3:2002"));
    let mut ctx = ctx().with_resolver(online(source));
    let mut doc = standoc_xml::parse(concat!(
        "<references><ul>",
        r#"<li><ref id="r1">[ISO 1:2002]</ref> One</li>"#,
        r#"<li><ref id="r2">[ISO 2:2002]</ref> Two</li>"#,
        r#"<li><ref id="r3">[ISO 3:2002]</ref> Three</li>"#,
        "</ul></references>"
    ))
    .unwrap();

    Orchestrator::default().normalize(&mut doc, &mut ctx).await.unwrap();

    let root = doc.root();
    let ids: Vec<_> = doc
        .select_str(root, "//bibitem")
        .unwrap()
        .into_iter()
        .filter_map(|b| doc.attr(b, "id").map(str::to_string))
        .collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);
    assert_eq!(texts(&doc, "//bibitem/title"), vec!["One", "--", "Three"]);
    assert_eq!(
        texts(&doc, "//bibitem[@id='r2']/docidentifier"),
        vec!["ISO 2:2002"]
    );
    assert_eq!(ctx.sink.with_code("S-4-1").count(), 1);
}

async fn normalize_with(config: &StandocConfig, base: &Path, xml: &str) -> (String, DiagnosticCollector) {
    let resolver = config.bibliography.build_resolver(base);
    let mut ctx = RunContext::new(config.clone()).with_resolver(resolver);
    let mut doc = standoc_xml::parse(xml).unwrap();
    Orchestrator::default().normalize(&mut doc, &mut ctx).await.unwrap();
    (doc.to_string(), ctx.sink)
}

#[tokio::test]
async fn test_cached_record_outlives_its_source() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records");
    std::fs::create_dir_all(&records).unwrap();
    let record_path = DirectorySource::new(&records).record_path("ISO 1", Some("2002"));
    std::fs::write(&record_path, record("Tolerances", "ISO 1:2002")).unwrap();

    let config = StandocConfig {
        bibliography: BibliographyConfig {
            source_dir: Some(records.clone()),
            global_cache: Some(dir.path().join("cache")),
            ..Default::default()
        },
        ..Default::default()
    };
    let xml = r#"<references><ul><li><ref id="iso1">[ISO 1:2002]</ref> Tolerances</li></ul></references>"#;

    let (first, _) = normalize_with(&config, dir.path(), xml).await;
    assert!(first.contains("<docidentifier>ISO 1:2002</docidentifier>"));

    std::fs::remove_file(&record_path).unwrap();
    let (second, sink) = normalize_with(&config, dir.path(), xml).await;
    assert_eq!(second, first);
    assert!(sink.with_code("S-4-1").next().is_none());
}
