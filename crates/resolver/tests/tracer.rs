use navigator_resolver::{
    CancelSignal, ChainStop, ChainTracer, InMemorySource, PackageMapping, RepositoryRef,
    ResolveError, ResolverLimits, SourceError, SourceOp,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

fn repo(name: &str) -> RepositoryRef {
    name.parse().unwrap()
}

fn queries() -> Vec<String> {
    ["class {name}", "interface {name}", "enum {name}"]
        .iter()
        .map(|q| q.to_string())
        .collect()
}

fn tracer(source: InMemorySource, mapping: PackageMapping) -> (Arc<InMemorySource>, ChainTracer) {
    let source = Arc::new(source);
    let tracer = ChainTracer::new(
        source.clone(),
        Arc::new(mapping),
        &queries(),
        &ResolverLimits::default(),
    );
    (source, tracer)
}

fn java(package: &str, imports: &[&str], decl: &str) -> String {
    let mut out = format!("package {package};\n\n");
    for import in imports {
        out.push_str(&format!("import {import};\n"));
    }
    out.push_str(&format!("\npublic {decl} {{\n}}\n"));
    out
}

#[tokio::test]
async fn import_cycle_stops_at_second_visit() {
    let foo = repo("acme/foo");
    let bar = repo("acme/bar");
    let source = InMemorySource::new()
        .with_file(
            &foo,
            "src/com/acme/foo/Foo.java",
            &java("com.acme.foo", &["com.acme.bar.Bar"], "class Foo"),
        )
        .with_file(
            &bar,
            "src/com/acme/bar/Bar.java",
            &java("com.acme.bar", &["com.acme.foo.Foo"], "class Bar"),
        );
    let mut mapping = PackageMapping::new();
    mapping.insert("com.acme.foo", foo.clone());
    mapping.insert("com.acme.bar", bar.clone());
    let (_, tracer) = tracer(source, mapping);

    let result = tracer.trace(&foo, "Foo", &CancelSignal::never()).await.unwrap();

    assert_eq!(result.nodes.len(), 2);
    assert!(!result.truncated);
    assert_eq!(result.stop, ChainStop::CycleDetected);
    assert_eq!(result.nodes[0].entity_name, "Foo");
    assert_eq!(result.nodes[0].depth, 1);
    assert_eq!(result.nodes[0].next_import.as_deref(), Some("com.acme.bar.Bar"));
    assert_eq!(result.nodes[1].repository, bar);
    assert_eq!(result.nodes[1].entity_name, "Bar");
    assert_eq!(
        result.nodes[1].definition_location.as_deref(),
        Some("src/com/acme/bar/Bar.java")
    );
    assert_eq!(result.visited, 2);
}

#[tokio::test]
async fn long_chain_is_truncated_at_max_depth() {
    let mut source = InMemorySource::new();
    let mut mapping = PackageMapping::new();
    for level in 1..=6 {
        let r = repo(&format!("chain/r{level}"));
        let imports: Vec<String> = if level < 6 {
            vec![format!("com.chain.r{}.C{}", level + 1, level + 1)]
        } else {
            Vec::new()
        };
        let imports: Vec<&str> = imports.iter().map(String::as_str).collect();
        source = source.with_file(
            &r,
            &format!("C{level}.java"),
            &java(&format!("com.chain.r{level}"), &imports, &format!("class C{level}")),
        );
        mapping.insert(format!("com.chain.r{level}"), r);
    }
    let (source, tracer) = tracer(source, mapping);

    let result = tracer
        .trace(&repo("chain/r1"), "C1", &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.nodes.len(), 5);
    assert!(result.truncated);
    assert_eq!(result.stop, ChainStop::DepthLimit);
    let depths: Vec<_> = result.nodes.iter().map(|n| n.depth).collect();
    assert_eq!(depths, vec![1, 2, 3, 4, 5]);
    assert_eq!(result.nodes[4].entity_name, "C5");

    let pairs: HashSet<_> = result
        .nodes
        .iter()
        .map(|n| (n.repository.clone(), n.entity_name.clone()))
        .collect();
    assert_eq!(pairs.len(), result.nodes.len());
    // The sixth level is never searched.
    assert!(source
        .calls()
        .iter()
        .all(|c| c.repository != "chain/r6"));
}

#[tokio::test]
async fn chain_ends_without_mapped_import() {
    let app = repo("acme/app");
    let source = InMemorySource::new().with_file(
        &app,
        "Service.java",
        &java("com.acme", &["java.util.List", "com.unknown.Thing"], "class Service"),
    );
    let (_, tracer) = tracer(source, PackageMapping::new());

    let result = tracer.trace(&app, "Service", &CancelSignal::never()).await.unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.stop, ChainStop::NoUpstream);
    assert!(!result.truncated);
    assert!(result.nodes[0].snippet.as_deref().unwrap().contains("class Service"));
}

#[tokio::test]
async fn later_templates_find_interfaces() {
    let app = repo("acme/app");
    let source = InMemorySource::new().with_file(
        &app,
        "Repo.java",
        &java("com.acme", &[], "interface Repo"),
    );
    let (source, tracer) = tracer(source, PackageMapping::new());

    let result = tracer.trace(&app, "Repo", &CancelSignal::never()).await.unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(source.call_count(SourceOp::Search), 2);
}

#[tokio::test]
async fn unknown_entity_yields_empty_chain() {
    let (_, tracer) = tracer(
        InMemorySource::new().with_repository(&repo("acme/app")),
        PackageMapping::new(),
    );
    let result = tracer
        .trace(&repo("acme/app"), "Ghost", &CancelSignal::never())
        .await
        .unwrap();
    assert!(result.nodes.is_empty());
    assert_eq!(result.stop, ChainStop::NoDefinition);
    assert!(!result.truncated);
}

#[tokio::test]
async fn unreadable_file_falls_back_to_search_snippet() {
    let app = repo("acme/app");
    let source = InMemorySource::new()
        .with_file(&app, "Foo.java", &java("com.acme", &[], "class Foo"))
        .with_failure(
            SourceOp::Read,
            "Foo.java",
            SourceError::NotFound("gone".to_string()),
        );
    let (_, tracer) = tracer(source, PackageMapping::new());

    let result = tracer.trace(&app, "Foo", &CancelSignal::never()).await.unwrap();
    assert_eq!(result.nodes[0].snippet.as_deref(), Some("public class Foo {"));
}

#[tokio::test]
async fn snippet_respects_char_budget() {
    let app = repo("acme/app");
    let body = format!("public class Big {{\n    // {}\n}}\n", "é".repeat(800));
    let source = InMemorySource::new().with_file(&app, "Big.java", &body);
    let (_, tracer) = tracer(source, PackageMapping::new());

    let result = tracer.trace(&app, "Big", &CancelSignal::never()).await.unwrap();
    let snippet = result.nodes[0].snippet.as_deref().unwrap();
    assert_eq!(snippet.chars().count(), 500);
}

#[tokio::test]
async fn transient_search_failure_aborts_trace() {
    let app = repo("acme/app");
    let source = InMemorySource::new()
        .with_file(&app, "Foo.java", &java("com.acme", &[], "class Foo"))
        .with_failure(
            SourceOp::Search,
            "class Foo",
            SourceError::Network("reset".to_string()),
        );
    let (_, tracer) = tracer(source, PackageMapping::new());

    let err = tracer.trace(&app, "Foo", &CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, ResolveError::Source(SourceError::Network(_))));
}

#[tokio::test]
async fn pre_cancelled_trace_makes_no_calls() {
    let app = repo("acme/app");
    let source = InMemorySource::new().with_file(&app, "Foo.java", "class Foo {}");
    let (source, tracer) = tracer(source, PackageMapping::new());
    let (handle, signal) = CancelSignal::pair();
    handle.cancel();

    let err = tracer.trace(&app, "Foo", &signal).await.unwrap_err();
    assert!(matches!(err, ResolveError::Cancelled));
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn blank_entity_is_rejected_before_searching() {
    let app = repo("acme/app");
    let source = InMemorySource::new().with_file(&app, "A.java", "public class Alpha {}");
    let (source, tracer) = tracer(source, PackageMapping::new());

    let err = tracer.trace(&app, "   ", &CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidRequest(_)));
    assert!(source.calls().is_empty());
}
