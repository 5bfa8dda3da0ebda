//! End-to-end tests of the search orchestration through the public API.

use std::sync::Arc;
use std::time::Duration;

use scipaper::config::{CacheConfig, Config};
use scipaper::fetcher::{FetchError, Fetcher};
use scipaper::models::{PaperBuilder, PartialDate, SearchRequest, SourceType};
use scipaper::sources::{MockSource, Source, SourceRegistry};
use scipaper::utils::MemoryCache;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn uncached_config() -> Config {
    Config {
        cache: CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        },
        ..Config::default()
    }
}

fn build_fetcher(sources: Vec<Arc<dyn Source>>) -> Fetcher {
    init_tracing();
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(source).unwrap();
    }
    Fetcher::new(registry, uncached_config())
}

#[tokio::test]
async fn search_reports_one_status_per_requested_source() {
    let healthy = MockSource::named("healthy");
    let records = vec![healthy.record(1, "Result One"), healthy.record(2, "Result Two")];
    let fetcher = build_fetcher(vec![
        Arc::new(healthy.with_results(records)),
        Arc::new(MockSource::named("broken").with_error("upstream 500")),
        Arc::new(
            MockSource::named("sluggish")
                .with_results(vec![])
                .with_delay(Duration::from_secs(10)),
        ),
    ]);

    let request = SearchRequest::new("anything").timeout_per_source(Duration::from_millis(100));
    let response = fetcher.search(&request).await.unwrap();

    assert_eq!(response.statuses.len(), 3);
    let by_source = |name: &str| {
        response
            .statuses
            .iter()
            .find(|s| s.source == name)
            .unwrap()
    };
    assert!(by_source("healthy").is_success());
    assert!(!by_source("broken").is_success());
    assert!(!by_source("sluggish").is_success());
    assert_eq!(response.records.len(), 2);
}

#[tokio::test]
async fn search_never_exceeds_limit() {
    let mock = MockSource::named("prolific");
    let records: Vec<_> = (0..30).map(|i| mock.record(i, format!("Paper {}", i))).collect();
    let fetcher = build_fetcher(vec![Arc::new(mock.with_results(records))]);

    let response = fetcher
        .search(&SearchRequest::new("paper").limit(5))
        .await
        .unwrap();

    assert_eq!(response.records.len(), 5);
}

#[tokio::test]
async fn repeated_search_is_served_from_cache_identically() {
    let mock = Arc::new(MockSource::named("counted"));
    let mut registry = SourceRegistry::new();
    registry.register(mock.clone()).unwrap();
    let fetcher =
        Fetcher::new(registry, uncached_config()).with_cache(Arc::new(MemoryCache::new()));

    let request = SearchRequest::new("stable query").limit(10);
    let first = fetcher.search(&request).await.unwrap();
    let second = fetcher.search(&request).await.unwrap();

    // The source ran once; the second response is the cached bytes.
    assert_eq!(mock.search_calls(), 1);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn duplicate_papers_collapse_across_sources_with_field_fill() {
    // The same paper seen by arXiv (no DOI, has abstract) and by Crossref
    // (has DOI and journal, no abstract), plus one unique paper each.
    let shared_title = "Sparse Attention for Long Documents";
    let from_arxiv = vec![
        PaperBuilder::new("2302.00001", shared_title, "https://arxiv.org/abs/2302.00001", SourceType::Arxiv)
            .authors(["Dana Researcher"])
            .abstract_text("We make attention sparse.")
            .published(PartialDate::year_month(2023, 2))
            .build(),
        PaperBuilder::new("2302.00002", "An arXiv Exclusive", "https://arxiv.org/abs/2302.00002", SourceType::Arxiv)
            .authors(["Eve Writer"])
            .published(PartialDate::year(2023))
            .build(),
    ];
    let from_crossref = vec![
        PaperBuilder::new("10.9999/sparse", shared_title, "https://doi.org/10.9999/sparse", SourceType::Crossref)
            .doi("10.9999/sparse")
            .authors(["Dana Researcher"])
            .journal("TMLR")
            .published(PartialDate::year_month(2023, 2))
            .build(),
        PaperBuilder::new("10.9999/other", "A Crossref Exclusive", "https://doi.org/10.9999/other", SourceType::Crossref)
            .doi("10.9999/other")
            .authors(["Frank Author"])
            .published(PartialDate::year(2022))
            .build(),
    ];

    let fetcher = build_fetcher(vec![
        Arc::new(MockSource::named("arxiv").with_results(from_arxiv)),
        Arc::new(MockSource::named("crossref").with_results(from_crossref)),
    ]);

    let response = fetcher
        .search(&SearchRequest::new("attention"))
        .await
        .unwrap();

    assert_eq!(response.records.len(), 3);
    let merged = response
        .records
        .iter()
        .find(|r| r.title == shared_title)
        .expect("collapsed record present");
    // Crossref is more authoritative, so its identity wins, and the
    // abstract only arXiv had is filled in.
    assert_eq!(merged.source, SourceType::Crossref);
    assert_eq!(merged.doi.as_deref(), Some("10.9999/sparse"));
    assert_eq!(merged.abstract_text.as_deref(), Some("We make attention sparse."));
    assert_eq!(merged.journal.as_deref(), Some("TMLR"));
}

#[tokio::test]
async fn unknown_requested_source_fails_before_dispatch() {
    let mock = Arc::new(MockSource::named("real"));
    let mut registry = SourceRegistry::new();
    registry.register(mock.clone()).unwrap();
    let fetcher = Fetcher::new(registry, uncached_config());

    let request = SearchRequest::new("q").sources(["real", "imaginary"]);
    let err = fetcher.search(&request).await.unwrap_err();

    assert!(matches!(err, FetchError::UnknownSource(name) if name == "imaginary"));
    assert_eq!(mock.search_calls(), 0);
}

#[tokio::test]
async fn total_source_failure_is_an_empty_ok_response() {
    let fetcher = build_fetcher(vec![
        Arc::new(MockSource::named("a").with_error("down")),
        Arc::new(MockSource::named("b").with_rate_limit()),
    ]);

    let response = fetcher.search(&SearchRequest::new("q")).await.unwrap();

    assert!(response.records.is_empty());
    assert!(response.all_sources_failed());
    assert_eq!(response.statuses.len(), 2);
}

#[tokio::test]
async fn search_restricted_to_subset_only_dispatches_there() {
    let wanted = Arc::new(MockSource::named("wanted"));
    let ignored = Arc::new(MockSource::named("ignored"));
    let mut registry = SourceRegistry::new();
    registry.register(wanted.clone()).unwrap();
    registry.register(ignored.clone()).unwrap();
    let fetcher = Fetcher::new(registry, uncached_config());

    let request = SearchRequest::new("q").sources(["wanted"]);
    let response = fetcher.search(&request).await.unwrap();

    assert_eq!(response.statuses.len(), 1);
    assert_eq!(response.statuses[0].source, "wanted");
    assert_eq!(wanted.search_calls(), 1);
    assert_eq!(ignored.search_calls(), 0);
}

#[tokio::test]
async fn fetch_scans_sources_until_a_record_is_found() {
    let empty = MockSource::named("empty");
    let holder = MockSource::named("holder");
    let record = holder.record(9, "The One Paper");
    let id = record.paper_id.clone();
    let fetcher = build_fetcher(vec![
        Arc::new(empty),
        Arc::new(holder.with_results(vec![record])),
    ]);

    let found = fetcher.fetch(&id, None).await.unwrap().unwrap();
    assert_eq!(found.title, "The One Paper");

    assert!(fetcher.fetch("unknown-id", None).await.unwrap().is_none());
}

#[tokio::test]
async fn fetch_from_explicit_source() {
    let holder = MockSource::named("holder");
    let record = holder.record(1, "Direct Hit");
    let id = record.paper_id.clone();
    let fetcher = build_fetcher(vec![Arc::new(holder.with_results(vec![record]))]);

    let found = fetcher.fetch(&id, Some("holder")).await.unwrap();
    assert!(found.is_some());

    let err = fetcher.fetch(&id, Some("absent")).await.unwrap_err();
    assert!(matches!(err, FetchError::UnknownSource(_)));
}
