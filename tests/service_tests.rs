use jsonql::{JsonQl, JsonQlConfig, JsonQlError, Node};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_check_value() {
    let jq = JsonQl::new();

    assert!(jq.check_value("a.b[0]").await.is_ok());
    assert!(jq.check_value(r#"a[x = "1"].c"#).await.is_ok());
    assert!(jq.check_value(r#"["odd key"]"#).await.is_ok());

    for bad in ["", "a.", "a[", "a[1", "a = 1", "a.b]", "and"] {
        let err = jq.check_value(bad).await.unwrap_err();
        assert!(err.is_syntax(), "{:?} should be a syntax error", bad);
    }
}

#[tokio::test]
async fn test_check_predicate() {
    let jq = JsonQl::new();

    for good in [
        "exists a",
        "a = 1",
        "a ~ \"x.*\"",
        "a in (1, 2)",
        "a >= 10 and not b < -2",
        "(a = 1 or b = 2) and c[d = 3].e = 4",
    ] {
        assert!(jq.check_predicate(good).await.is_ok(), "{:?} should parse", good);
    }

    for bad in ["a", "a =", "a ~ x", "a in 1", "a > 1.5", "exists", "a = 1 or"] {
        let err = jq.check_predicate(bad).await.unwrap_err();
        assert!(err.is_syntax(), "{:?} should be a syntax error", bad);
    }
}

#[tokio::test]
async fn test_syntax_error_reports_position() {
    let jq = JsonQl::new();

    match jq.check_predicate("a = 1 and").await {
        Err(JsonQlError::Syntax(e)) => {
            assert_eq!(e.position, 9);
            assert!(e.to_string().starts_with("at position 9:"));
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_context_of_starts_clean() {
    let jq = JsonQl::new();
    let doc = json!({"a": 1});

    let mut context = jq.context_of(&doc);
    assert!(std::ptr::eq(context.root(), &doc));
    assert!(!context.has_errors());
    assert!(context.take_errors().is_empty());
}

#[tokio::test]
async fn test_evaluate_whole_document() {
    let jq = JsonQl::new();
    let doc = json!([{"a": 1}, {"a": 2}]);
    let mut context = jq.context_of(&doc);

    let node = jq.evaluate("[a = 2].a", &mut context).await.unwrap();
    assert_eq!(node, Node::Present(&doc[1]["a"]));

    let node = jq.evaluate("[1]", &mut context).await.unwrap();
    assert_eq!(node.as_value(), Some(&json!({"a": 2})));
    assert!(!context.has_errors());
}

#[tokio::test]
async fn test_config_from_json() {
    let config = JsonQlConfig::from_json(
        r#"{
            "parserPool": {"size": 2, "timeout": 1},
            "expressionCache": {"values": 10},
            "errorCache": {"size": 3}
        }"#,
    )
    .unwrap();

    assert_eq!(config.parser_pool_size, 2);
    assert_eq!(config.parser_pool_timeout, Duration::from_secs(1));
    assert_eq!(config.value_cache_capacity, 10);
    assert_eq!(
        config.predicate_cache_capacity,
        JsonQlConfig::DEFAULT_PREDICATE_CACHE_CAPACITY
    );
    assert_eq!(config.error_cache_capacity, 3);

    let jq = JsonQl::with_config(config).unwrap();
    jq.check_value("a").await.unwrap();
    assert_eq!(jq.pool_stats().max_parsers, 2);
}

#[tokio::test]
async fn test_config_rejects_bad_input() {
    assert!(matches!(
        JsonQlConfig::from_json(r#"{"parserPool": {"size": 0}}"#),
        Err(JsonQlError::Config(_))
    ));
    assert!(matches!(
        JsonQlConfig::from_json("not json"),
        Err(JsonQlError::Config(_))
    ));
    assert!(matches!(
        JsonQl::with_config(JsonQlConfig::new().error_cache_capacity(0)),
        Err(JsonQlError::Config(_))
    ));
}

#[tokio::test]
async fn test_cache_stats() {
    let jq = JsonQl::new();
    let doc = json!({"a": "x"});

    for _ in 0..3 {
        let mut context = jq.context_of(&doc);
        jq.evaluate("a", &mut context).await.unwrap();
        jq.satisfies("a = x", &mut context).await.unwrap();
    }
    let _ = jq.check_predicate("a =").await;
    let _ = jq.check_predicate("a =").await;

    let stats = jq.cache_stats();
    assert_eq!(stats.value_entries, 1);
    assert_eq!(stats.predicate_entries, 1);
    assert_eq!(stats.failure_entries, 1);
    assert_eq!(stats.parses, 3);
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.negative_hits, 1);
    assert!(stats.to_string().starts_with("Expression Cache: 1 values, 1 predicates, 1 failures"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluation_on_shared_service() {
    let jq = Arc::new(JsonQl::new());
    let doc = Arc::new(json!({"items": [{"id": "1"}, {"id": "2"}, {"id": "3"}]}));

    let mut handles = vec![];
    for i in 1..=3 {
        let jq = Arc::clone(&jq);
        let doc = Arc::clone(&doc);
        handles.push(tokio::spawn(async move {
            let mut context = jq.context_of(&doc);
            let predicate = format!("exists items[id = {}]", i);
            let found = jq.satisfies(&predicate, &mut context).await.unwrap();
            let missing = jq.satisfies("exists items[id = 9]", &mut context).await.unwrap();
            (found, missing, context.take_errors().len())
        }));
    }

    for handle in handles {
        let (found, missing, errors) = handle.await.unwrap();
        assert!(found);
        assert!(!missing);
        assert_eq!(errors, 1);
    }
}
