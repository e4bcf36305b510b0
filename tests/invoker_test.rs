//! Integration tests for the reliable invoker: retry bounds, timeout
//! precedence, backoff pacing, fallback substitution and deduplication.
//! Timing-sensitive tests run on the paused tokio clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use agent_task_core::{InvokeError, InvokeOptions, ReliableInvoker};
use common::MockTransport;

fn invoker(transport: &Arc<MockTransport>) -> ReliableInvoker {
    ReliableInvoker::new(transport.clone())
}

#[tokio::test(start_paused = true)]
async fn retry_bound_is_max_retries_plus_one_calls() {
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::transient_error(),
    ));
    let invoker = invoker(&transport);

    let error = invoker
        .invoke(
            "agent-enrich",
            json!({"doc": 1}),
            InvokeOptions::default()
                .with_max_retries(2)
                .with_retry_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 3);
    match error {
        InvokeError::RetriesExhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, InvokeError::Transient { .. }));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_single_call() {
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::permanent_error(),
    ));
    let invoker = invoker(&transport);

    let error = invoker
        .invoke(
            "agent-validate",
            json!({}),
            InvokeOptions::default().with_max_retries(0),
        )
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 1);
    assert!(matches!(
        error.original_cause(),
        InvokeError::Permanent { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn timeout_settles_before_the_slow_call() {
    let transport = Arc::new(
        MockTransport::succeeding(json!({"ok": true})).with_latency(Duration::from_secs(60)),
    );
    let invoker = invoker(&transport);

    let started = Instant::now();
    let error = invoker
        .invoke(
            "agent-summarize",
            json!({}),
            InvokeOptions::default()
                .with_timeout(Duration::from_millis(100))
                .with_max_retries(0),
        )
        .await
        .unwrap_err();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(1), "waited for the slow call");
    match error.original_cause() {
        InvokeError::Timeout { timeout_ms, .. } => assert_eq!(*timeout_ms, 100),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_back_off_softer_than_permanent() {
    // Two failed attempts before exhaustion: delays base*1.5^0 + base*1.5^1
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::transient_error(),
    ));
    let started = Instant::now();
    let _ = invoker(&transport)
        .invoke(
            "agent-enrich",
            json!({}),
            InvokeOptions::default()
                .with_max_retries(2)
                .with_retry_delay(Duration::from_millis(1000)),
        )
        .await;
    let transient_elapsed = started.elapsed();
    assert!(transient_elapsed >= Duration::from_millis(2500));
    assert!(transient_elapsed < Duration::from_millis(2700));

    // Same budget, standard backoff: base*2^0 + base*2^1
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::permanent_error(),
    ));
    let started = Instant::now();
    let _ = invoker(&transport)
        .invoke(
            "agent-enrich",
            json!({}),
            InvokeOptions::default()
                .with_max_retries(2)
                .with_retry_delay(Duration::from_millis(1000)),
        )
        .await;
    let permanent_elapsed = started.elapsed();
    assert!(permanent_elapsed >= Duration::from_millis(3000));
    assert!(permanent_elapsed > transient_elapsed);
}

#[tokio::test(start_paused = true)]
async fn fallback_substitutes_after_exhaustion() {
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::transient_error(),
    ));
    let invoker = invoker(&transport);

    let result = invoker
        .invoke(
            "agent-tag",
            json!({}),
            InvokeOptions::default()
                .with_max_retries(1)
                .with_retry_delay(Duration::from_millis(10))
                .with_fallback(|| async { Ok(json!({"tags": [], "fallback": true})) }),
        )
        .await
        .unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(result["fallback"], json!(true));
}

#[tokio::test(start_paused = true)]
async fn fallback_failure_surfaces_the_original_cause() {
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::transient_error(),
    ));
    let invoker = invoker(&transport);

    let error = invoker
        .invoke(
            "agent-tag",
            json!({}),
            InvokeOptions::default()
                .with_max_retries(0)
                .with_fallback(|| async {
                    Err(InvokeError::Permanent {
                        function: "fallback".to_string(),
                        reason: "no cached tags".to_string(),
                        status: None,
                    })
                }),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        error.original_cause(),
        InvokeError::Transient { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn dedup_collapses_concurrent_identical_calls() {
    let transport = Arc::new(
        MockTransport::succeeding(json!({"entities": ["a"]}))
            .with_latency(Duration::from_millis(50)),
    );
    let invoker = invoker(&transport);

    let options = || InvokeOptions::default().with_dedup_key("doc-1:enrich");
    let (first, second) = tokio::join!(
        invoker.invoke("agent-enrich", json!({"doc": 1}), options()),
        invoker.invoke("agent-enrich", json!({"doc": 1}), options()),
    );

    assert_eq!(transport.calls(), 1);
    assert_eq!(first.unwrap(), second.unwrap());
}

#[tokio::test(start_paused = true)]
async fn dedup_serves_settled_result_within_window() {
    let transport = Arc::new(MockTransport::succeeding(json!({"n": 1})));
    let invoker = invoker(&transport);
    let options = || InvokeOptions::default().with_dedup_key("doc-2:enrich");

    let first = invoker
        .invoke("agent-enrich", json!({}), options())
        .await
        .unwrap();
    let second = invoker
        .invoke("agent-enrich", json!({}), options())
        .await
        .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn dedup_expires_after_the_window() {
    let transport = Arc::new(MockTransport::succeeding(json!({"n": 1})));
    let invoker = invoker(&transport);
    let options = || InvokeOptions::default().with_dedup_key("doc-3:enrich");

    invoker
        .invoke("agent-enrich", json!({}), options())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    invoker
        .invoke("agent-enrich", json!({}), options())
        .await
        .unwrap();

    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn distinct_dedup_keys_do_not_collapse() {
    let transport = Arc::new(MockTransport::succeeding(json!({"n": 1})));
    let invoker = invoker(&transport);

    invoker
        .invoke(
            "agent-enrich",
            json!({}),
            InvokeOptions::default().with_dedup_key("doc-a"),
        )
        .await
        .unwrap();
    invoker
        .invoke(
            "agent-enrich",
            json!({}),
            InvokeOptions::default().with_dedup_key("doc-b"),
        )
        .await
        .unwrap();

    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn terminal_failures_are_deduplicated_too() {
    let transport = Arc::new(MockTransport::always_failing(
        MockTransport::permanent_error(),
    ));
    let invoker = invoker(&transport);
    let options = || {
        InvokeOptions::default()
            .with_dedup_key("doc-4:validate")
            .with_max_retries(0)
    };

    let first = invoker.invoke("agent-validate", json!({}), options()).await;
    let second = invoker.invoke("agent-validate", json!({}), options()).await;

    assert_eq!(transport.calls(), 1);
    assert_eq!(first.unwrap_err(), second.unwrap_err());
}
