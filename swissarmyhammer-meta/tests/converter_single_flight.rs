//! Integration tests for the lazy converter loader
//!
//! These exercise `ConverterState::load()` under concurrency: callers racing
//! on the same state must share one loader invocation and one outcome, on
//! both the current-thread and the multi-thread runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use swissarmyhammer_meta::{ConvertFn, ConverterFunc, ConverterState, EditorRef, Loaded, Meta};
use tokio::sync::Notify;
use tracing_test::traced_test;

type LoadFuture = Pin<Box<dyn Future<Output = anyhow::Result<Loaded>> + Send>>;

/// Loader that counts invocations and resolves to `f` after a short delay.
fn counting_loader(
    calls: Arc<AtomicUsize>,
    f: ConvertFn,
) -> impl Fn(Option<Value>) -> LoadFuture + Send + Sync + 'static {
    move |_value: Option<Value>| {
        calls.fetch_add(1, Ordering::SeqCst);
        let f = f.clone();
        let future: LoadFuture = Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            anyhow::Ok(Loaded::Callable(f))
        });
        future
    }
}

fn identity_fn() -> ConvertFn {
    Arc::new(|v: Value| -> anyhow::Result<Value> { Ok(v) })
}

#[tokio::test]
async fn concurrent_loads_share_one_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let f = identity_fn();
    let state = ConverterState::with_loader(counting_loader(calls.clone(), f.clone()));

    let (a, b) = tokio::join!(state.load(None), state.load(None));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(a.as_fn().unwrap(), b.as_fn().unwrap()));
    assert!(Arc::ptr_eq(a.as_fn().unwrap(), &f));
    assert!(state.ready());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_loads_share_one_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let f = identity_fn();
    let state = Arc::new(ConverterState::with_loader(counting_loader(
        calls.clone(),
        f.clone(),
    )));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.load(None).await })
        })
        .collect();

    for handle in handles {
        let func = handle.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(func.as_fn().unwrap(), &f));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_claimant_does_not_restart_the_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let f = identity_fn();
    let state = ConverterState::with_loader(counting_loader(calls.clone(), f.clone()));

    let first = tokio::time::timeout(Duration::from_millis(2), state.load(None)).await;
    assert!(first.is_err());
    assert!(!state.ready());

    let func = state.load(None).await.unwrap();
    assert!(Arc::ptr_eq(func.as_fn().unwrap(), &f));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn state_is_pending_while_the_loader_runs() {
    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    let f = identity_fn();
    let state = Arc::new({
        let (gate, started, f) = (gate.clone(), started.clone(), f.clone());
        ConverterState::with_loader(move |_value: Option<Value>| {
            let (gate, started, f) = (gate.clone(), started.clone(), f.clone());
            async move {
                started.notify_one();
                gate.notified().await;
                anyhow::Ok(Loaded::Callable(f))
            }
        })
    });

    let pending = tokio::spawn({
        let state = state.clone();
        async move { state.load(None).await }
    });
    started.notified().await;

    assert!(!state.ready());
    assert!(matches!(state.func(), ConverterFunc::Absent));

    gate.notify_one();
    let func = pending.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(func.as_fn().unwrap(), &f));
    assert!(state.ready());
    assert!(matches!(state.func(), ConverterFunc::Ready(_)));
}

#[traced_test]
#[tokio::test]
async fn rejected_load_is_logged_and_permanent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let state = ConverterState::with_loader(move |_value: Option<Value>| {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err::<Loaded, _>(anyhow::anyhow!("chunk load timed out"))
        }
    });

    let (a, b) = tokio::join!(state.load(None), state.load(None));
    assert!(a.unwrap().is_broken());
    assert!(b.unwrap().is_broken());
    assert!(state.ready());
    assert!(matches!(state.func(), ConverterFunc::Broken));

    assert!(state.load(None).await.unwrap().is_broken());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(logs_contain("failed to load editor converter"));
    assert!(logs_contain("chunk load timed out"));
}

#[tokio::test]
async fn derived_metas_share_the_editor_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let editor = EditorRef::with_loader(
        "currency",
        counting_loader(
            calls.clone(),
            Arc::new(|v: Value| -> anyhow::Result<Value> { Ok(json!(format!("${v}"))) }),
        ),
    );
    let meta = Meta::default().with_editor(editor);
    let grouped = meta.with_category("pricing").with_description("amount");

    let first = meta.editor().unwrap().convert(json!(5)).await.unwrap();
    let second = grouped.editor().unwrap().convert(json!(7)).await.unwrap();

    assert_eq!(first, json!("$5"));
    assert_eq!(second, json!("$7"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn no_loader_resolves_immediately() {
    let state = ConverterState::new();
    let func = tokio_test::block_on(state.load(Some(json!("ignored")))).unwrap();
    assert!(matches!(func, ConverterFunc::Absent));
    assert!(state.ready());
}
