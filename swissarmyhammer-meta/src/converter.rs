//! Lazy, single-flight loading of editor value converters.
//!
//! An editor binding may reference a conversion function that lives behind an
//! asynchronous loader (a plugin module, a remote bundle, ...). The loader is
//! invoked at most once per [`ConverterState`]; every caller observes the same
//! outcome, either the resolved function or the permanently broken state.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, OnceCell};
use tracing::{debug, error, warn, Instrument};

use crate::error::{MetaError, Result};

/// A resolved value conversion function.
pub type ConvertFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Name of the module export used when a loader resolves to a module.
pub const DEFAULT_EXPORT: &str = "default";

/// What a loader resolved to.
#[derive(Clone)]
pub enum Loaded {
    /// A conversion function, usable directly.
    Callable(ConvertFn),
    /// A module; its `default` export must be callable.
    Module(BTreeMap<String, Export>),
    /// Anything else. Always rejected.
    Value(Value),
}

/// A single named export of a loaded module.
#[derive(Clone)]
pub enum Export {
    Callable(ConvertFn),
    Value(Value),
}

impl Loaded {
    /// Wrap a closure as a directly callable result.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Loaded::Callable(Arc::new(f))
    }

    /// A module whose `default` export is `f`.
    pub fn module_with_default(f: ConvertFn) -> Self {
        let mut exports = BTreeMap::new();
        exports.insert(DEFAULT_EXPORT.to_string(), Export::Callable(f));
        Loaded::Module(exports)
    }

    fn describe(&self) -> String {
        match self {
            Loaded::Callable(_) => "function".to_string(),
            Loaded::Module(exports) => {
                let names: Vec<&str> = exports.keys().map(String::as_str).collect();
                format!("module {{ {} }}", names.join(", "))
            }
            Loaded::Value(value) => value.to_string(),
        }
    }

    fn into_callable(self) -> Result<ConvertFn> {
        let found = self.describe();
        match self {
            Loaded::Callable(f) => Ok(f),
            Loaded::Module(mut exports) => match exports.remove(DEFAULT_EXPORT) {
                Some(Export::Callable(f)) => Ok(f),
                _ => Err(MetaError::ConverterFormat { found }),
            },
            Loaded::Value(_) => Err(MetaError::ConverterFormat { found }),
        }
    }
}

impl fmt::Debug for Loaded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Externally supplied fetcher for a converter.
///
/// How the converter is located (module resolution, network, ...) and any
/// timeout policy belong to the implementation.
#[async_trait]
pub trait ConverterLoader: Send + Sync {
    async fn load(&self, value: Option<Value>) -> anyhow::Result<Loaded>;
}

#[async_trait]
impl<F, Fut> ConverterLoader for F
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Loaded>> + Send + 'static,
{
    async fn load(&self, value: Option<Value>) -> anyhow::Result<Loaded> {
        (self)(value).await
    }
}

/// Observable state of the converter slot.
#[derive(Clone)]
pub enum ConverterFunc {
    /// Not attempted yet, or no loader configured.
    Absent,
    Ready(ConvertFn),
    /// The one load attempt failed. Never reverts.
    Broken,
}

impl ConverterFunc {
    /// Whether the single load attempt failed.
    pub fn is_broken(&self) -> bool {
        matches!(self, ConverterFunc::Broken)
    }

    /// The resolved function, if ready.
    pub fn as_fn(&self) -> Option<&ConvertFn> {
        match self {
            ConverterFunc::Ready(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Debug for ConverterFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterFunc::Absent => f.write_str("Absent"),
            ConverterFunc::Ready(_) => f.write_str("Ready(<fn>)"),
            ConverterFunc::Broken => f.write_str("Broken"),
        }
    }
}

enum Resolved {
    Ready(ConvertFn),
    /// `unusable` carries the description of a result that was not a function.
    Broken { unusable: Option<String> },
}

impl From<&Resolved> for ConverterFunc {
    fn from(resolved: &Resolved) -> Self {
        match resolved {
            Resolved::Ready(f) => ConverterFunc::Ready(f.clone()),
            Resolved::Broken { .. } => ConverterFunc::Broken,
        }
    }
}

/// Outcome cell shared with the task that runs the loader.
struct Slot {
    func: OnceCell<Resolved>,
    settled: Notify,
}

/// Loader plus the memoized outcome of its single invocation.
///
/// The first caller claims the attempt and hands the loader to a spawned
/// task, so the attempt runs to completion even if that caller is dropped.
/// Every caller, the claimant included, waits on the shared slot. A failed
/// state is terminal; build a fresh state to retry.
pub struct ConverterState {
    loader: Option<Arc<dyn ConverterLoader>>,
    claimed: AtomicBool,
    slot: Arc<Slot>,
}

impl ConverterState {
    fn from_parts(loader: Option<Arc<dyn ConverterLoader>>, func: OnceCell<Resolved>) -> Self {
        Self {
            loader,
            claimed: AtomicBool::new(false),
            slot: Arc::new(Slot {
                func,
                settled: Notify::new(),
            }),
        }
    }

    /// A state with no loader. Always ready, `load()` yields `Absent`.
    pub fn new() -> Self {
        Self::from_parts(None, OnceCell::new())
    }

    /// A state whose converter is fetched by `loader` on first `load()`.
    pub fn with_loader(loader: impl ConverterLoader + 'static) -> Self {
        Self::from_parts(Some(Arc::new(loader)), OnceCell::new())
    }

    /// A state whose converter is already known.
    pub fn resolved(f: ConvertFn) -> Self {
        Self::from_parts(None, OnceCell::new_with(Some(Resolved::Ready(f))))
    }

    /// Whether a loader was configured.
    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// True when no loader is set or the single attempt has settled.
    pub fn ready(&self) -> bool {
        self.loader.is_none() || self.slot.func.initialized()
    }

    /// Current slot contents without triggering a load.
    pub fn func(&self) -> ConverterFunc {
        self.slot
            .func
            .get()
            .map(ConverterFunc::from)
            .unwrap_or(ConverterFunc::Absent)
    }

    /// Resolve the converter, invoking the loader at most once.
    ///
    /// A loader rejection is logged and leaves the state `Broken`; it is never
    /// returned as an error. A loader that resolves to something other than a
    /// function or a module with a callable `default` export also leaves the
    /// state `Broken`, and the caller that claimed the attempt receives
    /// [`MetaError::ConverterFormat`].
    ///
    /// Must be called from within a tokio runtime when a loader is set.
    pub async fn load(&self, value: Option<Value>) -> Result<ConverterFunc> {
        let Some(loader) = self.loader.as_ref() else {
            return Ok(self.func());
        };
        if let Some(resolved) = self.slot.func.get() {
            return Ok(resolved.into());
        }

        let claimant = !self.claimed.swap(true, Ordering::AcqRel);
        if claimant {
            spawn_attempt(loader.clone(), self.slot.clone(), value);
        }

        let resolved = self.settled().await;
        match resolved {
            Resolved::Broken {
                unusable: Some(found),
            } if claimant => Err(MetaError::ConverterFormat {
                found: found.clone(),
            }),
            resolved => Ok(resolved.into()),
        }
    }

    async fn settled(&self) -> &Resolved {
        loop {
            let notified = self.slot.settled.notified();
            if let Some(resolved) = self.slot.func.get() {
                return resolved;
            }
            notified.await;
        }
    }
}

/// Run the loader on its own task and publish the outcome into `slot`.
///
/// The loader runs in a nested task so a panic inside it still settles the
/// slot as broken.
fn spawn_attempt(loader: Arc<dyn ConverterLoader>, slot: Arc<Slot>, value: Option<Value>) {
    let attempt = tokio::spawn(async move { loader.load(value).await }.in_current_span());
    tokio::spawn(
        async move {
            debug!("loading editor converter");
            let resolved = match attempt.await {
                Ok(Ok(loaded)) => match loaded.into_callable() {
                    Ok(f) => Resolved::Ready(f),
                    Err(err) => {
                        warn!(%err, "converter loader returned an unusable result");
                        let unusable = match err {
                            MetaError::ConverterFormat { found } => Some(found),
                            _ => None,
                        };
                        Resolved::Broken { unusable }
                    }
                },
                Ok(Err(err)) => {
                    error!(error = %err, "failed to load editor converter");
                    Resolved::Broken { unusable: None }
                }
                Err(err) => {
                    error!(error = %err, "editor converter loader panicked");
                    Resolved::Broken { unusable: None }
                }
            };
            let _ = slot.func.set(resolved);
            slot.settled.notify_waiters();
        }
        .in_current_span(),
    );
}

impl Default for ConverterState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterState")
            .field("loader", &self.loader.is_some())
            .field("func", &self.func())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn upper() -> ConvertFn {
        Arc::new(|v: Value| -> anyhow::Result<Value> {
            Ok(json!(v.as_str().unwrap_or_default().to_uppercase()))
        })
    }

    #[tokio::test]
    async fn no_loader_is_ready_and_absent() {
        let state = ConverterState::new();
        assert!(state.ready());
        let func = state.load(None).await.unwrap();
        assert!(matches!(func, ConverterFunc::Absent));
        assert!(matches!(state.func(), ConverterFunc::Absent));
    }

    #[tokio::test]
    async fn pre_resolved_state_returns_function() {
        let f = upper();
        let state = ConverterState::resolved(f.clone());
        assert!(state.ready());
        let func = state.load(None).await.unwrap();
        assert!(Arc::ptr_eq(func.as_fn().unwrap(), &f));
    }

    #[tokio::test]
    async fn direct_callable_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let state = ConverterState::with_loader(move |_value: Option<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(Loaded::callable(|v| Ok(v))) }
        });
        assert!(!state.ready());

        let first = state.load(None).await.unwrap();
        let second = state.load(None).await.unwrap();
        assert!(state.ready());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(first.as_fn().unwrap(), second.as_fn().unwrap()));
    }

    #[tokio::test]
    async fn module_default_export_is_unwrapped() {
        let f = upper();
        let exported = f.clone();
        let state = ConverterState::with_loader(move |_value: Option<Value>| {
            let module = Loaded::module_with_default(exported.clone());
            async move { anyhow::Ok(module) }
        });
        let func = state.load(None).await.unwrap();
        let resolved = func.as_fn().unwrap();
        assert!(Arc::ptr_eq(resolved, &f));
        assert_eq!(resolved(json!("abc")).unwrap(), json!("ABC"));
    }

    #[tokio::test]
    async fn loader_receives_value() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        let state = ConverterState::with_loader(move |value: Option<Value>| {
            *sink.lock().unwrap() = value;
            async { anyhow::Ok(Loaded::callable(|v| Ok(v))) }
        });
        state.load(Some(json!({"locale": "fr"}))).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(json!({"locale": "fr"})));
    }

    #[tokio::test]
    async fn module_without_default_is_format_error() {
        let state = ConverterState::with_loader(|_value: Option<Value>| async {
            let mut exports = BTreeMap::new();
            exports.insert("parse".to_string(), Export::Value(json!(1)));
            anyhow::Ok(Loaded::Module(exports))
        });
        let err = state.load(None).await.unwrap_err();
        match err {
            MetaError::ConverterFormat { found } => assert_eq!(found, "module { parse }"),
            other => panic!("expected ConverterFormat, got {other:?}"),
        }
        assert!(state.ready());
        assert!(state.func().is_broken());
    }

    #[tokio::test]
    async fn plain_value_is_format_error_and_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let state = ConverterState::with_loader(move |_value: Option<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(Loaded::Value(json!(42))) }
        });
        assert!(matches!(
            state.load(None).await,
            Err(MetaError::ConverterFormat { .. })
        ));
        let again = state.load(None).await.unwrap();
        assert!(again.is_broken());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_is_swallowed_and_permanent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let state = ConverterState::with_loader(move |_value: Option<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<Loaded, _>(anyhow::anyhow!("bundle unavailable")) }
        });
        let func = state.load(None).await.unwrap();
        assert!(func.is_broken());
        assert!(state.ready());
        assert!(state.load(None).await.unwrap().is_broken());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_loader_leaves_state_broken() {
        let state = ConverterState::with_loader(|_value: Option<Value>| async {
            if true {
                panic!("loader exploded");
            }
            anyhow::Ok(Loaded::Value(Value::Null))
        });
        assert!(state.load(None).await.unwrap().is_broken());
        assert!(state.ready());
    }

    #[test]
    fn debug_does_not_expose_closures() {
        let state = ConverterState::resolved(upper());
        assert_eq!(
            format!("{state:?}"),
            "ConverterState { loader: false, func: Ready(<fn>) }"
        );
    }
}
