//! Strata filled by asynchronous metadata loads.
//!
//! A [`LoadableStratum`] pairs a [`StratumLoader`] with a model stratum. The
//! loader's synchronous `load` body is evaluated inside a computed, so a new
//! load cycle starts exactly once per change of whatever that body read. Each
//! cycle carries an epoch; completions from superseded cycles are dropped.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use runtime::{Computed, LocalExecutor, Observable, action};
use serde_json::Value;

use crate::error::ModelError;
use crate::model::Model;
use crate::strata::stratum_rank;
use crate::traits::TraitSchema;

/// A failed metadata load or apply. Cheap to clone so every awaiting caller
/// gets a copy.
#[derive(Debug, Clone)]
pub struct LoadError {
    pub message: String,
    pub source: Option<Rc<dyn Error>>,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Error + 'static) -> Self {
        Self {
            message: message.into(),
            source: Some(Rc::new(source)),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<ModelError> for LoadError {
    fn from(err: ModelError) -> Self {
        LoadError::with_source(err.to_string(), err)
    }
}

pub type LoadResult = Result<(), LoadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Applied,
    Failed,
}

/// The shared outcome of one load cycle.
///
/// Awaiting a promise never starts a load; it only waits for the cycle it
/// belongs to.
#[derive(Clone)]
pub struct LoadPromise {
    epoch: u64,
    future: Shared<LocalBoxFuture<'static, LoadResult>>,
}

impl LoadPromise {
    /// A promise that has already settled with `outcome`.
    pub fn settled(outcome: LoadResult) -> Self {
        let future = futures::future::ready(outcome).boxed_local().shared();
        // Polling once stores the outcome so `peek` sees it.
        let _ = future.clone().now_or_never();
        Self { epoch: 0, future }
    }

    fn rejected(epoch: u64, err: LoadError) -> Self {
        Self {
            epoch,
            ..Self::settled(Err(err))
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The outcome, once the cycle has settled.
    pub fn peek(&self) -> Option<LoadResult> {
        self.future.peek().cloned()
    }

    pub fn is_settled(&self) -> bool {
        self.future.peek().is_some()
    }
}

impl Future for LoadPromise {
    type Output = LoadResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadResult> {
        self.future.poll_unpin(cx)
    }
}

impl PartialEq for LoadPromise {
    fn eq(&self, other: &Self) -> bool {
        self.epoch == other.epoch && self.future.ptr_eq(&other.future)
    }
}

impl fmt::Debug for LoadPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadPromise")
            .field("epoch", &self.epoch)
            .field("outcome", &self.peek())
            .finish()
    }
}

/// Buffers the values a loader produces. Nothing reaches the model unless
/// the whole apply succeeds.
pub struct StratumWriter {
    schema: Rc<TraitSchema>,
    values: BTreeMap<String, Value>,
}

impl StratumWriter {
    fn new(schema: Rc<TraitSchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, trait_name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        if !self.schema.contains(trait_name) {
            return Err(ModelError::UnknownTrait {
                model_type: self.schema.type_name().to_string(),
                trait_name: trait_name.to_string(),
            });
        }
        self.values.insert(trait_name.to_string(), value.into());
        Ok(())
    }

    pub fn contains(&self, trait_name: &str) -> bool {
        self.schema.contains(trait_name)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }
}

/// Fetches metadata and translates it into trait values.
///
/// `load` must only read in its synchronous body: every reactive read there
/// decides when the next cycle starts. The returned future does the actual
/// work. `apply_load` runs in the same action that ends the cycle.
pub trait StratumLoader: 'static {
    type Output: 'static;

    fn load(&self) -> LocalBoxFuture<'static, Result<Self::Output, LoadError>>;

    fn apply_load(&self, output: Self::Output, writer: &mut StratumWriter) -> LoadResult;
}

/// Object-safe view of a [`LoadableStratum`].
pub trait Loadable {
    fn stratum_name(&self) -> &str;

    /// Starts a cycle if the loader's inputs changed since the current one,
    /// and returns the promise for the current cycle. Call from reactive
    /// getters only.
    fn load_if_needed(&self) -> LoadPromise;

    /// Like `load_if_needed`, for awaiting callers outside reactive code. A
    /// failed cycle is retried.
    fn load(&self) -> LoadPromise;

    /// Starts a fresh cycle even though no input changed.
    fn reload(&self) -> LoadPromise;

    fn is_loading(&self) -> bool;

    fn load_promise(&self) -> Option<LoadPromise>;

    fn last_error(&self) -> Option<LoadError>;

    fn state(&self) -> LoadState;
}

type PendingLoad<T> = Rc<RefCell<Option<LocalBoxFuture<'static, Result<T, LoadError>>>>>;

struct Cycle<T> {
    epoch: u64,
    future: PendingLoad<T>,
}

impl<T> Clone for Cycle<T> {
    fn clone(&self) -> Self {
        Self {
            epoch: self.epoch,
            future: self.future.clone(),
        }
    }
}

struct LoadableCore<L: StratumLoader> {
    model: Model,
    stratum: String,
    loader: Rc<L>,
    executor: Rc<dyn LocalExecutor>,
    trigger: Computed<Cycle<L::Output>>,
    reload_requests: Observable<u64>,
    is_loading: Observable<bool>,
    load_promise: Observable<Option<LoadPromise>>,
    last_error: Observable<Option<LoadError>>,
}

/// A model stratum owned by a loader.
pub struct LoadableStratum<L: StratumLoader>(Rc<LoadableCore<L>>);

impl<L: StratumLoader> Clone for LoadableStratum<L> {
    fn clone(&self) -> Self {
        LoadableStratum(self.0.clone())
    }
}

impl<L: StratumLoader> LoadableStratum<L> {
    /// Binds `loader` to `stratum` of `model`. The stratum name must already
    /// be known to the stratum order.
    pub fn new(
        model: Model,
        stratum: &str,
        loader: L,
        executor: Rc<dyn LocalExecutor>,
    ) -> Result<Self, ModelError> {
        stratum_rank(stratum)?;
        let name = format!("{}.{stratum}", model.unique_id());
        let loader = Rc::new(loader);
        let reload_requests = Observable::new(format!("{name}.reloadRequests"), 0u64);
        let epochs = Rc::new(Cell::new(0u64));
        let trigger = {
            let (loader, reload_requests) = (loader.clone(), reload_requests.clone());
            Computed::new(format!("{name}.trigger"), move || {
                reload_requests.get();
                let epoch = epochs.get() + 1;
                epochs.set(epoch);
                Cycle {
                    epoch,
                    future: Rc::new(RefCell::new(Some(loader.load()))),
                }
            })
        };
        Ok(LoadableStratum(Rc::new(LoadableCore {
            stratum: stratum.to_string(),
            loader,
            executor,
            trigger,
            reload_requests,
            is_loading: Observable::new(format!("{name}.isLoading"), false),
            load_promise: Observable::new(format!("{name}.loadPromise"), None),
            last_error: Observable::new(format!("{name}.lastError"), None),
            model,
        })))
    }

    pub fn model(&self) -> &Model {
        &self.0.model
    }

    pub fn loader(&self) -> &L {
        &self.0.loader
    }

    fn ensure(&self, retry_failed: bool) -> LoadPromise {
        let core = &self.0;
        action(|| {
            if retry_failed
                && !core.is_loading.get_untracked()
                && core.last_error.with_untracked(Option::is_some)
            {
                core.reload_requests.update(|n| *n += 1);
            }
            let cycle = core.trigger.get();
            if let Some(current) = core.load_promise.get_untracked()
                && current.epoch() == cycle.epoch
            {
                return current;
            }
            self.start(cycle)
        })
    }

    fn start(&self, cycle: Cycle<L::Output>) -> LoadPromise {
        let core = &self.0;
        let epoch = cycle.epoch;
        let Some(future) = cycle.future.borrow_mut().take() else {
            tracing::warn!(
                model = %core.model.unique_id(),
                stratum = %core.stratum,
                epoch,
                "load cycle was already started"
            );
            return LoadPromise::rejected(epoch, LoadError::new("load cycle was already started"));
        };

        let weak: Weak<LoadableCore<L>> = Rc::downgrade(core);
        let driver = async move {
            let outcome = future.await;
            match weak.upgrade() {
                Some(core) => core.finish(epoch, outcome),
                None => outcome.map(|_| ()),
            }
        }
        .boxed_local()
        .shared();
        let promise = LoadPromise {
            epoch,
            future: driver.clone(),
        };

        action(|| {
            core.is_loading.set(true);
            core.load_promise.replace(Some(promise.clone()));
        });
        tracing::debug!(
            model = %core.model.unique_id(),
            stratum = %core.stratum,
            epoch,
            "load started"
        );
        if let Err(err) = core.executor.spawn_local(driver.map(|_| ()).boxed_local()) {
            tracing::warn!(
                model = %core.model.unique_id(),
                stratum = %core.stratum,
                epoch,
                "could not start load: {err}"
            );
            let error = LoadError::with_source("could not start load", err);
            let rejected = LoadPromise::rejected(epoch, error.clone());
            action(|| {
                core.last_error.replace(Some(error));
                core.is_loading.set(false);
                core.load_promise.replace(Some(rejected.clone()));
            });
            return rejected;
        }
        promise
    }
}

impl<L: StratumLoader> LoadableCore<L> {
    fn finish(&self, epoch: u64, outcome: Result<L::Output, LoadError>) -> LoadResult {
        let current = self.load_promise.with_untracked(|p| p.as_ref().map(LoadPromise::epoch));
        if current != Some(epoch) {
            tracing::debug!(
                model = %self.model.unique_id(),
                stratum = %self.stratum,
                epoch,
                "discarding completion of a superseded load"
            );
            return outcome.map(|_| ());
        }

        action(|| {
            let applied = outcome.and_then(|output| {
                let mut writer = StratumWriter::new(self.model.schema().clone());
                self.loader.apply_load(output, &mut writer)?;
                Ok(writer.into_values())
            });
            let result = match applied {
                Ok(values) => {
                    tracing::debug!(
                        model = %self.model.unique_id(),
                        stratum = %self.stratum,
                        epoch,
                        traits = values.len(),
                        "load applied"
                    );
                    self.model.replace_stratum(&self.stratum, values);
                    Ok(())
                }
                Err(err) => {
                    tracing::warn!(
                        model = %self.model.unique_id(),
                        stratum = %self.stratum,
                        epoch,
                        "load failed: {err}"
                    );
                    Err(err)
                }
            };
            self.last_error.replace(result.as_ref().err().cloned());
            self.is_loading.set(false);
            result
        })
    }
}

impl<L: StratumLoader> Loadable for LoadableStratum<L> {
    fn stratum_name(&self) -> &str {
        &self.0.stratum
    }

    fn load_if_needed(&self) -> LoadPromise {
        debug_assert!(
            runtime::is_observing(),
            "load_if_needed called outside a reactive context"
        );
        self.ensure(false)
    }

    fn load(&self) -> LoadPromise {
        self.ensure(true)
    }

    fn reload(&self) -> LoadPromise {
        action(|| {
            self.0.reload_requests.update(|n| *n += 1);
            self.ensure(false)
        })
    }

    fn is_loading(&self) -> bool {
        self.0.is_loading.get()
    }

    fn load_promise(&self) -> Option<LoadPromise> {
        self.0.load_promise.get()
    }

    fn last_error(&self) -> Option<LoadError> {
        self.0.last_error.get()
    }

    fn state(&self) -> LoadState {
        if self.is_loading() {
            LoadState::Loading
        } else if self.0.last_error.with(Option::is_some) {
            LoadState::Failed
        } else if self.0.load_promise.with(Option::is_some) {
            LoadState::Applied
        } else {
            LoadState::Idle
        }
    }
}

impl<L: StratumLoader> fmt::Debug for LoadableStratum<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableStratum")
            .field("model", self.0.model.unique_id())
            .field("stratum", &self.0.stratum)
            .field("state", &runtime::untracked(|| self.state()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use futures::FutureExt;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use futures::future::LocalBoxFuture;
    use pretty_assertions::assert_eq;
    use runtime::{Observable, autorun};

    use super::{
        LoadError, LoadPromise, LoadResult, LoadState, Loadable, LoadableStratum, StratumLoader,
        StratumWriter,
    };
    use crate::model::Model;
    use crate::strata::{CommonStrata, register_source_stratum};
    use crate::traits::{imagery_schema, names};

    const METADATA: &str = "metadata";

    type Gate = oneshot::Sender<Result<String, LoadError>>;

    struct UrlLoader {
        url: Observable<String>,
        calls: Rc<Cell<usize>>,
        gates: Rc<RefCell<Vec<Option<Gate>>>>,
    }

    impl StratumLoader for UrlLoader {
        type Output = String;

        fn load(&self) -> LocalBoxFuture<'static, Result<String, LoadError>> {
            let url = self.url.get();
            self.calls.set(self.calls.get() + 1);
            let (tx, rx) = oneshot::channel();
            self.gates.borrow_mut().push(Some(tx));
            async move {
                let body = rx.await.map_err(|_| LoadError::new("gate dropped"))??;
                Ok(format!("{url}:{body}"))
            }
            .boxed_local()
        }

        fn apply_load(&self, output: String, writer: &mut StratumWriter) -> LoadResult {
            writer.set(names::NAME, output.clone())?;
            if output.ends_with("bad-apply") {
                return Err(LoadError::new("could not apply"));
            }
            writer.set(names::DESCRIPTION, "loaded")?;
            Ok(())
        }
    }

    /// Reads its url from the model it loads into.
    struct ModelUrlLoader {
        model: Model,
        calls: Rc<Cell<usize>>,
    }

    impl StratumLoader for ModelUrlLoader {
        type Output = String;

        fn load(&self) -> LocalBoxFuture<'static, Result<String, LoadError>> {
            let url = self.model.get::<String>(names::URL);
            self.calls.set(self.calls.get() + 1);
            futures::future::ready(url.ok_or_else(|| LoadError::new("no url"))).boxed_local()
        }

        fn apply_load(&self, output: String, writer: &mut StratumWriter) -> LoadResult {
            writer.set(names::NAME, output)?;
            Ok(())
        }
    }

    struct Fixture {
        pool: LocalPool,
        model: Model,
        url: Observable<String>,
        calls: Rc<Cell<usize>>,
        gates: Rc<RefCell<Vec<Option<Gate>>>>,
        stratum: LoadableStratum<UrlLoader>,
    }

    impl Fixture {
        fn new() -> Self {
            register_source_stratum(METADATA).unwrap();
            let pool = LocalPool::new();
            let model = Model::new("item", Rc::new(imagery_schema()));
            let url = Observable::new("url", "http://a".to_string());
            let calls = Rc::new(Cell::new(0));
            let gates = Rc::new(RefCell::new(Vec::new()));
            let loader = UrlLoader {
                url: url.clone(),
                calls: calls.clone(),
                gates: gates.clone(),
            };
            let stratum =
                LoadableStratum::new(model.clone(), METADATA, loader, Rc::new(pool.spawner()))
                    .unwrap();
            Self {
                pool,
                model,
                url,
                calls,
                gates,
                stratum,
            }
        }

        fn release(&mut self, index: usize, body: Result<&str, &str>) {
            let gate = self.gates.borrow_mut()[index].take().unwrap();
            let _ = gate.send(body.map(str::to_string).map_err(LoadError::new));
            self.pool.run_until_stalled();
        }

        fn name(&self) -> Option<String> {
            self.model.get::<String>(names::NAME)
        }

        /// A reactive getter that triggers the load, like `map_items` does.
        fn observe(&self) -> runtime::ReactionHandle {
            let stratum = self.stratum.clone();
            autorun("getter", move || {
                stratum.load_if_needed();
            })
        }
    }

    #[test]
    fn one_load_per_evaluation() {
        let f = Fixture::new();
        let promises = Rc::new(RefCell::new(Vec::new()));
        let _handle = {
            let (stratum, promises) = (f.stratum.clone(), promises.clone());
            autorun("getter", move || {
                let a = stratum.load_if_needed();
                let b = stratum.load_if_needed();
                promises.borrow_mut().push((a, b));
            })
        };
        assert_eq!(f.calls.get(), 1);
        let promises = promises.borrow();
        assert_eq!(promises.len(), 1);
        assert_eq!(promises[0].0, promises[0].1);
    }

    #[test]
    fn observing_state_never_loads() {
        let f = Fixture::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _handle = {
            let (stratum, seen) = (f.stratum.clone(), seen.clone());
            autorun("status", move || {
                seen.borrow_mut().push((
                    stratum.is_loading(),
                    stratum.load_promise().is_some(),
                    stratum.state(),
                ));
            })
        };
        assert_eq!(f.calls.get(), 0);
        assert_eq!(*seen.borrow(), vec![(false, false, LoadState::Idle)]);
    }

    #[test]
    fn input_change_loads_once_more_and_applies() {
        let mut f = Fixture::new();
        let _getter = f.observe();
        assert_eq!(f.calls.get(), 1);
        assert_eq!(f.stratum.state(), LoadState::Loading);

        f.release(0, Ok("one"));
        assert_eq!(f.name().as_deref(), Some("http://a:one"));
        assert_eq!(f.stratum.state(), LoadState::Applied);

        f.url.set("http://b".to_string());
        assert_eq!(f.calls.get(), 2);
        assert!(f.stratum.is_loading());
        // The previous values stay visible while the new cycle runs.
        assert_eq!(f.name().as_deref(), Some("http://a:one"));

        f.release(1, Ok("two"));
        assert_eq!(f.calls.get(), 2);
        assert_eq!(f.name().as_deref(), Some("http://b:two"));
        assert_eq!(f.model.get::<String>(names::DESCRIPTION).as_deref(), Some("loaded"));
    }

    #[test]
    fn failures_keep_the_last_good_values() {
        let mut f = Fixture::new();
        let _getter = f.observe();
        f.release(0, Ok("one"));

        f.url.set("http://b".to_string());
        let promise = f.stratum.load_promise().unwrap();
        f.release(1, Err("timeout"));

        assert_eq!(f.name().as_deref(), Some("http://a:one"));
        assert_eq!(f.stratum.state(), LoadState::Failed);
        assert!(!f.stratum.is_loading());
        assert_eq!(f.stratum.last_error().unwrap().message, "timeout");
        assert_eq!(promise.peek().unwrap().unwrap_err().message, "timeout");

        // Reactive getters do not retry on their own; awaiting callers do.
        assert_eq!(f.calls.get(), 2);
        let retry = f.stratum.load();
        assert_eq!(f.calls.get(), 3);
        f.release(2, Ok("again"));
        assert!(retry.peek().is_some_and(|r| r.is_ok()));
        assert_eq!(f.name().as_deref(), Some("http://b:again"));
        assert_eq!(f.stratum.state(), LoadState::Applied);
        assert!(f.stratum.last_error().is_none());
    }

    #[test]
    fn failing_apply_commits_nothing() {
        let mut f = Fixture::new();
        let _getter = f.observe();
        f.release(0, Ok("bad-apply"));
        assert_eq!(f.name(), None);
        assert_eq!(f.model.get_trait(METADATA, names::NAME), None);
        assert_eq!(f.stratum.state(), LoadState::Failed);
    }

    #[test]
    fn superseded_completions_are_discarded() {
        let mut f = Fixture::new();
        let first = f.stratum.load();
        f.url.set("http://b".to_string());
        let second = f.stratum.load();
        assert_ne!(first.epoch(), second.epoch());

        f.release(0, Ok("old"));
        assert_eq!(f.name(), None);
        assert!(f.stratum.is_loading());
        assert!(first.peek().unwrap().is_ok());

        f.release(1, Ok("new"));
        assert_eq!(f.name().as_deref(), Some("http://b:new"));
        assert!(!f.stratum.is_loading());
    }

    #[test]
    fn late_completion_of_an_old_cycle_does_not_overwrite() {
        let mut f = Fixture::new();
        f.stratum.load();
        f.url.set("http://b".to_string());
        f.stratum.load();

        f.release(1, Ok("new"));
        f.release(0, Ok("old"));
        assert_eq!(f.name().as_deref(), Some("http://b:new"));
        assert_eq!(f.stratum.state(), LoadState::Applied);
    }

    #[test]
    fn loading_flag_and_promise_change_together() {
        let mut f = Fixture::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _status = {
            let (stratum, seen) = (f.stratum.clone(), seen.clone());
            autorun("status", move || {
                let promise = stratum.load_promise();
                seen.borrow_mut().push((
                    stratum.is_loading(),
                    promise.as_ref().is_some_and(|p| p.is_settled()),
                ));
            })
        };

        f.stratum.load();
        f.release(0, Ok("one"));
        f.url.set("http://b".to_string());
        f.stratum.load();
        f.release(1, Ok("two"));

        assert_eq!(seen.borrow().iter().filter(|(loading, _)| *loading).count(), 2);
        assert!(seen.borrow().iter().all(|(loading, settled)| !(*loading && *settled)));
    }

    #[test]
    fn reload_starts_a_fresh_cycle() {
        let mut f = Fixture::new();
        let _getter = f.observe();
        f.release(0, Ok("one"));
        assert_eq!(f.stratum.load(), f.stratum.load_promise().unwrap());
        assert_eq!(f.calls.get(), 1);

        let reloaded = f.stratum.reload();
        assert_eq!(f.calls.get(), 2);
        f.release(1, Ok("two"));
        assert!(reloaded.peek().is_some_and(|r| r.is_ok()));
        assert_eq!(f.name().as_deref(), Some("http://a:two"));
    }

    #[test]
    fn awaiting_callers_get_the_outcome() {
        let mut f = Fixture::new();
        let promise = f.stratum.load();
        let _ = f.gates.borrow_mut()[0]
            .take()
            .unwrap()
            .send(Ok("body".to_string()));
        let outcome = f.pool.run_until(promise);
        assert!(outcome.is_ok());
        assert_eq!(f.name().as_deref(), Some("http://a:body"));
    }

    #[test]
    fn unrelated_writes_do_not_restart_loads() {
        register_source_stratum(METADATA).unwrap();
        let mut pool = LocalPool::new();
        let model = Model::new("reader", Rc::new(imagery_schema()));
        model
            .set_trait(CommonStrata::DEFINITION, names::URL, "http://a")
            .unwrap();
        let calls = Rc::new(Cell::new(0));
        let loader = ModelUrlLoader {
            model: model.clone(),
            calls: calls.clone(),
        };
        let stratum =
            LoadableStratum::new(model.clone(), METADATA, loader, Rc::new(pool.spawner()))
                .unwrap();
        let _getter = {
            let stratum = stratum.clone();
            autorun("getter", move || {
                stratum.load_if_needed();
            })
        };

        pool.run_until_stalled();
        assert_eq!(calls.get(), 1);
        assert_eq!(model.get::<String>(names::NAME).as_deref(), Some("http://a"));
        assert_eq!(stratum.state(), LoadState::Applied);

        model.set_trait(CommonStrata::USER, names::OPACITY, 0.5).unwrap();
        pool.run_until_stalled();
        assert_eq!(calls.get(), 1);

        model.set_trait(CommonStrata::USER, names::URL, "http://b").unwrap();
        pool.run_until_stalled();
        assert_eq!(calls.get(), 2);
        assert_eq!(model.get::<String>(names::NAME).as_deref(), Some("http://b"));
    }

    #[test]
    fn refused_spawns_settle_as_failed() {
        let f = Fixture::new();
        let loader = UrlLoader {
            url: f.url.clone(),
            calls: f.calls.clone(),
            gates: f.gates.clone(),
        };
        let spawner = LocalPool::new().spawner();
        let stratum =
            LoadableStratum::new(f.model.clone(), METADATA, loader, Rc::new(spawner)).unwrap();

        let promise = stratum.load();
        assert!(promise.is_settled());
        assert_eq!(promise.peek().unwrap().unwrap_err().message, "could not start load");
        assert_eq!(stratum.state(), LoadState::Failed);
        assert!(!stratum.is_loading());
        assert_eq!(stratum.load_promise(), Some(promise));
    }

    #[test]
    fn unknown_strata_are_rejected_up_front() {
        let f = Fixture::new();
        let loader = UrlLoader {
            url: f.url.clone(),
            calls: f.calls.clone(),
            gates: f.gates.clone(),
        };
        let result = LoadableStratum::new(
            f.model.clone(),
            "nowhere",
            loader,
            Rc::new(f.pool.spawner()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn settled_promises_are_ready_immediately() {
        let ok = LoadPromise::settled(Ok(()));
        assert!(ok.is_settled());
        assert!(ok.peek().is_some_and(|r| r.is_ok()));
        let failed = LoadPromise::settled(Err(LoadError::new("nope")));
        assert_eq!(failed.peek().unwrap().unwrap_err().to_string(), "nope");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "outside a reactive context")]
    fn load_if_needed_requires_a_reactive_context() {
        let f = Fixture::new();
        f.stratum.load_if_needed();
    }
}
