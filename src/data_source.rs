use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::align;
use crate::domain::{GenomicRange, Query};
use crate::error::SignalTableError;
use crate::events::{Notifier, Subscription};
use crate::model::{self, DEFAULT_VALUES_LABEL, DataArray, TabularModel};
use crate::range_query;
use crate::signal::{Aggregate, DEFAULT_BLOCK_SIZE_HINT, QueryLimits, SignalSourceFactory};
use crate::source::{SourceHandle, ValueBounds};

pub const DEFAULT_MAX_ITEMS: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceOptions {
    pub initial_query: Vec<Query>,
    pub relay: Option<String>,
    pub values_label: Option<String>,
    pub max_items: usize,
    pub aggregate: Aggregate,
}

impl Default for DataSourceOptions {
    fn default() -> Self {
        Self {
            initial_query: Vec::new(),
            relay: None,
            values_label: None,
            max_items: DEFAULT_MAX_ITEMS,
            aggregate: Aggregate::Max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Changing,
    Changed,
}

#[derive(Clone)]
pub struct DataSourceEvent {
    pub kind: ChangeKind,
    pub source: SignalDataSource,
}

/// Outcome of one scheduled readiness cycle.
pub type PendingCycle = BoxFuture<'static, Result<SignalDataSource, SignalTableError>>;

type Readiness = Shared<BoxFuture<'static, Result<(), SignalTableError>>>;
type BoxedListener = Box<dyn Fn(&DataSourceEvent) + Send + Sync>;

struct State {
    query: Vec<Query>,
    phase: Phase,
    model: Option<TabularModel>,
}

struct Inner {
    handles: Vec<SourceHandle>,
    labels: Vec<String>,
    values_label: String,
    limits: QueryLimits,
    aggregate: Aggregate,
    runtime: Handle,
    state: Mutex<State>,
    ready: Mutex<Readiness>,
    notifier: Notifier<DataSourceEvent>,
}

/// Collects locators, options and early listeners for a [`SignalDataSource`].
pub struct DataSourceBuilder {
    locators: Vec<String>,
    options: DataSourceOptions,
    listeners: Vec<BoxedListener>,
}

impl DataSourceBuilder {
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locators: locators.into_iter().map(Into::into).collect(),
            options: DataSourceOptions::default(),
            listeners: Vec::new(),
        }
    }

    pub fn options(mut self, options: DataSourceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn initial_query(mut self, queries: impl IntoIterator<Item = Query>) -> Self {
        self.options.initial_query = queries.into_iter().collect();
        self
    }

    pub fn relay(mut self, relay: impl Into<String>) -> Self {
        self.options.relay = Some(relay.into());
        self
    }

    pub fn values_label(mut self, label: impl Into<String>) -> Self {
        self.options.values_label = Some(label.into());
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.options.max_items = max_items;
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.options.aggregate = aggregate;
        self
    }

    /// Attaches a listener before the first cycle starts. The initial
    /// `Changing` is delivered only to these listeners, before `build`
    /// returns.
    pub fn subscribe<F>(mut self, listener: F) -> Self
    where
        F: Fn(&DataSourceEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Opens every locator and starts the initial readiness cycle in the
    /// background. Must be called from within a tokio runtime.
    pub fn build(
        self,
        factory: &dyn SignalSourceFactory,
    ) -> Result<SignalDataSource, SignalTableError> {
        if self.locators.is_empty() {
            return Err(SignalTableError::NoSources);
        }
        let runtime = Handle::try_current().map_err(|_| SignalTableError::NoRuntime)?;
        let relay = self.options.relay.as_deref();
        let handles = self
            .locators
            .iter()
            .map(|locator| SourceHandle::open(locator, relay, DEFAULT_BLOCK_SIZE_HINT, factory))
            .collect::<Result<Vec<_>, _>>()?;
        let labels = handles.iter().map(|h| h.label().to_string()).collect();

        let notifier = Notifier::new();
        for listener in self.listeners {
            notifier.subscribe(listener);
        }

        let settled: Readiness = futures::future::ready(Ok::<(), SignalTableError>(()))
            .boxed()
            .shared();
        let source = SignalDataSource {
            inner: Arc::new(Inner {
                handles,
                labels,
                values_label: self
                    .options
                    .values_label
                    .unwrap_or_else(|| DEFAULT_VALUES_LABEL.to_string()),
                limits: QueryLimits {
                    max_items: self.options.max_items,
                },
                aggregate: self.options.aggregate,
                runtime,
                state: Mutex::new(State {
                    query: self.options.initial_query.clone(),
                    phase: Phase::Loading,
                    model: None,
                }),
                ready: Mutex::new(settled),
                notifier,
            }),
        };

        // The first cycle is gated until the readiness slot holds it and
        // `Changing` has been delivered, so queries issued by listeners
        // queue behind it.
        let (start_tx, start_rx) = oneshot::channel::<()>();
        let this = source.clone();
        let queries = self.options.initial_query;
        let initial = source.spawn_cycle(async move {
            let _ = start_rx.await;
            this.fetch_and_commit(queries).await
        });
        *source.inner.ready.lock() = initial;
        source.announce_loading();
        let _ = start_tx.send(());

        Ok(source)
    }
}

/// Tabular view over several signal sources, re-queried on demand.
///
/// Cheap to clone; clones share state. Every cycle (construction or
/// [`apply_query`](Self::apply_query)) emits `Changing` when it starts and
/// `Changed` once its model is committed. Cycles run one at a time in the
/// order they were requested. A failed cycle leaves the data source not
/// ready and emits no `Changed`.
#[derive(Clone)]
pub struct SignalDataSource {
    inner: Arc<Inner>,
}

impl SignalDataSource {
    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().phase == Phase::Ready
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    /// Predicates of the last committed cycle (or the initial query).
    pub fn query(&self) -> Vec<Query> {
        self.inner.state.lock().query.clone()
    }

    pub fn range(&self) -> Result<GenomicRange, SignalTableError> {
        range_query::extract(&self.inner.state.lock().query)
    }

    pub fn labels(&self) -> &[String] {
        &self.inner.labels
    }

    pub fn locators(&self) -> impl Iterator<Item = &str> {
        self.inner.handles.iter().map(SourceHandle::locator)
    }

    pub fn model(&self) -> Option<TabularModel> {
        self.inner.state.lock().model.clone()
    }

    pub fn row_count(&self) -> Option<usize> {
        self.inner.state.lock().model.as_ref().map(|m| m.row_count)
    }

    pub fn column_count(&self) -> Option<usize> {
        self.inner.state.lock().model.as_ref().map(|m| m.column_count)
    }

    pub fn rows(&self) -> Option<Vec<DataArray>> {
        self.inner.state.lock().model.as_ref().map(|m| m.rows.clone())
    }

    pub fn columns(&self) -> Option<Vec<DataArray>> {
        self.inner.state.lock().model.as_ref().map(|m| m.columns.clone())
    }

    pub fn values(&self) -> Option<Vec<DataArray>> {
        self.inner.state.lock().model.as_ref().map(|m| m.values.clone())
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<DataSourceEvent>
    where
        F: Fn(&DataSourceEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(listener)
    }

    /// Settles with the most recently requested cycle.
    pub async fn ready(&self) -> Result<SignalDataSource, SignalTableError> {
        let readiness = self.inner.ready.lock().clone();
        readiness.await.map(|()| self.clone())
    }

    /// Re-runs fetch, alignment and model building for `queries`.
    ///
    /// The cycle is scheduled immediately and starts once every earlier
    /// cycle has settled; the returned future only reports its outcome.
    pub fn apply_query(&self, queries: impl IntoIterator<Item = Query>) -> PendingCycle {
        let queries: Vec<Query> = queries.into_iter().collect();
        let mut ready = self.inner.ready.lock();
        let previous = ready.clone();
        let this = self.clone();
        let readiness = self.spawn_cycle(async move {
            let _ = previous.await;
            this.inner.state.lock().phase = Phase::Loading;
            this.announce_loading();
            this.fetch_and_commit(queries).await
        });
        *ready = readiness.clone();
        drop(ready);

        let this = self.clone();
        async move { readiness.await.map(|()| this) }.boxed()
    }

    /// Parses a `chr:start-end` location and applies it as a query.
    pub fn apply_location(&self, location: &str) -> Result<PendingCycle, SignalTableError> {
        let range: GenomicRange = location.parse()?;
        Ok(self.apply_query(range.to_queries()))
    }

    /// Display boundaries spanning the summaries of every source.
    pub async fn value_bounds(&self) -> Result<ValueBounds, SignalTableError> {
        let bounds =
            futures::future::try_join_all(self.inner.handles.iter().map(|h| h.value_bounds()))
                .await?;
        bounds
            .into_iter()
            .reduce(ValueBounds::union)
            .ok_or(SignalTableError::NoSources)
    }

    fn spawn_cycle<F>(&self, cycle: F) -> Readiness
    where
        F: Future<Output = Result<(), SignalTableError>> + Send + 'static,
    {
        let task = self.inner.runtime.spawn(cycle);
        async move {
            task.await
                .map_err(|err| SignalTableError::CycleAborted(err.to_string()))
                .and_then(|result| result)
        }
        .boxed()
        .shared()
    }

    fn announce_loading(&self) {
        debug!(sources = self.inner.handles.len(), "readiness cycle started");
        self.notify(ChangeKind::Changing);
    }

    async fn fetch_and_commit(&self, queries: Vec<Query>) -> Result<(), SignalTableError> {
        let result = self.fetch(&queries).await;
        match result {
            Ok(model) => {
                let rows = model.row_count;
                {
                    let mut state = self.inner.state.lock();
                    state.query = queries;
                    state.model = Some(model);
                    state.phase = Phase::Ready;
                }
                debug!(rows, columns = self.inner.labels.len(), "readiness cycle committed");
                self.notify(ChangeKind::Changed);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "readiness cycle failed");
                Err(err)
            }
        }
    }

    async fn fetch(&self, queries: &[Query]) -> Result<TabularModel, SignalTableError> {
        let inner = &self.inner;
        let range = range_query::extract(queries)?;
        debug!(%range, max_items = inner.limits.max_items, "querying sources");
        let aligned = align::align(&inner.handles, &range, inner.limits, inner.aggregate).await?;
        model::build(
            &inner.labels,
            aligned.rows,
            aligned.per_source_values,
            &inner.values_label,
        )
    }

    fn notify(&self, kind: ChangeKind) {
        self.inner.notifier.emit(&DataSourceEvent {
            kind,
            source: self.clone(),
        });
    }
}

impl fmt::Debug for SignalDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalDataSource")
            .field("labels", &self.inner.labels)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
