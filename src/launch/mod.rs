//! Sizing, submitting and waiting for kernel launches.
//!
//! A [`Launcher`] wraps a [`Runtime`]. For each launch it sizes a [`Topology`] to cover the
//! requested extent, skips execution when the topology is empty, submits one bulk invocation,
//! and waits for it unless the launch is asynchronous.

use std::sync::Arc;

use derive_more::{Deref, Display};
use thiserror::Error;

use crate::{
    mapping::LaunchContext,
    topology::{Axis, Dim3, Limits, Sizing, Topology},
};

pub use counters::{CounterSnapshot, LaunchCounters};
pub use host::{Host, HostBuildError, HostBuilder};

pub mod counters;
pub mod host;

/// The body of a launch, invoked once per coordinate.
pub type Kernel = Arc<dyn Fn(&LaunchContext) + Send + Sync>;

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash, Deref)]
pub struct StreamId(uid::Id<StreamId>);

impl StreamId {
    #[inline]
    pub fn new() -> Self {
        Self(uid::Id::new())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("{0} groups along axis {1} exceed the limit of {2}")]
    Groups(usize, Axis, usize),
    #[error("{0} lanes along axis {1} exceed the limit of {2}")]
    Lanes(usize, Axis, usize),
    #[error("{0} lanes per group exceed the limit of {1}")]
    LanesPerGroup(usize, usize),
    #[error("{0} bytes of shared memory exceed the limit of {1}")]
    SharedMemory(usize, usize),
    #[error("runtime is closed")]
    Closed,
    #[error("kernel faulted on stream {0}: {1}")]
    Fault(StreamId, String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("launch rejected: {0}")]
    Rejected(#[source] RuntimeError),
    #[error("launch failed: {0}")]
    Faulted(#[source] RuntimeError),
}

/// Outcome of a successful [`Launcher::launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LaunchStatus {
    /// The topology had no coordinates; nothing was submitted.
    #[display("empty")]
    Empty,
    /// The launch was submitted and has not been waited for.
    #[display("submitted")]
    Submitted,
    /// The launch was submitted and has finished.
    #[display("complete")]
    Complete,
}

/// What a [`Runtime`] needs to run one bulk invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchParams {
    pub topology: Topology,
    /// Shared scratch memory per group, in bytes.
    pub shared_memory: usize,
}

impl LaunchParams {
    #[inline]
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            shared_memory: 0,
        }
    }
}

impl Limits {
    /// Checks launch parameters against the limits.
    pub fn check(&self, params: &LaunchParams) -> Result<(), RuntimeError> {
        let Topology { groups, lanes } = params.topology;
        for axis in Axis::ALL {
            if groups.get(axis) > self.groups.get(axis) {
                let err = RuntimeError::Groups(groups.get(axis), axis, self.groups.get(axis));
                return Err(err);
            }
            if lanes.get(axis) > self.lanes.get(axis) {
                let err = RuntimeError::Lanes(lanes.get(axis), axis, self.lanes.get(axis));
                return Err(err);
            }
        }
        if lanes.volume() > self.lanes_per_group {
            let err = RuntimeError::LanesPerGroup(lanes.volume(), self.lanes_per_group);
            return Err(err);
        }
        if params.shared_memory > self.shared_memory {
            let err = RuntimeError::SharedMemory(params.shared_memory, self.shared_memory);
            return Err(err);
        }
        Ok(())
    }
}

/// An execution backend that runs one kernel invocation per coordinate of a topology.
#[trait_variant::make(Send)]
pub trait Runtime {
    fn limits(&self) -> Limits;

    fn default_stream(&self) -> StreamId;

    /// Submits one bulk invocation of `kernel` to `stream`. Fails if the runtime rejects the
    /// configuration; nothing is retried.
    fn launch(
        &self,
        kernel: Kernel,
        params: LaunchParams,
        stream: StreamId,
    ) -> Result<(), RuntimeError>;

    /// Resolves when every launch submitted to `stream` so far has finished.
    async fn synchronize(&self, stream: StreamId) -> Result<(), RuntimeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    pub lanes: Dim3,
    pub sizing: Sizing,
    pub shared_memory: usize,
    /// Defaults to the runtime's default stream.
    pub stream: Option<StreamId>,
    /// Return [`LaunchStatus::Submitted`] without waiting.
    pub asynchronous: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            lanes: Dim3::new(256, 1, 1),
            sizing: Sizing::Direct,
            shared_memory: 0,
            stream: None,
            asynchronous: false,
        }
    }
}

impl LaunchOptions {
    pub fn lanes(mut self, lanes: impl Into<Dim3>) -> Self {
        self.lanes = lanes.into();
        self
    }

    pub fn sizing(mut self, sizing: Sizing) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn shared_memory(mut self, bytes: usize) -> Self {
        self.shared_memory = bytes;
        self
    }

    pub fn stream(mut self, stream: StreamId) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Launcher<R> {
    runtime: R,
    counters: Option<Arc<LaunchCounters>>,
}

impl<R: Runtime> Launcher<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            counters: None,
        }
    }

    /// Records launch statistics into `counters`.
    pub fn with_counters(mut self, counters: Arc<LaunchCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    #[inline]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Launches `body` over a topology sized by [`Topology::cover`] to cover `extent`.
    pub async fn launch<F>(
        &self,
        extent: impl Into<Dim3>,
        options: LaunchOptions,
        body: F,
    ) -> Result<LaunchStatus, LaunchError>
    where
        F: Fn(&LaunchContext) + Send + Sync + 'static,
    {
        let limits = self.runtime.limits();
        let topology = Topology::cover(extent, options.lanes, options.sizing, &limits);
        let params = LaunchParams {
            topology,
            shared_memory: options.shared_memory,
        };
        self.launch_topology(params, options, body).await
    }

    /// Launches `body` over the topology in `params`. Only the stream and asynchrony of
    /// `options` apply.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn launch_topology<F>(
        &self,
        params: LaunchParams,
        options: LaunchOptions,
        body: F,
    ) -> Result<LaunchStatus, LaunchError>
    where
        F: Fn(&LaunchContext) + Send + Sync + 'static,
    {
        let topology = params.topology;
        if !topology.is_viable() {
            log::debug!("skipped empty launch: {topology}");
            self.record(|counters| counters.empty());
            return Ok(LaunchStatus::Empty);
        }

        let stream = options
            .stream
            .unwrap_or_else(|| self.runtime.default_stream());
        let kernel: Kernel = Arc::new(body);
        if let Err(err) = self.runtime.launch(kernel, params, stream) {
            log::error!("rejected launch {topology}: {err}");
            self.record(|counters| counters.rejected());
            return Err(LaunchError::Rejected(err));
        }
        log::debug!("submitted launch {topology} to stream {stream}");
        self.record(|counters| counters.submitted(topology.volume()));

        match options.asynchronous {
            true => Ok(LaunchStatus::Submitted),
            false => {
                self.synchronize(stream).await?;
                Ok(LaunchStatus::Complete)
            }
        }
    }

    /// Waits for every launch submitted to `stream`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub async fn synchronize(&self, stream: StreamId) -> Result<(), LaunchError> {
        log::trace!("synchronizing stream {stream}");
        match self.runtime.synchronize(stream).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log::error!("{err}");
                self.record(|counters| counters.faulted());
                Err(LaunchError::Faulted(err))
            }
        }
    }

    #[inline]
    fn record(&self, f: impl FnOnce(&LaunchCounters)) {
        if let Some(counters) = &self.counters {
            f(counters)
        }
    }
}
