use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use derive_more::Display;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use super::{Kernel, LaunchParams, Runtime, RuntimeError, StreamId};
use crate::{
    mapping::LaunchContext,
    platform,
    topology::{Coord, Dim3, Limits},
};

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(uid::Id<HostId>);

pub enum HostEvent {
    Launch {
        stream: StreamId,
        kernel: Kernel,
        params: LaunchParams,
    },
    Synchronize {
        stream: StreamId,
        sender: flume::Sender<Result<(), RuntimeError>>,
    },
    Destroy {
        stream: StreamId,
        sender: flume::Sender<Result<(), RuntimeError>>,
    },
}

impl HostEvent {
    #[inline]
    fn stream(&self) -> StreamId {
        match self {
            HostEvent::Launch { stream, .. }
            | HostEvent::Synchronize { stream, .. }
            | HostEvent::Destroy { stream, .. } => *stream,
        }
    }
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { stream, params, .. } => f
                .debug_struct("Launch")
                .field("stream", stream)
                .field("params", params)
                .finish_non_exhaustive(),
            Self::Synchronize { stream, .. } => f
                .debug_struct("Synchronize")
                .field("stream", stream)
                .finish_non_exhaustive(),
            Self::Destroy { stream, .. } => f
                .debug_struct("Destroy")
                .field("stream", stream)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
struct Backend {
    /// Runs the groups of a launch in parallel.
    #[cfg(feature = "rayon")]
    pool: Arc<rayon::ThreadPool>,
    /// Number of running stream workers.
    workers: Arc<AtomicUsize>,
}

impl Backend {
    /// Runs `kernel` once per coordinate; lanes of one group run in order on one worker.
    fn execute(&self, kernel: &Kernel, params: LaunchParams) {
        let LaunchParams {
            topology,
            shared_memory,
        } = params;
        let run = |group: Dim3| {
            for lane in topology.lanes.points() {
                let coord = Coord { group, lane };
                let ctx = LaunchContext::new(topology, coord).with_shared_memory(shared_memory);
                kernel(&ctx);
            }
        };

        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            let groups: Vec<_> = topology.groups.points().collect();
            self.pool.install(|| groups.into_par_iter().for_each(run));
        }
        #[cfg(not(feature = "rayon"))]
        topology.groups.points().for_each(run);
    }
}

/// Executes kernels on the host, one worker task per stream.
#[derive(Debug, Clone)]
pub struct Host {
    /// The unique identifier of the runtime.
    id: HostId,
    limits: Limits,
    stream: StreamId,
    /// Sends launches and synchronization requests to the workers.
    sender: flume::Sender<HostEvent>,
    workers: Arc<AtomicUsize>,
}

impl Host {
    #[inline]
    pub fn id(&self) -> HostId {
        self.id
    }

    /// Creates a stream independent of every other stream of this runtime.
    #[inline]
    pub fn create_stream(&self) -> StreamId {
        StreamId::new()
    }

    /// Waits for the launches queued on `stream`, then stops its worker. Reports a fault not
    /// yet reported by a synchronization. Using the stream again starts a new worker.
    pub async fn destroy_stream(&self, stream: StreamId) -> Result<(), RuntimeError> {
        let (sender, receiver) = flume::bounded(1);
        let event = HostEvent::Destroy { stream, sender };
        self.sender
            .send_async(event)
            .await
            .map_err(|_| RuntimeError::Closed)?;
        receiver
            .recv_async()
            .await
            .map_err(|_| RuntimeError::Closed)?
    }

    /// Number of streams that currently have a running worker.
    #[inline]
    pub fn open_streams(&self) -> usize {
        self.workers.load(Ordering::Acquire)
    }
}

impl Runtime for Host {
    #[inline]
    fn limits(&self) -> Limits {
        self.limits
    }

    #[inline]
    fn default_stream(&self) -> StreamId {
        self.stream
    }

    fn launch(
        &self,
        kernel: Kernel,
        params: LaunchParams,
        stream: StreamId,
    ) -> Result<(), RuntimeError> {
        self.limits.check(&params)?;
        let event = HostEvent::Launch {
            stream,
            kernel,
            params,
        };
        self.sender.send(event).map_err(|_| RuntimeError::Closed)
    }

    async fn synchronize(&self, stream: StreamId) -> Result<(), RuntimeError> {
        let (sender, receiver) = flume::bounded(1);
        let event = HostEvent::Synchronize { stream, sender };
        self.sender
            .send_async(event)
            .await
            .map_err(|_| RuntimeError::Closed)?;
        receiver
            .recv_async()
            .await
            .map_err(|_| RuntimeError::Closed)?
    }
}

#[derive(Debug, Default, Clone)]
pub struct HostBuilder {
    pub limits: Limits,
    /// Worker threads for group parallelism; defaults to one per core.
    pub threads: Option<usize>,
}

#[derive(Debug, Error)]
pub enum HostBuildError {
    #[error("thread count must be positive")]
    Threads,
    #[cfg(feature = "rayon")]
    #[error("failed to build thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl HostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Starts the runtime. Must be called within a `tokio` runtime.
    pub async fn build(self) -> Result<Host, HostBuildError> {
        let Self { limits, threads } = self;
        if threads == Some(0) {
            return Err(HostBuildError::Threads);
        }

        #[cfg(feature = "rayon")]
        let backend = {
            let mut builder = rayon::ThreadPoolBuilder::new()
                .thread_name(|index| format!("weft-host-{index}"));
            if let Some(threads) = threads {
                builder = builder.num_threads(threads);
            }
            let pool = Arc::new(builder.build()?);
            let workers = Arc::default();
            Backend { pool, workers }
        };
        #[cfg(not(feature = "rayon"))]
        let backend = {
            let _ = threads;
            let workers = Arc::default();
            Backend { workers }
        };

        let (sender, receiver) = flume::unbounded();
        let id = HostId(uid::Id::new());
        let workers = backend.workers.clone();
        platform::spawn(serve(id, backend, receiver));

        let stream = StreamId::new();
        Ok(Host {
            id,
            limits,
            stream,
            sender,
            workers,
        })
    }
}

/// Routes events to per-stream workers, starting a worker on first use of a stream and
/// dropping it when the stream is destroyed.
async fn serve(id: HostId, backend: Backend, receiver: flume::Receiver<HostEvent>) {
    let mut streams: HashMap<StreamId, flume::Sender<HostEvent>> = HashMap::default();

    while let Ok(event) = receiver.recv_async().await {
        match event {
            HostEvent::Destroy { stream, sender } => match streams.remove(&stream) {
                Some(worker) => {
                    log::debug!("host {id} closing stream {stream}");
                    _ = worker.send(HostEvent::Destroy { stream, sender });
                }
                None => {
                    _ = sender.send(Ok(()));
                }
            },
            event => {
                let stream = event.stream();
                let sender = streams.entry(stream).or_insert_with(|| {
                    log::debug!("host {id} opened stream {stream}");
                    let (sender, receiver) = flume::unbounded();
                    backend.workers.fetch_add(1, Ordering::AcqRel);
                    platform::spawn(serve_stream(stream, backend.clone(), receiver));
                    sender
                });
                _ = sender.send(event);
            }
        }
    }
}

/// Runs the launches of one stream in submission order. The first fault since the last
/// synchronization is reported to the next synchronization or destroy request.
async fn serve_stream(stream: StreamId, backend: Backend, receiver: flume::Receiver<HostEvent>) {
    let mut fault = None;
    let mut closing = None;

    while let Ok(event) = receiver.recv_async().await {
        match event {
            HostEvent::Launch { kernel, params, .. } => {
                let backend = backend.clone();
                let result = platform::handle(move || backend.execute(&kernel, params)).await;
                if let Err(message) = result {
                    log::error!("kernel {} faulted on stream {stream}: {message}", params.topology);
                    fault.get_or_insert(RuntimeError::Fault(stream, message));
                }
            }
            HostEvent::Synchronize { sender, .. } => {
                log::trace!("synchronized stream {stream}");
                let result = match fault.take() {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
                _ = sender.send_async(result).await;
            }
            HostEvent::Destroy { sender, .. } => {
                closing = Some(sender);
                break;
            }
        }
    }

    backend.workers.fetch_sub(1, Ordering::AcqRel);
    if let Some(sender) = closing {
        let result = match fault {
            Some(err) => Err(err),
            None => Ok(()),
        };
        _ = sender.send_async(result).await;
    }
}
