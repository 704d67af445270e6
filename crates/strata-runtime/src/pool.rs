use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use strata_chunk::{ChunkKey, ChunkMeshRequest};
use strata_mesh_cpu::PaletteCache;

use crate::correlate::{BuildError, BuildResult, Correlator};
use crate::protocol::{
    BuildPayload, MessageKind, RequestId, RequestIds, WorkerReply, WorkerRequest, process_request,
};

/// Single-use handle on one dispatched build.
///
/// The result can be taken once; afterwards the handle reports `Disposed`.
pub struct BuildHandle {
    id: RequestId,
    key: ChunkKey,
    rx: Receiver<BuildResult>,
}

impl BuildHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Blocks until the build resolves.
    pub fn wait(self) -> BuildResult {
        self.rx.recv().unwrap_or(Err(BuildError::Disposed))
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<BuildResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(r) => Some(r),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(BuildError::Disposed)),
        }
    }

    /// Non-blocking poll.
    pub fn try_take(&self) -> Option<BuildResult> {
        match self.rx.try_recv() {
            Ok(r) => Some(r),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(BuildError::Disposed)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Threaded { workers: usize },
    Inline,
}

struct Threaded {
    _pool: ThreadPool,
    job_tx: Option<Sender<WorkerRequest>>,
    router: Option<JoinHandle<()>>,
    workers: usize,
}

/// How requests reach a worker, fixed at construction.
enum Transport {
    Threaded(Threaded),
    Inline,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub queued: usize,
    pub in_flight: usize,
    pub pending: usize,
}

fn lock(c: &Mutex<Correlator>) -> MutexGuard<'_, Correlator> {
    c.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background chunk builders fed over channels, with an inline fallback.
pub struct BuildPool {
    transport: Transport,
    correlator: Arc<Mutex<Correlator>>,
    ids: RequestIds,
    q_ctr: Arc<AtomicUsize>,
    inflight_ctr: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    disposed: bool,
}

type RouterSpawn = fn(Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>;

fn spawn_router(body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("strata-build-router".into())
        .spawn(body)
}

impl BuildPool {
    /// Spawns `workers` build threads. Zero workers, or worker or router
    /// threads that cannot be started, leave the pool building inline on the
    /// caller's thread.
    pub fn new(workers: usize) -> Self {
        Self::with_router_spawn(workers, spawn_router)
    }

    fn with_router_spawn(workers: usize, router_spawn: RouterSpawn) -> Self {
        let correlator = Arc::new(Mutex::new(Correlator::new()));
        let q_ctr = Arc::new(AtomicUsize::new(0));
        let inflight_ctr = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let transport = if workers == 0 {
            log::info!(target: "pool", "no workers requested; building inline");
            Transport::Inline
        } else {
            match ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("strata-build-{i}"))
                .build()
            {
                Ok(pool) => match Self::spawn_workers(
                    pool,
                    workers,
                    router_spawn,
                    &correlator,
                    &q_ctr,
                    &inflight_ctr,
                    &stop,
                ) {
                    Ok(threaded) => Transport::Threaded(threaded),
                    Err(e) => {
                        log::warn!(target: "pool", "reply router failed to start ({}); building inline", e);
                        Transport::Inline
                    }
                },
                Err(e) => {
                    log::warn!(target: "pool", "worker pool unavailable ({}); building inline", e);
                    Transport::Inline
                }
            }
        };
        Self {
            transport,
            correlator,
            ids: RequestIds::default(),
            q_ctr,
            inflight_ctr,
            stop,
            disposed: false,
        }
    }

    /// Starts the reply router first; workers are only spawned once replies
    /// have somewhere to go.
    fn spawn_workers(
        pool: ThreadPool,
        workers: usize,
        router_spawn: RouterSpawn,
        correlator: &Arc<Mutex<Correlator>>,
        q_ctr: &Arc<AtomicUsize>,
        inflight_ctr: &Arc<AtomicUsize>,
        stop: &Arc<AtomicBool>,
    ) -> io::Result<Threaded> {
        let (job_tx, job_rx) = unbounded::<WorkerRequest>();
        let (res_tx, res_rx) = unbounded::<WorkerReply>();

        let router = {
            let correlator = correlator.clone();
            router_spawn(Box::new(move || {
                while let Ok(reply) = res_rx.recv() {
                    lock(&correlator).resolve(reply);
                }
            }))?
        };

        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = res_tx.clone();
            let q = q_ctr.clone();
            let inflight = inflight_ctr.clone();
            let stop = stop.clone();
            pool.spawn(move || {
                while let Ok(job) = rx.recv() {
                    q.fetch_sub(1, Ordering::Relaxed);
                    // Disposed: drain the queue without building.
                    if stop.load(Ordering::Relaxed) {
                        continue;
                    }
                    inflight.fetch_add(1, Ordering::Relaxed);
                    let reply = process_request(job);
                    inflight.fetch_sub(1, Ordering::Relaxed);
                    if tx.send(reply).is_err() {
                        break;
                    }
                }
            });
        }
        drop(res_tx);

        log::info!(target: "pool", "build pool started workers={}", workers);
        Ok(Threaded {
            _pool: pool,
            job_tx: Some(job_tx),
            router: Some(router),
            workers,
        })
    }

    pub fn transport_kind(&self) -> TransportKind {
        match &self.transport {
            Transport::Threaded(t) => TransportKind::Threaded { workers: t.workers },
            Transport::Inline => TransportKind::Inline,
        }
    }

    /// Dispatches one chunk build. A newer build for the same chunk key
    /// supersedes any still pending.
    pub fn build(&self, request: ChunkMeshRequest, palette: Arc<PaletteCache>) -> BuildHandle {
        let id = self.ids.next(MessageKind::BuildChunk);
        let key = request.key;
        if self.disposed {
            let (tx, rx) = bounded(1);
            let _ = tx.send(Err(BuildError::Disposed));
            return BuildHandle { id, key, rx };
        }
        let rx = lock(&self.correlator).register(id, key);
        let msg = WorkerRequest {
            kind: MessageKind::BuildChunk,
            request_id: id,
            payload: BuildPayload { request, palette },
        };
        match &self.transport {
            Transport::Threaded(t) => {
                self.q_ctr.fetch_add(1, Ordering::Relaxed);
                let sent = t.job_tx.as_ref().map(|tx| tx.send(msg));
                if !matches!(sent, Some(Ok(()))) {
                    self.q_ctr.fetch_sub(1, Ordering::Relaxed);
                    log::warn!(target: "pool", "job channel closed; rejecting {}", id);
                    lock(&self.correlator).resolve(WorkerReply::Error {
                        request_id: id,
                        error: "job channel closed".into(),
                    });
                }
            }
            Transport::Inline => {
                self.inflight_ctr.fetch_add(1, Ordering::Relaxed);
                let reply = process_request(msg);
                self.inflight_ctr.fetch_sub(1, Ordering::Relaxed);
                lock(&self.correlator).resolve(reply);
            }
        }
        BuildHandle { id, key, rx }
    }

    /// Builds and waits. Convenience for callers without their own scheduling.
    pub fn build_blocking(
        &self,
        request: ChunkMeshRequest,
        palette: Arc<PaletteCache>,
    ) -> BuildResult {
        self.build(request, palette).wait()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queued: self.q_ctr.load(Ordering::Relaxed),
            in_flight: self.inflight_ctr.load(Ordering::Relaxed),
            pending: lock(&self.correlator).pending_len(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Closes the job channel and rejects every pending handle. Workers exit
    /// after their current job; later builds resolve to `Disposed` at once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.stop.store(true, Ordering::Relaxed);
        lock(&self.correlator).reject_all(BuildError::Disposed);
        if let Transport::Threaded(t) = &mut self.transport {
            t.job_tx = None;
            // The router ends once every worker has dropped its reply sender.
            if let Some(router) = t.router.take() {
                let _ = router.join();
            }
        }
        log::info!(target: "pool", "build pool disposed");
    }
}

impl Drop for BuildPool {
    fn drop(&mut self) {
        self.dispose();
    }
}
