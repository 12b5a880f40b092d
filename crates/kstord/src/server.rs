//! UNIX-socket server: one acceptor task feeding a bounded FIFO, a
//! fixed-size pool of worker tasks each handling one connection at a time.
//!
//! Shutdown is cooperative: flipping the watch channel stops the acceptor
//! and closes the queue; workers drain what they hold. After a grace period
//! the stragglers are aborted. A worker that dies outside shutdown is
//! respawned.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use kstor_proto::codec;

use crate::config::Config;
use crate::dispatcher::Dispatcher;

/// Pending-connection queue depth.
const QUEUE_DEPTH: usize = 32;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct Server {
    config: Config,
    dispatcher: Arc<Dispatcher>,
}

type ConnReceiver = Arc<Mutex<mpsc::Receiver<UnixStream>>>;

impl Server {
    pub fn new(config: Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let socket_path = &self.config.socket;
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("removing stale socket {}", socket_path.display()))?;
        }
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("binding {}", socket_path.display()))?;
        info!(socket = %socket_path.display(), nworkers = self.config.nworkers, "listening");

        let (queue_tx, queue_rx) = mpsc::channel::<UnixStream>(QUEUE_DEPTH);
        let queue_rx: ConnReceiver = Arc::new(Mutex::new(queue_rx));

        let mut workers = JoinSet::new();
        for n in 0..self.config.nworkers {
            workers.spawn(worker_loop(n, self.dispatcher.clone(), queue_rx.clone()));
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        if queue_tx.send(stream).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(exited) = workers.join_next() => {
                    // Workers only return at queue close; anything earlier
                    // is a death worth replacing.
                    if let Err(e) = exited {
                        warn!(error = %e, "worker died; respawning");
                    }
                    workers.spawn(worker_loop(
                        self.config.nworkers,
                        self.dispatcher.clone(),
                        queue_rx.clone(),
                    ));
                }
            }
        }

        info!("shutting down; draining workers");
        drop(queue_tx);
        let drain = async {
            while workers.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("graceful drain timed out; aborting remaining workers");
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }
        let _ = std::fs::remove_file(socket_path);
        Ok(())
    }
}

async fn worker_loop(n: usize, dispatcher: Arc<Dispatcher>, queue: ConnReceiver) {
    loop {
        let stream = queue.lock().await.recv().await;
        let Some(stream) = stream else {
            debug!(worker = n, "queue closed; exiting");
            return;
        };
        if let Err(e) = handle_connection(&dispatcher, stream).await {
            warn!(worker = n, error = %e, "connection error");
        }
    }
}

/// One request, one response, close.
async fn handle_connection(
    dispatcher: &Dispatcher,
    stream: UnixStream,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(raw) = codec::read_message(&mut reader).await? else {
        return Ok(());
    };
    let response = dispatcher.handle_raw(&raw).await;
    let bytes = serde_json::to_vec(&response)?;
    codec::write_message(&mut write_half, &bytes).await?;
    Ok(())
}
