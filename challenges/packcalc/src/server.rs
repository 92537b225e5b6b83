use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc;
use tokio::time;

use crate::api::RequestProcessor;
use crate::config::Config;
use crate::connection::Connection;
use crate::protocol::{HttpResponse, HttpStatus};

struct Listener {
    listener: TcpListener,

    processor: Arc<RequestProcessor>,

    /// Dropped on shutdown; each connection stops before its next request.
    notify_shutdown: broadcast::Sender<()>,

    /// Cloned into every handler; the receiver closes when the last one drops.
    shutdown_complete_tx: mpsc::Sender<()>,
}

impl Listener {
    async fn run(&mut self) -> std::io::Result<()> {
        info!("accepting inbound connections");
        loop {
            let socket = self.accept().await?;
            let mut handler = Handler {
                con: Connection::new(socket),
                processor: self.processor.clone(),
                shutdown: self.notify_shutdown.subscribe(),
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };
            tokio::spawn(async move {
                if let Err(err) = handler.run().await {
                    error!("connection error: {:?}", err);
                }
            });
        }
    }

    /// Retries failed accepts after 1s, 2s, ... 64s, then gives up.
    async fn accept(&mut self) -> std::io::Result<TcpStream> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    debug!("accepted connection from {}", addr);
                    return Ok(socket);
                }
                Err(err) => {
                    if backoff > 64 {
                        return Err(err);
                    }
                    warn!("accept failed, retrying in {}s: {}", backoff, err);
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

struct Handler {
    con: Connection,
    processor: Arc<RequestProcessor>,
    shutdown: Receiver<()>,
    /// Not used directly. Dropped together with the `Handler`.
    _shutdown_complete: mpsc::Sender<()>,
}

impl Handler {
    /// Serves requests until the client closes, asks to close, or sends
    /// something that can't be framed.
    async fn run(&mut self) -> std::io::Result<()> {
        loop {
            let request = tokio::select! {
                req = self.con.read_request() => req,
                _ = self.shutdown.recv() => {
                    return Ok(());
                }
            };

            let request = match request {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::InvalidData => {
                    warn!("malformed request: {}", err);
                    let response = HttpResponse::text(HttpStatus::BadRequest, err.to_string()).closing();
                    return self.con.write_response(&response).await;
                }
                Err(err) => return Err(err),
            };

            let mut response = self.processor.handle(&request).await;
            if request.wants_close() {
                response = response.closing();
            }
            self.con.write_response(&response).await?;
            if response.close {
                return Ok(());
            }
        }
    }
}

/// Serves HTTP on `listener` until `shutdown` completes, then waits for open
/// connections to finish.
pub async fn run(listener: TcpListener, config: Config, shutdown: impl Future) {
    let processor = Arc::new(RequestProcessor::new(&config));
    if config.default_sizes().is_empty() {
        warn!("no default pack sizes configured; requests must name their own");
    } else {
        info!("default pack sizes {:?}", config.default_sizes());
    }

    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);

    let mut server = Listener {
        processor,
        listener,
        notify_shutdown,
        shutdown_complete_tx,
    };

    tokio::select! {
        res = server.run() => {
            if let Err(err) = res {
                error!("failed to accept: {}", err);
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }

    let Listener {
        notify_shutdown,
        shutdown_complete_tx,
        ..
    } = server;

    drop(notify_shutdown);
    drop(shutdown_complete_tx);

    shutdown_complete_rx.recv().await;
}
