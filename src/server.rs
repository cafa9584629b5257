use crate::command::{CommandContext, CommandTable};
use crate::persistence::aof::Aof;
use crate::resp::{RespParser, RespValue};
use crate::store::SharedStore;
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Everything a connection needs, shared across all of them.
pub struct ServerState {
    pub store: SharedStore,
    pub commands: Arc<CommandTable>,
    pub aof: Option<Arc<Aof>>,
}

impl ServerState {
    pub fn new(store: SharedStore, aof: Option<Arc<Aof>>) -> Self {
        ServerState {
            store,
            commands: Arc::new(CommandTable::new()),
            aof,
        }
    }

    /// Run one request under the store lock. A successful write is queued to
    /// the AOF before the lock is released, so log order is execution order.
    pub async fn execute(&self, frame: &RespValue) -> RespValue {
        let mut store = self.store.lock().await;
        let mut ctx = CommandContext::new(&mut store, &self.commands, self.aof.as_ref());
        let outcome = self.commands.dispatch(&mut ctx, frame);
        if let (Some(entry), Some(aof)) = (&outcome.log, &self.aof) {
            aof.append(entry, outcome.now);
        }
        outcome.reply
    }
}

/// Accept connections until `shutdown` fires. Open connections are closed
/// once they finish the request they are working on, and this returns only
/// after every connection task has exited, so no write reaches the AOF after
/// the caller's final flush.
pub async fn run_server(listener: TcpListener, state: Arc<ServerState>, shutdown: CancellationToken) -> io::Result<()> {
    info!("Kestrel listening on {}", listener.local_addr()?);
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("no longer accepting connections");
                connections.close();
                connections.wait().await;
                debug!("all connections closed");
                return Ok(());
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };
                debug!("new connection from {peer}");
                let state = Arc::clone(&state);
                let shutdown = shutdown.child_token();
                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, state, shutdown).await {
                        debug!("connection error from {peer}: {e}");
                    }
                    debug!("connection closed: {peer}");
                });
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let mut out = Vec::with_capacity(4096);

    loop {
        // Answer every complete frame already buffered, then write once.
        // Frames still buffered at shutdown are dropped unanswered.
        let mut protocol_error = None;
        while !shutdown.is_cancelled() {
            match RespParser::parse(&mut buf) {
                Ok(Some(frame)) => state.execute(&frame).await.write_to(&mut out),
                Ok(None) => break,
                Err(e) => {
                    protocol_error = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = protocol_error {
            debug!("protocol error from {peer}: {e}");
            RespValue::error(format!("ERR Protocol error: {e}")).write_to(&mut out);
            stream.write_all(&out).await?;
            return Ok(());
        }
        if !out.is_empty() {
            stream.write_all(&out).await?;
            out.clear();
        }
        if shutdown.is_cancelled() {
            return Ok(());
        }

        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = stream.read_buf(&mut buf) => {
                if read? == 0 {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::Store;
    use tokio::sync::Mutex;

    fn state() -> ServerState {
        let store = Store::new(Arc::new(ManualClock::new(1_700_000_000_000)));
        ServerState::new(Arc::new(Mutex::new(store)), None)
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let state = state();
        let reply = state.execute(&RespValue::command(["SET", "k", "v"])).await;
        assert_eq!(reply, RespValue::ok());
        let reply = state.execute(&RespValue::command(["GET", "k"])).await;
        assert_eq!(reply, RespValue::bulk_string("v"));
    }

    #[tokio::test]
    async fn test_pipelined_and_split_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(run_server(listener, Arc::new(state()), shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$4\r\nINCR\r\n$1")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.write_all(b"\r\na\r\n").await.unwrap();

        let expected = b"+OK\r\n:2\r\n";
        let mut got = vec![0u8; expected.len()];
        client.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, expected);

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_acknowledged_writes_survive_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let aof = Aof::open(&path, crate::persistence::aof::AofSettings::default()).await.unwrap();
        let store = Arc::new(Mutex::new(Store::new(clock.clone())));
        let state = Arc::new(ServerState::new(store, Some(Arc::clone(&aof))));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(run_server(listener, state, shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut batch = Vec::new();
        for i in 0..5_000 {
            RespValue::command(["SET".to_string(), format!("k{i}"), "v".to_string()]).write_to(&mut batch);
        }
        client.write_all(&batch).await.unwrap();
        let mut first = [0u8; 5];
        client.read_exact(&mut first).await.unwrap();
        assert_eq!(&first, b"+OK\r\n");

        // stop mid-pipeline; the server must drain its connections before returning
        shutdown.cancel();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        let acknowledged = 1 + rest.len() / first.len();
        server.await.unwrap().unwrap();
        aof.shutdown(std::time::Duration::from_secs(5)).await;

        let mut restored = Store::new(clock);
        let stats = crate::persistence::aof::replay(&path, &CommandTable::new(), &mut restored, true).unwrap();
        assert_eq!(stats.applied, acknowledged);
        for i in 0..acknowledged {
            assert_eq!(restored.strings().get(&format!("k{i}")).unwrap(), Some(b"v".to_vec()));
        }
    }

    #[tokio::test]
    async fn test_protocol_error_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(run_server(listener, Arc::new(state()), shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"PING\r\n").await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.starts_with(b"-ERR Protocol error"));
        shutdown.cancel();
    }
}
