//! Listener: one UDP socket and one TCP listener on the same address.
//!
//! Each UDP datagram and each TCP frame becomes its own task, tracked so
//! that [`RunningServer::stop`] can wait for in-flight queries. TCP
//! connections read frames, spawn a worker per frame and funnel replies
//! through a single writer, so pipelined queries are answered in
//! completion order and a slow peer only holds up its own connection. A
//! peer that stops reading is dropped once a write outlasts the idle
//! timeout.

use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use sans_domain::config::ServerConfig;
use sans_domain::QueryOrigin;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::codec::{DnsFrameCodec, DEFAULT_MAX_FRAME_LEN};
use super::handler::DnsHandler;

const MAX_UDP_DATAGRAM: usize = 4096;
const UDP_BUFFER_SIZE: usize = 512 * 1024;
const TCP_BACKLOG: i32 = 1024;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub listen: SocketAddr,
    pub tcp_idle_timeout: Duration,
    pub tcp_max_inflight: usize,
    pub max_frame_len: usize,
}

impl ListenerConfig {
    pub fn new(listen: SocketAddr) -> Self {
        Self::from_server_config(&ServerConfig {
            listen,
            ..ServerConfig::default()
        })
    }

    pub fn from_server_config(server: &ServerConfig) -> Self {
        Self {
            listen: server.listen,
            tcp_idle_timeout: Duration::from_millis(server.tcp_idle_timeout_ms),
            tcp_max_inflight: server.tcp_max_inflight.max(1),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.tcp_idle_timeout = idle;
        self
    }

    pub fn with_max_inflight(mut self, max_inflight: usize) -> Self {
        self.tcp_max_inflight = max_inflight.max(1);
        self
    }
}

pub struct DnsServer {
    config: ListenerConfig,
    handler: DnsHandler,
}

impl DnsServer {
    pub fn new(config: ListenerConfig, handler: DnsHandler) -> Self {
        Self { config, handler }
    }

    /// Binds both sockets and spawns the accept loops. Must be called from
    /// within a Tokio runtime. With port 0 the TCP listener reuses the port
    /// the OS picked for UDP.
    pub fn start(self) -> io::Result<RunningServer> {
        let udp_socket = Arc::new(create_udp_socket(self.config.listen)?);
        let udp_addr = udp_socket.local_addr()?;

        let tcp_listener = create_tcp_listener(SocketAddr::new(
            self.config.listen.ip(),
            udp_addr.port(),
        ))?;
        let tcp_addr = tcp_listener.local_addr()?;

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(run_udp_loop(
            udp_socket,
            self.handler.clone(),
            tracker.clone(),
            token.clone(),
        ));
        tracker.spawn(run_tcp_accept_loop(
            tcp_listener,
            self.handler,
            self.config.clone(),
            tracker.clone(),
            token.clone(),
        ));

        info!(udp = %udp_addr, tcp = %tcp_addr, "DNS listener ready");

        Ok(RunningServer {
            udp_addr,
            tcp_addr,
            token,
            tracker,
        })
    }
}

pub struct RunningServer {
    udp_addr: SocketAddr,
    tcp_addr: SocketAddr,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl RunningServer {
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    /// Stops accepting, lets in-flight queries finish or time out, then
    /// releases the sockets.
    pub async fn stop(self) {
        info!(udp = %self.udp_addr, tcp = %self.tcp_addr, "Stopping DNS listener");
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("DNS listener stopped");
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_udp_loop(
    socket: Arc<UdpSocket>,
    handler: DnsHandler,
    tracker: TaskTracker,
    token: CancellationToken,
) {
    let mut recv_buf = vec![0u8; MAX_UDP_DATAGRAM];

    loop {
        let received = tokio::select! {
            _ = token.cancelled() => break,
            received = socket.recv_from(&mut recv_buf) => received,
        };

        let (len, peer) = match received {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "UDP recv error");
                continue;
            }
        };

        let query = recv_buf[..len].to_vec();
        let handler = handler.clone();
        let socket = Arc::clone(&socket);
        tracker.spawn(async move {
            if let Some(response) = handler.handle(&query, QueryOrigin::Udp { peer }).await {
                if let Err(e) = socket.send_to(&response, peer).await {
                    debug!(peer = %peer, error = %e, "UDP send error");
                }
            }
        });
    }

    debug!("UDP loop exited");
}

async fn run_tcp_accept_loop(
    listener: TcpListener,
    handler: DnsHandler,
    config: ListenerConfig,
    tracker: TaskTracker,
    token: CancellationToken,
) {
    let mut next_connection: u64 = 0;

    loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "TCP accept error");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
        };

        next_connection += 1;
        let _ = stream.set_nodelay(true);
        debug!(peer = %peer, connection = next_connection, "TCP connection accepted");

        tracker.spawn(serve_connection(
            stream,
            peer,
            next_connection,
            handler.clone(),
            config.clone(),
            tracker.clone(),
            token.clone(),
        ));
    }

    debug!("TCP accept loop exited");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connection: u64,
    handler: DnsHandler,
    config: ListenerConfig,
    tracker: TaskTracker,
    token: CancellationToken,
) {
    let framed = Framed::new(stream, DnsFrameCodec::with_max_frame_len(config.max_frame_len));
    let (sink, mut frames) = framed.split();
    let (tx, rx) = mpsc::channel::<Bytes>(config.tcp_max_inflight);

    // Cancelled on server stop, and by the writer when the peer stops reading.
    let closing = token.child_token();
    tracker.spawn(write_responses(
        sink,
        rx,
        peer,
        config.tcp_idle_timeout,
        closing.clone(),
    ));

    let inflight = Arc::new(Semaphore::new(config.tcp_max_inflight));

    loop {
        let next = tokio::select! {
            _ = closing.cancelled() => break,
            next = tokio::time::timeout(config.tcp_idle_timeout, frames.next()) => next,
        };

        let frame = match next {
            // Outstanding work is bounded by the query deadline and the write timeout.
            Err(_) if inflight.available_permits() < config.tcp_max_inflight => continue,
            Err(_) => {
                debug!(peer = %peer, connection, "Closing idle TCP connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(peer = %peer, connection, error = %e, "Closing TCP connection on framing error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        // Back-pressure: stop reading until a slot frees up.
        let permit = tokio::select! {
            _ = closing.cancelled() => break,
            permit = Arc::clone(&inflight).acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        let handler = handler.clone();
        let tx = tx.clone();
        tracker.spawn(async move {
            let origin = QueryOrigin::Tcp { peer, connection };
            if let Some(response) = handler.handle(&frame, origin).await {
                // Fails at once when the writer has given up on the peer.
                let _ = tx.send(Bytes::from(response)).await;
            }
            drop(permit);
        });
    }

    debug!(peer = %peer, connection, "TCP reader finished");
}

/// Single writer per connection. Every write is bounded by `write_timeout`;
/// once stopping, a write that cannot complete immediately is abandoned.
/// Dropping `rx` on exit makes pending senders fail fast.
async fn write_responses(
    mut sink: SplitSink<Framed<TcpStream, DnsFrameCodec>, Bytes>,
    mut rx: mpsc::Receiver<Bytes>,
    peer: SocketAddr,
    write_timeout: Duration,
    closing: CancellationToken,
) {
    // Stays true only if every sender finished and the peer kept up.
    let mut drained = true;
    while let Some(response) = rx.recv().await {
        drained = false;
        let written = tokio::select! {
            biased;
            written = tokio::time::timeout(write_timeout, sink.send(response)) => written,
            _ = closing.cancelled() => {
                debug!(peer = %peer, "Abandoning TCP write on shutdown");
                break;
            }
        };
        match written {
            Ok(Ok(())) => drained = true,
            Ok(Err(e)) => {
                debug!(peer = %peer, error = %e, "TCP write error");
                break;
            }
            Err(_) => {
                debug!(peer = %peer, "Peer stopped reading, closing TCP connection");
                break;
            }
        }
    }

    closing.cancel();
    drop(rx);
    if drained {
        let _ = tokio::time::timeout(write_timeout, sink.close()).await;
    }
}

fn create_udp_socket(socket_addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(socket_addr), Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(UDP_BUFFER_SIZE)?;
    socket.set_send_buffer_size(UDP_BUFFER_SIZE)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

fn create_tcp_listener(socket_addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(socket_addr), Type::STREAM, Some(Protocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(TCP_BACKLOG)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
