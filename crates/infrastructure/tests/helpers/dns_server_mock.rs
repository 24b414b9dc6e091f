use hickory_proto::op::{Message, ResponseCode};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

use super::messages::address_reply;

#[derive(Debug, Clone)]
pub enum MockReply {
    Answer(Vec<IpAddr>),
    Rcode(ResponseCode),
    /// Over UDP: empty reply with TC set. Over TCP: the answer.
    TruncatedUdp(Vec<IpAddr>),
    /// Never replies.
    Silent,
    /// Over UDP: ignores the first datagram, answers the retransmit.
    DropFirst(Vec<IpAddr>),
    /// Over UDP: sends a reply with the wrong id, then the real one.
    ForeignIdFirst(Vec<IpAddr>),
}

/// Scripted upstream resolver listening on UDP and TCP of one loopback port.
pub struct MockDnsServer {
    addr: SocketAddr,
    udp_queries: Arc<AtomicUsize>,
    tcp_queries: Arc<AtomicUsize>,
    token: CancellationToken,
}

impl MockDnsServer {
    pub async fn start(reply: MockReply) -> std::io::Result<Self> {
        Self::start_with_delay(reply, Duration::ZERO).await
    }

    pub async fn start_with_delay(reply: MockReply, delay: Duration) -> std::io::Result<Self> {
        let udp = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = udp.local_addr()?;
        let tcp = TcpListener::bind(addr).await?;

        let token = CancellationToken::new();
        let udp_queries = Arc::new(AtomicUsize::new(0));
        let tcp_queries = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_udp(
            udp,
            reply.clone(),
            delay,
            Arc::clone(&udp_queries),
            token.clone(),
        ));
        tokio::spawn(run_tcp(
            tcp,
            reply,
            delay,
            Arc::clone(&tcp_queries),
            token.clone(),
        ));

        Ok(Self {
            addr,
            udp_queries,
            tcp_queries,
            token,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn udp_queries(&self) -> usize {
        self.udp_queries.load(Ordering::SeqCst)
    }

    pub fn tcp_queries(&self) -> usize {
        self.tcp_queries.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        self.token.cancel();
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn build_reply(request: &Message, reply: &MockReply, over_tcp: bool) -> Option<Message> {
    match reply {
        MockReply::Answer(ips) | MockReply::DropFirst(ips) | MockReply::ForeignIdFirst(ips) => {
            Some(address_reply(request, ips, 60))
        }
        MockReply::Rcode(rcode) => {
            let mut msg = address_reply(request, &[], 60);
            msg.set_response_code(*rcode);
            Some(msg)
        }
        MockReply::TruncatedUdp(ips) if over_tcp => Some(address_reply(request, ips, 60)),
        MockReply::TruncatedUdp(_) => {
            let mut msg = address_reply(request, &[], 60);
            msg.set_truncated(true);
            Some(msg)
        }
        MockReply::Silent => None,
    }
}

async fn run_udp(
    socket: UdpSocket,
    reply: MockReply,
    delay: Duration,
    counter: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; 4096];
    loop {
        let (len, peer) = tokio::select! {
            _ = token.cancelled() => break,
            r = socket.recv_from(&mut buf) => match r {
                Ok(r) => r,
                Err(_) => continue,
            },
        };
        let seen = counter.fetch_add(1, Ordering::SeqCst);
        let Ok(request) = Message::from_vec(&buf[..len]) else {
            continue;
        };
        if matches!(reply, MockReply::DropFirst(_)) && seen == 0 {
            continue;
        }

        let reply = reply.clone();
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(msg) = build_reply(&request, &reply, false) {
                if matches!(reply, MockReply::ForeignIdFirst(_)) {
                    let mut forged = msg.clone();
                    forged.set_id(request.id().wrapping_add(1));
                    let _ = socket.send_to(&forged.to_vec().unwrap(), peer).await;
                }
                let _ = socket.send_to(&msg.to_vec().unwrap(), peer).await;
            }
        });
    }
}

async fn run_tcp(
    listener: TcpListener,
    reply: MockReply,
    delay: Duration,
    counter: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            _ = token.cancelled() => break,
            r = listener.accept() => match r {
                Ok((stream, _)) => stream,
                Err(_) => continue,
            },
        };
        tokio::spawn(serve_tcp(
            stream,
            reply.clone(),
            delay,
            Arc::clone(&counter),
            token.clone(),
        ));
    }
}

async fn serve_tcp(
    mut stream: TcpStream,
    reply: MockReply,
    delay: Duration,
    counter: Arc<AtomicUsize>,
    token: CancellationToken,
) {
    loop {
        let mut len_buf = [0u8; 2];
        tokio::select! {
            _ = token.cancelled() => return,
            r = stream.read_exact(&mut len_buf) => if r.is_err() { return },
        }
        let mut body = vec![0u8; u16::from_be_bytes(len_buf) as usize];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }
        counter.fetch_add(1, Ordering::SeqCst);

        let Ok(request) = Message::from_vec(&body) else {
            return;
        };
        tokio::time::sleep(delay).await;
        if let Some(msg) = build_reply(&request, &reply, true) {
            let bytes = msg.to_vec().unwrap();
            let mut framed = (bytes.len() as u16).to_be_bytes().to_vec();
            framed.extend_from_slice(&bytes);
            if stream.write_all(&framed).await.is_err() {
                return;
            }
        }
    }
}

/// A loopback address on which nothing is listening.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
