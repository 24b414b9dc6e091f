pub mod cache;
pub mod codec;
pub mod handler;
pub mod probe;
pub mod server;
pub mod services;
pub mod transport;
pub mod upstream_pool;

pub use cache::LruResponseCache;
pub use codec::{DecodeError, DnsFrameCodec, FrameError, MessageCodec};
pub use handler::DnsHandler;
pub use probe::SoaPollutionProbe;
pub use server::{DnsServer, ListenerConfig, RunningServer};
pub use services::DnsServices;
pub use upstream_pool::UpstreamPool;
