//! TCP backend: chat over `tcp://host:port`, discovery by probing configured peers.
//! Lets the client run against `nc -l` or another instance without a Bluetooth adapter.

use std::net::IpAddr;

use async_trait::async_trait;
use btirc_core::discovery::INQUIRY_COMPLETED;
use btirc_core::{
    Connector, Device, DeviceClass, DiscoveryAgent, DiscoverySink, InquiryScope,
    StreamConnection, StreamHalves, TransportError,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::address::PeerAddress;
use crate::config::TcpConfig;

pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Device for TcpTransport {
    fn address(&self) -> String {
        self.config.local_address.clone()
    }

    async fn friendly_name(&self) -> Result<String, TransportError> {
        if self.config.local_name.is_empty() {
            return Err(TransportError::NameUnavailable(self.address()));
        }
        Ok(self.config.local_name.clone())
    }
}

/// Remote end of a TCP chat. Host names double as friendly names; bare IPs have none.
#[derive(Debug, Clone)]
pub struct TcpPeer {
    host: String,
    port: u16,
}

#[async_trait]
impl Device for TcpPeer {
    fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    async fn friendly_name(&self) -> Result<String, TransportError> {
        if self.host.parse::<IpAddr>().is_ok() {
            return Err(TransportError::NameUnavailable(self.address()));
        }
        Ok(self.host.clone())
    }
}

#[derive(Debug)]
pub struct TcpConnection {
    halves: StreamHalves<OwnedReadHalf, OwnedWriteHalf>,
    peer: TcpPeer,
}

impl StreamConnection for TcpConnection {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;
    type Peer = TcpPeer;

    fn open_input_stream(&mut self) -> Result<OwnedReadHalf, TransportError> {
        self.halves.take_reader()
    }

    fn open_output_stream(&mut self) -> Result<OwnedWriteHalf, TransportError> {
        self.halves.take_writer()
    }

    fn remote_peer(&self) -> Result<TcpPeer, TransportError> {
        Ok(self.peer.clone())
    }
}

fn tcp_target(address: &str) -> Result<TcpPeer, TransportError> {
    match address.parse::<PeerAddress>() {
        Ok(PeerAddress::Tcp { host, port }) => Ok(TcpPeer { host, port }),
        Ok(other) => Err(TransportError::InvalidAddress(format!(
            "{} needs the bluez backend",
            other
        ))),
        Err(e) => Err(TransportError::InvalidAddress(e.to_string())),
    }
}

#[async_trait]
impl Connector for TcpTransport {
    type Connection = TcpConnection;

    async fn open(&self, address: &str) -> Result<TcpConnection, TransportError> {
        let peer = tcp_target(address)?;
        let stream = TcpStream::connect((peer.host.as_str(), peer.port)).await?;
        stream.set_nodelay(true)?;
        debug!(peer = %peer.address(), "tcp connected");
        let (reader, writer) = stream.into_split();
        Ok(TcpConnection {
            halves: StreamHalves::new(reader, writer),
            peer,
        })
    }
}

#[async_trait]
impl DiscoveryAgent for TcpTransport {
    type Peer = TcpPeer;

    async fn start_inquiry(
        &self,
        scope: InquiryScope,
        sink: DiscoverySink<TcpPeer>,
    ) -> Result<(), TransportError> {
        let mut targets = Vec::new();
        for p in &self.config.peers {
            match tcp_target(p) {
                Ok(t) => targets.push(t),
                Err(e) => warn!(peer = %p, error = %e, "skipping configured peer"),
            }
        }
        debug!(?scope, peers = targets.len(), "probing tcp peers");
        let timeout = self.config.connect_timeout();
        tokio::spawn(async move {
            for peer in targets {
                let probe = TcpStream::connect((peer.host.as_str(), peer.port));
                match tokio::time::timeout(timeout, probe).await {
                    Ok(Ok(_)) => sink.device_found(peer, DeviceClass::default()),
                    Ok(Err(e)) => debug!(peer = %peer.address(), error = %e, "peer unreachable"),
                    Err(_) => debug!(peer = %peer.address(), "probe timed out"),
                }
            }
            sink.inquiry_completed(INQUIRY_COMPLETED);
        });
        Ok(())
    }
}
