//! BlueZ backend: adapter identity, timed inquiry via D-Bus discovery, RFCOMM streams.

use std::time::Duration;

use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, AdapterEvent, Address, Session};
use btirc_core::discovery::{INQUIRY_COMPLETED, INQUIRY_ERROR};
use btirc_core::{
    Connector, Device, DeviceClass, DiscoveryAgent, DiscoverySink, InquiryScope,
    StreamConnection, StreamHalves, TransportError,
};
use futures::StreamExt;
use tokio::io::{ReadHalf, WriteHalf};
use tracing::{debug, warn};

use crate::address::{format_bt_address, PeerAddress};

fn unavailable(e: bluer::Error) -> TransportError {
    TransportError::Unavailable(e.to_string())
}

fn backend(e: bluer::Error) -> TransportError {
    TransportError::Backend(e.to_string())
}

/// Local adapter; also the discovery agent and RFCOMM connector.
pub struct BluezTransport {
    // Keeps the D-Bus connection alive for the adapter handle.
    _session: Session,
    adapter: Adapter,
    address: String,
    inquiry: Duration,
}

impl BluezTransport {
    /// Acquire the named (or default) adapter and power it on.
    pub async fn new(adapter: Option<&str>, inquiry: Duration) -> Result<Self, TransportError> {
        let session = Session::new().await.map_err(unavailable)?;
        let adapter = match adapter {
            Some(name) => session.adapter(name).map_err(unavailable)?,
            None => session.default_adapter().await.map_err(unavailable)?,
        };
        adapter.set_powered(true).await.map_err(unavailable)?;
        let address = format_bt_address(&adapter.address().await.map_err(unavailable)?.0);
        debug!(adapter = adapter.name(), %address, "bluetooth adapter ready");
        Ok(Self {
            _session: session,
            adapter,
            address,
            inquiry,
        })
    }
}

#[async_trait]
impl Device for BluezTransport {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn friendly_name(&self) -> Result<String, TransportError> {
        self.adapter.alias().await.map_err(backend)
    }
}

/// Remote device known to BlueZ.
pub struct BluezPeer {
    device: bluer::Device,
    address: String,
}

impl BluezPeer {
    fn new(device: bluer::Device) -> Self {
        let address = format_bt_address(&device.address().0);
        Self { device, address }
    }
}

#[async_trait]
impl Device for BluezPeer {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn friendly_name(&self) -> Result<String, TransportError> {
        self.device
            .name()
            .await
            .map_err(backend)?
            .ok_or_else(|| TransportError::NameUnavailable(self.address.clone()))
    }
}

#[async_trait]
impl DiscoveryAgent for BluezTransport {
    type Peer = BluezPeer;

    async fn start_inquiry(
        &self,
        scope: InquiryScope,
        sink: DiscoverySink<BluezPeer>,
    ) -> Result<(), TransportError> {
        let events = self.adapter.discover_devices().await.map_err(unavailable)?;
        let adapter = self.adapter.clone();
        let length = self.inquiry;
        debug!(?scope, ?length, "bluez discovery started");
        tokio::spawn(async move {
            let mut events = Box::pin(events);
            let deadline = tokio::time::sleep(length);
            tokio::pin!(deadline);
            let status = loop {
                tokio::select! {
                    _ = &mut deadline => break INQUIRY_COMPLETED,
                    event = events.next() => match event {
                        Some(AdapterEvent::DeviceAdded(addr)) => match adapter.device(addr) {
                            Ok(device) => {
                                let class = device.class().await.ok().flatten().unwrap_or(0);
                                sink.device_found(BluezPeer::new(device), DeviceClass(class));
                            }
                            Err(e) => warn!(address = %addr, error = %e, "device vanished"),
                        },
                        Some(_) => {}
                        None => {
                            warn!("discovery event stream ended early");
                            break INQUIRY_ERROR;
                        }
                    },
                }
            };
            // Dropping the event stream stops discovery on the adapter.
            drop(events);
            sink.inquiry_completed(status);
        });
        Ok(())
    }
}

pub struct BluezConnection {
    halves: StreamHalves<ReadHalf<Stream>, WriteHalf<Stream>>,
    peer: bluer::Device,
}

impl StreamConnection for BluezConnection {
    type Reader = ReadHalf<Stream>;
    type Writer = WriteHalf<Stream>;
    type Peer = BluezPeer;

    fn open_input_stream(&mut self) -> Result<Self::Reader, TransportError> {
        self.halves.take_reader()
    }

    fn open_output_stream(&mut self) -> Result<Self::Writer, TransportError> {
        self.halves.take_writer()
    }

    fn remote_peer(&self) -> Result<BluezPeer, TransportError> {
        Ok(BluezPeer::new(self.peer.clone()))
    }
}

#[async_trait]
impl Connector for BluezTransport {
    type Connection = BluezConnection;

    async fn open(&self, address: &str) -> Result<BluezConnection, TransportError> {
        let (addr, channel) = match address.parse::<PeerAddress>() {
            Ok(PeerAddress::Rfcomm { address, channel }) => (Address::new(address), channel),
            Ok(other) => {
                return Err(TransportError::InvalidAddress(format!(
                    "{} needs the tcp backend",
                    other
                )))
            }
            Err(e) => return Err(TransportError::InvalidAddress(e.to_string())),
        };
        let stream = Stream::connect(SocketAddr::new(addr, channel)).await?;
        debug!(%addr, channel, "rfcomm connected");
        let peer = self.adapter.device(addr).map_err(backend)?;
        let (reader, writer) = tokio::io::split(stream);
        Ok(BluezConnection {
            halves: StreamHalves::new(reader, writer),
            peer,
        })
    }
}
