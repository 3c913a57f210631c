//! Transport seams: the narrow view of the wireless stack that discovery and sessions use.
//! Backends (BlueZ, TCP, in-memory) implement these; the core never touches sockets directly.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::discovery::DiscoverySink;

/// Inquiry access code used when starting a discovery round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryScope {
    /// General/unlimited inquiry (GIAC): every discoverable device answers.
    GeneralUnlimited,
}

impl InquiryScope {
    /// Lower address part of the inquiry access code.
    pub fn access_code(self) -> u32 {
        match self {
            InquiryScope::GeneralUnlimited => 0x9E8B33,
        }
    }
}

/// Class of device as reported with an inquiry result (24-bit CoD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceClass(pub u32);

impl DeviceClass {
    /// Major device class (bits 8..13), e.g. 0x01 computer, 0x02 phone.
    pub fn major(self) -> u8 {
        ((self.0 >> 8) & 0x1F) as u8
    }

    /// Minor device class (bits 2..8).
    pub fn minor(self) -> u8 {
        ((self.0 >> 2) & 0x3F) as u8
    }
}

/// Something with a Bluetooth identity: the local adapter or a remote peer.
/// The address is always known; the friendly name needs a query that can fail.
#[async_trait]
pub trait Device: Send + Sync {
    fn address(&self) -> String;

    async fn friendly_name(&self) -> Result<String, TransportError>;
}

/// Starts inquiries and reports results to a [`DiscoverySink`] from its own task.
#[async_trait]
pub trait DiscoveryAgent: Send + Sync {
    type Peer: Device + 'static;

    /// Begin an inquiry. Returning `Ok` means the sink now belongs to the transport, which
    /// reports devices and eventually calls [`DiscoverySink::inquiry_completed`].
    async fn start_inquiry(
        &self,
        scope: InquiryScope,
        sink: DiscoverySink<Self::Peer>,
    ) -> Result<(), TransportError>;
}

/// Opens stream connections from an address string such as `btspp://98D3318041DE:1`.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: StreamConnection;

    async fn open(&self, address: &str) -> Result<Self::Connection, TransportError>;
}

/// An established duplex connection. Each half can be opened once; whoever opens it owns it.
pub trait StreamConnection: Send + 'static {
    type Reader: AsyncRead + Send + Unpin + 'static;
    type Writer: AsyncWrite + Send + Unpin + 'static;
    type Peer: Device + 'static;

    fn open_input_stream(&mut self) -> Result<Self::Reader, TransportError>;

    fn open_output_stream(&mut self) -> Result<Self::Writer, TransportError>;

    /// Handle on the device at the other end of this connection.
    fn remote_peer(&self) -> Result<Self::Peer, TransportError>;
}

/// Read and write halves of a split stream, handed out at most once each.
/// Backends wrap `into_split()` results in this to implement [`StreamConnection`].
#[derive(Debug)]
pub struct StreamHalves<R, W> {
    reader: Option<R>,
    writer: Option<W>,
}

impl<R, W> StreamHalves<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    pub fn take_reader(&mut self) -> Result<R, TransportError> {
        self.reader.take().ok_or(TransportError::StreamTaken("input"))
    }

    pub fn take_writer(&mut self) -> Result<W, TransportError> {
        self.writer.take().ok_or(TransportError::StreamTaken("output"))
    }
}

/// Errors raised by transport backends.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("no friendly name for device {0}")]
    NameUnavailable(String),
    #[error("{0} stream already opened")]
    StreamTaken(&'static str),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend error: {0}")]
    Backend(String),
}
