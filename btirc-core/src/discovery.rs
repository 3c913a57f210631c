//! Discovery coordinator: run one inquiry round, print every device the transport reports,
//! and return to the caller only once the transport says the round is over.
//!
//! The transport pushes events into a [`DiscoverySink`] from its own task. Events are buffered
//! in an unbounded channel, so a completion that lands before the caller starts waiting is not
//! lost.

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::identity;
use crate::transcript::Transcript;
use crate::transport::{Device, DeviceClass, DiscoveryAgent, InquiryScope, TransportError};

/// Inquiry status: round ran to completion.
pub const INQUIRY_COMPLETED: i32 = 0x00;
/// Inquiry status: round stopped on a transport error.
pub const INQUIRY_ERROR: i32 = 0x07;

/// Events produced by the transport during an inquiry.
#[derive(Debug)]
pub enum DiscoveryEvent<P> {
    DeviceFound { peer: P, class: DeviceClass },
    ServicesDiscovered { transaction_id: u32, records: usize },
    ServiceSearchCompleted { transaction_id: u32, response_code: i32 },
    InquiryCompleted { status: i32 },
}

/// Callback side of an inquiry, owned by the transport for the length of the round.
/// [`DiscoverySink::inquiry_completed`] consumes the sink: one terminal event per inquiry.
pub struct DiscoverySink<P> {
    tx: mpsc::UnboundedSender<DiscoveryEvent<P>>,
}

impl<P> DiscoverySink<P> {
    /// A device answered the inquiry.
    pub fn device_found(&self, peer: P, class: DeviceClass) {
        self.send(DiscoveryEvent::DeviceFound { peer, class });
    }

    /// Service records found by a service search. Not acted on.
    pub fn services_discovered(&self, transaction_id: u32, records: usize) {
        self.send(DiscoveryEvent::ServicesDiscovered {
            transaction_id,
            records,
        });
    }

    /// A service search finished. Not acted on.
    pub fn service_search_completed(&self, transaction_id: u32, response_code: i32) {
        self.send(DiscoveryEvent::ServiceSearchCompleted {
            transaction_id,
            response_code,
        });
    }

    /// The inquiry round is over.
    pub fn inquiry_completed(self, status: i32) {
        self.send(DiscoveryEvent::InquiryCompleted { status });
    }

    fn send(&self, event: DiscoveryEvent<P>) {
        // Receiver gone means the coordinator already finished; late events are moot.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Scanning,
    Done,
}

/// What one inquiry round produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub devices: usize,
    pub status: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("could not start inquiry: {0}")]
    Start(#[source] TransportError),
    #[error("transport dropped the inquiry before it completed")]
    InquiryAborted,
    #[error("discovery already ran")]
    AlreadyRan,
}

/// Single-shot discovery: `Idle -> Scanning -> Done`.
pub struct DiscoveryCoordinator {
    transcript: Transcript,
    state: DiscoveryState,
}

impl DiscoveryCoordinator {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            state: DiscoveryState::Idle,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Start a general inquiry and wait for it to complete. Zero devices is a normal outcome.
    pub async fn start_discovery<A: DiscoveryAgent>(
        &mut self,
        agent: &A,
    ) -> Result<DiscoverySummary, DiscoveryError> {
        if self.state != DiscoveryState::Idle {
            return Err(DiscoveryError::AlreadyRan);
        }
        self.transcript.line("Starting device discovery...");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let scope = InquiryScope::GeneralUnlimited;
        agent
            .start_inquiry(scope, DiscoverySink { tx })
            .await
            .map_err(DiscoveryError::Start)?;
        self.state = DiscoveryState::Scanning;
        debug!(access_code = scope.access_code(), "inquiry started");

        let mut devices = 0;
        while let Some(event) = rx.recv().await {
            match event {
                DiscoveryEvent::DeviceFound { peer, class } => {
                    devices += 1;
                    self.report_device(&peer, class).await;
                }
                DiscoveryEvent::ServicesDiscovered { transaction_id, .. }
                | DiscoveryEvent::ServiceSearchCompleted { transaction_id, .. } => {
                    trace!(transaction_id, "ignoring service discovery event");
                }
                DiscoveryEvent::InquiryCompleted { status } => {
                    self.transcript.line("Device discovery completed!");
                    self.state = DiscoveryState::Done;
                    debug!(devices, status, "inquiry completed");
                    return Ok(DiscoverySummary { devices, status });
                }
            }
        }
        self.state = DiscoveryState::Done;
        Err(DiscoveryError::InquiryAborted)
    }

    async fn report_device<P: Device>(&self, peer: &P, class: DeviceClass) {
        let id = identity::resolve(peer).await;
        match &id.name {
            Ok(name) => {
                debug!(address = %id.address, major_class = class.major(), "device found");
                self.transcript
                    .line(format!("New device discovered: [{} - {}]", id.address, name));
            }
            Err(e) => {
                warn!(address = %id.address, error = %e, "name lookup failed");
                self.transcript.error(format!(
                    "Error while retrieving name for device [{}]",
                    id.address
                ));
            }
        }
    }
}
