//! In-memory transport used by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use crate::discovery::DiscoverySink;
use crate::transport::{
    Connector, Device, DeviceClass, DiscoveryAgent, InquiryScope, StreamConnection, StreamHalves,
    TransportError,
};

#[derive(Debug, Clone)]
pub(crate) struct MockDevice {
    address: String,
    name: Option<String>,
}

impl MockDevice {
    pub(crate) fn named(address: &str, name: &str) -> Self {
        Self {
            address: address.to_string(),
            name: Some(name.to_string()),
        }
    }

    pub(crate) fn nameless(address: &str) -> Self {
        Self {
            address: address.to_string(),
            name: None,
        }
    }
}

#[async_trait]
impl Device for MockDevice {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn friendly_name(&self) -> Result<String, TransportError> {
        self.name
            .clone()
            .ok_or_else(|| TransportError::NameUnavailable(self.address.clone()))
    }
}

/// One scripted transport action during an inquiry.
pub(crate) enum Step {
    Found(MockDevice, u32),
    Services(u32, usize),
    ServiceSearch(u32, i32),
    /// Block until the test releases the gate.
    Wait,
    Complete(i32),
    /// Drop the sink without completing.
    Drop,
}

pub(crate) struct ScriptedAgent {
    steps: Mutex<Option<Vec<Step>>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    inline: bool,
    unavailable: bool,
}

impl ScriptedAgent {
    fn build(steps: Vec<Step>, inline: bool) -> Self {
        Self {
            steps: Mutex::new(Some(steps)),
            gate: Mutex::new(None),
            inline,
            unavailable: false,
        }
    }

    /// Delivers the script from a separate task, like a real transport.
    pub(crate) fn spawned(steps: Vec<Step>) -> Self {
        Self::build(steps, false)
    }

    /// Delivers the whole script before `start_inquiry` returns.
    pub(crate) fn inline(steps: Vec<Step>) -> Self {
        Self::build(steps, true)
    }

    /// Spawned script whose `Step::Wait` blocks until the returned sender fires.
    pub(crate) fn gated(steps: Vec<Step>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let agent = Self::build(steps, false);
        *agent.gate.lock().unwrap() = Some(rx);
        (agent, tx)
    }

    pub(crate) fn unavailable() -> Self {
        let mut agent = Self::build(Vec::new(), true);
        agent.unavailable = true;
        agent
    }
}

async fn play(
    steps: Vec<Step>,
    sink: DiscoverySink<MockDevice>,
    mut gate: Option<oneshot::Receiver<()>>,
) {
    let mut sink = Some(sink);
    for step in steps {
        match step {
            Step::Found(dev, class) => {
                if let Some(s) = &sink {
                    s.device_found(dev, DeviceClass(class));
                }
            }
            Step::Services(id, n) => {
                if let Some(s) = &sink {
                    s.services_discovered(id, n);
                }
            }
            Step::ServiceSearch(id, code) => {
                if let Some(s) = &sink {
                    s.service_search_completed(id, code);
                }
            }
            Step::Wait => {
                if let Some(g) = gate.take() {
                    let _ = g.await;
                }
            }
            Step::Complete(status) => {
                if let Some(s) = sink.take() {
                    s.inquiry_completed(status);
                }
            }
            Step::Drop => {
                sink.take();
            }
        }
    }
}

#[async_trait]
impl DiscoveryAgent for ScriptedAgent {
    type Peer = MockDevice;

    async fn start_inquiry(
        &self,
        scope: InquiryScope,
        sink: DiscoverySink<MockDevice>,
    ) -> Result<(), TransportError> {
        assert_eq!(scope, InquiryScope::GeneralUnlimited);
        if self.unavailable {
            return Err(TransportError::Unavailable("no adapter".into()));
        }
        let steps = self.steps.lock().unwrap().take().unwrap_or_default();
        let gate = self.gate.lock().unwrap().take();
        if self.inline {
            play(steps, sink, gate).await;
        } else {
            tokio::spawn(play(steps, sink, gate));
        }
        Ok(())
    }
}

/// Connection over arbitrary reader/writer halves, e.g. `tokio_test::io::Mock`.
pub(crate) struct MockConnection<R, W> {
    halves: StreamHalves<R, W>,
    peer: Option<MockDevice>,
    input_broken: bool,
}

impl<R, W> MockConnection<R, W> {
    pub(crate) fn new(reader: R, writer: W, peer: MockDevice) -> Self {
        Self {
            halves: StreamHalves::new(reader, writer),
            peer: Some(peer),
            input_broken: false,
        }
    }

    /// Input stream cannot be opened.
    pub(crate) fn without_input(mut self) -> Self {
        self.input_broken = true;
        self
    }

    /// Remote device handle cannot be obtained.
    pub(crate) fn without_peer(mut self) -> Self {
        self.peer = None;
        self
    }
}

impl<R, W> StreamConnection for MockConnection<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    type Reader = R;
    type Writer = W;
    type Peer = MockDevice;

    fn open_input_stream(&mut self) -> Result<R, TransportError> {
        if self.input_broken {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "input stream unavailable",
            )));
        }
        self.halves.take_reader()
    }

    fn open_output_stream(&mut self) -> Result<W, TransportError> {
        self.halves.take_writer()
    }

    fn remote_peer(&self) -> Result<MockDevice, TransportError> {
        self.peer
            .clone()
            .ok_or_else(|| TransportError::Unavailable("remote device unknown".into()))
    }
}

/// Hands out one prepared connection; every other open is refused.
pub(crate) struct MockConnector<C> {
    connection: Mutex<Option<C>>,
    pub(crate) opened: Mutex<Vec<String>>,
}

impl<C> MockConnector<C> {
    pub(crate) fn with(connection: C) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            connection: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl<C: StreamConnection> Connector for MockConnector<C> {
    type Connection = C;

    async fn open(&self, address: &str) -> Result<C, TransportError> {
        self.opened.lock().unwrap().push(address.to_string());
        self.connection.lock().unwrap().take().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}
