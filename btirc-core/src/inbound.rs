//! Inbound stream logger: owns the read side of a session and prints whatever the peer sends.
//! A failed read costs one error line and the loop carries on; only end of stream stops it.

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec;
use crate::config::Config;
use crate::identity;
use crate::transcript::Transcript;
use crate::transport::{StreamConnection, TransportError};

pub const SETUP_FAILED: &str = "Listening service failed. Incoming messages won't be displayed.";
pub const READ_FAILED: &str = "Error while reading the incoming message.";

/// Counters for a logger run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundStats {
    pub messages: usize,
    pub read_errors: usize,
}

/// How the logger ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundExit {
    /// Could not open the input stream or identify the peer; nothing was read.
    SetupFailed,
    /// Peer closed the stream.
    Closed(InboundStats),
}

/// Run the logger on its own task.
pub fn spawn_inbound<C: StreamConnection>(
    connection: C,
    transcript: Transcript,
    config: Config,
) -> JoinHandle<InboundExit> {
    tokio::spawn(run_inbound(connection, transcript, config))
}

/// Read from `connection` until the peer closes it, one transcript line per chunk read.
pub async fn run_inbound<C: StreamConnection>(
    mut connection: C,
    transcript: Transcript,
    config: Config,
) -> InboundExit {
    let (mut reader, peer) = match open_reader(&mut connection) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "inbound setup failed");
            transcript.error(SETUP_FAILED);
            return InboundExit::SetupFailed;
        }
    };

    let id = identity::resolve(&peer).await;
    if let Err(e) = &id.name {
        warn!(address = %id.address, error = %e, "peer name unavailable, labelling by address");
    }
    let label = id.label();

    let backoff = config.read_retry_backoff();
    let mut buf = vec![0u8; config.chunk_size()];
    let mut stats = InboundStats::default();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(address = %id.address, ?stats, "peer closed the stream");
                return InboundExit::Closed(stats);
            }
            Ok(n) => {
                stats.messages += 1;
                let text = codec::decode_chunk(&buf[..n]);
                transcript.line(format!("[{}]: {}", label, text));
            }
            Err(e) => {
                stats.read_errors += 1;
                warn!(address = %id.address, error = %e, "incoming read failed");
                transcript.error(READ_FAILED);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn open_reader<C: StreamConnection>(
    connection: &mut C,
) -> Result<(C::Reader, C::Peer), TransportError> {
    let reader = connection.open_input_stream()?;
    let peer = connection.remote_peer()?;
    Ok((reader, peer))
}
