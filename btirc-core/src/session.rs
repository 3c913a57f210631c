//! Session driver: connect to a peer, start the inbound logger, then send operator lines.
//!
//! Failure policy is asymmetric: the inbound side survives read errors, while a failed connect
//! or write ends the session with an error the entry point turns into a non-zero exit.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::codec;
use crate::config::Config;
use crate::identity;
use crate::inbound::{self, InboundExit};
use crate::transcript::Transcript;
use crate::transport::{Connector, Device, StreamConnection, TransportError};

/// A session that ended because local input ran out.
#[derive(Debug)]
pub struct SessionEnd {
    pub lines_sent: usize,
    /// Inbound logger task, still running unless the peer closed the stream.
    pub inbound: JoinHandle<InboundExit>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not open connection to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("could not open output stream: {0}")]
    OutputStream(#[source] TransportError),
    #[error("reading local input failed: {0}")]
    Input(#[source] std::io::Error),
    #[error("sending message failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Open a connection to `address` and chat over it until `input` is exhausted.
///
/// On connect failure prints `Could not open connection to address: <address>` and returns
/// [`SessionError::Connect`] without reading any input.
pub async fn open_connection<K, L, I>(
    connector: &K,
    local: &L,
    address: &str,
    input: I,
    transcript: Transcript,
    config: Config,
) -> Result<SessionEnd, SessionError>
where
    K: Connector,
    L: Device + ?Sized,
    I: AsyncBufRead + Unpin,
{
    let mut connection = match connector.open(address).await {
        Ok(c) => c,
        Err(source) => {
            transcript.error(format!("Could not open connection to address: {}", address));
            return Err(SessionError::Connect {
                address: address.to_string(),
                source,
            });
        }
    };
    info!(address, "connection opened");

    let mut output = connection
        .open_output_stream()
        .map_err(SessionError::OutputStream)?;
    let inbound = inbound::spawn_inbound(connection, transcript.clone(), config);

    transcript.line(format!(
        "Connection opened, type in console and press enter to send a message to: {}",
        address
    ));

    let lines_sent = send_lines(&mut output, input, local, &transcript).await?;
    debug!(lines_sent, "local input closed, ending session");
    Ok(SessionEnd {
        lines_sent,
        inbound,
    })
}

async fn send_lines<W, I, L>(
    output: &mut W,
    mut input: I,
    local: &L,
    transcript: &Transcript,
) -> Result<usize, SessionError>
where
    W: AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    L: Device + ?Sized,
{
    let mut raw = Vec::new();
    let mut sent = 0;
    loop {
        raw.clear();
        if input
            .read_until(b'\n', &mut raw)
            .await
            .map_err(SessionError::Input)?
            == 0
        {
            break;
        }
        let line = codec::decode_input_line(&raw);
        output
            .write_all(&codec::encode_line(&line))
            .await
            .map_err(SessionError::Write)?;
        output.flush().await.map_err(SessionError::Write)?;
        sent += 1;

        let me = identity::resolve(local).await;
        if let Err(e) = &me.name {
            debug!(address = %me.address, error = %e, "local name unavailable");
        }
        transcript.line(format!("[{}]: {}", me.label(), line));
    }
    Ok(sent)
}
