//! Feeds a script through a session worker and reports every update
//! PDU that comes out.

use std::fmt::Write as _;

use drawcast_core::{
    ChannelTransport, OrderError, OrderSession, SessionHandle, SessionStats, StopHandle,
    UpdatePdu,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ReplayConfig;
use crate::script::Script;

// ── ReplayReport ─────────────────────────────────────────────────

/// What a replay produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub session: SessionStats,
    /// PDUs received from the transport.
    pub pdus: u64,
    /// Orders counted across those PDUs.
    pub orders: u64,
    /// Payload bytes across those PDUs.
    pub bytes: u64,
}

// ── Replay ───────────────────────────────────────────────────────

/// A session worker plus the task draining its PDUs.
pub struct Replay {
    session: OrderSession<ChannelTransport>,
    handle: SessionHandle,
    pdus: mpsc::UnboundedReceiver<UpdatePdu>,
    hex_preview: usize,
}

impl Replay {
    pub fn new(config: &ReplayConfig) -> Self {
        let (transport, pdus) = ChannelTransport::pair();
        let (session, handle) = OrderSession::new(transport, config.to_session_config());
        Self {
            session,
            handle,
            pdus,
            hex_preview: config.output.hex_preview,
        }
    }

    /// A handle for stopping the replay from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.handle.stop_handle()
    }

    /// Run `script` to completion.
    pub async fn run(self, script: Script) -> Result<ReplayReport, OrderError> {
        let Self {
            session,
            handle,
            pdus,
            hex_preview,
        } = self;

        let worker = tokio::spawn(session.run());
        let consumer = tokio::spawn(consume(pdus, hex_preview));

        for op in script.ops {
            if handle.send(op.into_command()).await.is_err() {
                // The worker stopped early; its result says why.
                break;
            }
        }
        drop(handle);

        let session = worker
            .await
            .map_err(|e| OrderError::Other(format!("session worker failed: {e}")))??;
        let mut report = consumer
            .await
            .map_err(|e| OrderError::Other(format!("pdu consumer failed: {e}")))?;
        report.session = session;
        Ok(report)
    }
}

/// Log each PDU until the transport side closes.
async fn consume(mut pdus: mpsc::UnboundedReceiver<UpdatePdu>, hex_preview: usize) -> ReplayReport {
    let mut report = ReplayReport::default();
    while let Some(pdu) = pdus.recv().await {
        let orders = pdu.order_count().unwrap_or(0);
        report.pdus += 1;
        report.orders += u64::from(orders);
        report.bytes += pdu.payload.len() as u64;

        info!(
            pdu = report.pdus,
            bytes = pdu.payload.len(),
            orders,
            "update pdu"
        );
        if hex_preview > 0 {
            debug!("  {}", hex_preview_of(&pdu.payload, hex_preview));
        }
    }
    report
}

/// Space-separated hex of the first `max` bytes, with an ellipsis when
/// the input is longer.
pub fn hex_preview_of(bytes: &[u8], max: usize) -> String {
    let mut out = String::with_capacity(max.min(bytes.len()) * 3 + 3);
    for (i, b) in bytes.iter().take(max).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{b:02x}");
    }
    if bytes.len() > max {
        out.push_str(" ..");
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────
