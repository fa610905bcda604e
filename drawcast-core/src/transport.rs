//! Transport collaborator: receives finished update PDUs.
//!
//! The encoder never frames or segments anything itself. A transport
//! may reserve its own header at the start of every fresh buffer in
//! [`begin_pdu`](PduTransport::begin_pdu) and complete it in
//! [`send_pdu`](PduTransport::send_pdu); the orders payload sits in
//! between.
//!
//! [`ChannelTransport`] hands each PDU to a Tokio channel, which is how
//! a session worker passes them to the connection task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::stream::OutputBuffer;

// ── Constants ────────────────────────────────────────────────────

/// Largest PDU the legacy transport carries, header included.
pub const MAX_PDU_SIZE: usize = 8192;

// ── DataPduType ──────────────────────────────────────────────────

/// Share-data PDU type a finished buffer is sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataPduType {
    Update = 2,
}

/// Update type written at the head of an orders payload.
pub const UPDATE_ORDERS: u16 = 0;

// ── UpdatePdu ────────────────────────────────────────────────────

/// A finished PDU as delivered by [`ChannelTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePdu {
    pub pdu_type: DataPduType,
    pub payload: Bytes,
}

impl UpdatePdu {
    /// Order count recorded in an orders update header, if present.
    pub fn order_count(&self) -> Option<u16> {
        let head = self.payload.get(..6)?;
        if u16::from_le_bytes([head[0], head[1]]) != UPDATE_ORDERS {
            return None;
        }
        Some(u16::from_le_bytes([head[4], head[5]]))
    }

    /// Bytes following the 8-byte orders update header.
    pub fn orders(&self) -> &[u8] {
        self.payload.get(8..).unwrap_or_default()
    }
}

// ── PduTransport ─────────────────────────────────────────────────

/// Outbound half of the connection, as seen by the encoder.
pub trait PduTransport {
    /// Prepare an empty buffer for a new PDU, e.g. by reserving header
    /// space. The default reserves nothing.
    fn begin_pdu(&mut self, _out: &mut OutputBuffer) -> Result<(), TransportError> {
        Ok(())
    }

    /// Deliver the finished PDU held in `out`, leaving `out` empty.
    fn send_pdu(&mut self, out: &mut OutputBuffer, pdu_type: DataPduType)
    -> Result<(), TransportError>;

    /// Largest PDU the transport accepts, header included.
    fn max_pdu_size(&self) -> usize {
        MAX_PDU_SIZE
    }
}

// ── ChannelTransport ─────────────────────────────────────────────

/// Transport that forwards every PDU over an unbounded Tokio channel.
///
/// Sending never blocks, so the encoder stays synchronous. A dropped
/// receiver shows up as [`TransportError::Disconnected`].
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<UpdatePdu>,
    /// Total payload bytes handed off since construction.
    bytes_sent: Arc<AtomicU64>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<UpdatePdu>) -> Self {
        Self {
            tx,
            bytes_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Transport plus the receiving end, for callers that own both.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<UpdatePdu>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Total bytes sent across all PDUs.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

impl PduTransport for ChannelTransport {
    fn send_pdu(
        &mut self,
        out: &mut OutputBuffer,
        pdu_type: DataPduType,
    ) -> Result<(), TransportError> {
        let payload = out.take();
        let len = payload.len() as u64;
        self.tx
            .send(UpdatePdu { pdu_type, payload })
            .map_err(|_| TransportError::Disconnected)?;
        self.bytes_sent.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_transport_delivers_payload() {
        let (mut transport, mut rx) = ChannelTransport::pair();
        let mut out = OutputBuffer::with_capacity(16);
        out.put_slice(&[0, 0, 0, 0, 3, 0, 0, 0, 0xAA]);

        transport.send_pdu(&mut out, DataPduType::Update).unwrap();

        let pdu = rx.try_recv().unwrap();
        assert_eq!(pdu.pdu_type, DataPduType::Update);
        assert_eq!(pdu.order_count(), Some(3));
        assert_eq!(pdu.orders(), &[0xAA]);
        assert_eq!(transport.bytes_sent(), 9);
        assert!(out.is_empty());
    }

    #[test]
    fn dropped_receiver_is_disconnected() {
        let (mut transport, rx) = ChannelTransport::pair();
        drop(rx);
        let mut out = OutputBuffer::with_capacity(4);
        out.put_u8(1);
        assert!(matches!(
            transport.send_pdu(&mut out, DataPduType::Update),
            Err(TransportError::Disconnected)
        ));
        assert_eq!(transport.bytes_sent(), 0);
    }

    #[test]
    fn short_payload_has_no_count() {
        let pdu = UpdatePdu {
            pdu_type: DataPduType::Update,
            payload: Bytes::from_static(&[0, 0, 0]),
        };
        assert_eq!(pdu.order_count(), None);
        assert!(pdu.orders().is_empty());
    }
}
