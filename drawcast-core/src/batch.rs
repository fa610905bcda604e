//! Update-PDU batching.
//!
//! Orders accumulate in one buffer behind an 8-byte orders header whose
//! count is back-patched when the PDU is finished. Batches nest: only
//! the outermost [`close`](PacketBatcher::close) sends. An order that
//! might not fit the remaining budget first pushes the current PDU out
//! and starts a new one at depth 1, as an explicit force-flush followed
//! by a fresh open would.

use tracing::debug;

use crate::error::OrderError;
use crate::stream::{OutputBuffer, Placeholder};
use crate::transport::{DataPduType, MAX_PDU_SIZE, PduTransport, UPDATE_ORDERS};

// ── BatchLimits ──────────────────────────────────────────────────

/// Size budget for one update PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Buffer size the transport works with, header included.
    pub buffer_size: usize,
    /// Largest orders payload a PDU may carry; no single order may exceed it.
    pub payload_ceiling: usize,
    /// Slack kept free on top of an order's worst-case size.
    pub headroom: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            buffer_size: MAX_PDU_SIZE,
            payload_ceiling: 8000,
            headroom: 100,
        }
    }
}

impl BatchLimits {
    /// Shrink to fit a transport that accepts at most `max_pdu` bytes,
    /// keeping the same margin between buffer size and payload ceiling.
    pub fn clamped_to(self, max_pdu: usize) -> Self {
        if max_pdu >= self.buffer_size {
            return self;
        }
        let margin = self.buffer_size.saturating_sub(self.payload_ceiling);
        Self {
            buffer_size: max_pdu,
            payload_ceiling: self.payload_ceiling.min(max_pdu.saturating_sub(margin)),
            ..self
        }
    }
}

// ── BatchState ───────────────────────────────────────────────────

/// Nesting state of the current PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Closed,
    /// `depth` is at least 1.
    Open { depth: u32 },
}

// ── PacketBatcher ────────────────────────────────────────────────

/// Owns the PDU buffer and the transport it is flushed to.
pub struct PacketBatcher<T> {
    out: OutputBuffer,
    transport: T,
    limits: BatchLimits,
    state: BatchState,
    count_at: Option<Placeholder>,
    order_count: u16,
    pdus_sent: u64,
}

impl<T: PduTransport> PacketBatcher<T> {
    /// `limits` are narrowed to the transport's
    /// [`max_pdu_size`](PduTransport::max_pdu_size) when that is smaller.
    pub fn new(transport: T, limits: BatchLimits) -> Self {
        let max_pdu = transport.max_pdu_size();
        let clamped = limits.clamped_to(max_pdu);
        if clamped != limits {
            debug!(
                max_pdu,
                payload_ceiling = clamped.payload_ceiling,
                "batch limits narrowed to transport"
            );
        }
        let limits = clamped;
        Self {
            out: OutputBuffer::with_capacity(limits.buffer_size),
            transport,
            limits,
            state: BatchState::Closed,
            count_at: None,
            order_count: 0,
            pdus_sent: 0,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, BatchState::Open { .. })
    }

    /// Orders written into the current PDU.
    pub fn order_count(&self) -> u16 {
        self.order_count
    }

    /// PDUs handed to the transport so far.
    pub fn pdus_sent(&self) -> u64 {
        self.pdus_sent
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Buffer the current order is written into.
    pub fn out(&mut self) -> &mut OutputBuffer {
        &mut self.out
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Count one more order in the current PDU.
    pub fn count_order(&mut self) {
        self.order_count = self.order_count.wrapping_add(1);
    }

    /// Open a batch, or nest one level deeper in the open one.
    pub fn open(&mut self) -> Result<(), OrderError> {
        match self.state {
            BatchState::Closed => {
                self.start_pdu()?;
                self.state = BatchState::Open { depth: 1 };
            }
            BatchState::Open { depth } => {
                self.state = BatchState::Open { depth: depth + 1 };
            }
        }
        Ok(())
    }

    /// Leave one nesting level; leaving the last one sends the PDU.
    pub fn close(&mut self) -> Result<(), OrderError> {
        match self.state {
            BatchState::Closed => Ok(()),
            BatchState::Open { depth } if depth > 1 => {
                self.state = BatchState::Open { depth: depth - 1 };
                Ok(())
            }
            BatchState::Open { .. } => {
                self.state = BatchState::Closed;
                self.finish_pdu()
            }
        }
    }

    /// Send whatever the current PDU holds, regardless of nesting, and
    /// return to `Closed`. A PDU without orders is dropped, not sent.
    pub fn force_flush(&mut self) -> Result<(), OrderError> {
        let result = if self.is_open() && self.order_count > 0 {
            self.finish_pdu()
        } else {
            self.out.discard();
            Ok(())
        };
        self.state = BatchState::Closed;
        self.count_at = None;
        self.order_count = 0;
        result
    }

    /// Make sure an order of up to `worst_case` bytes can be written
    /// into an open PDU, opening or rolling over as needed.
    pub fn ensure_open_and_sized(&mut self, worst_case: usize) -> Result<(), OrderError> {
        if worst_case > self.limits.payload_ceiling {
            return Err(OrderError::OrderTooLarge {
                size: worst_case,
                max: self.limits.payload_ceiling,
            });
        }

        if !self.is_open() {
            return self.open();
        }

        let used = self.used();
        if used < 0 || used as usize > self.limits.buffer_size {
            return Err(OrderError::BatchCorrupt { used });
        }
        if used as usize + worst_case + self.limits.headroom > self.limits.payload_ceiling {
            debug!(
                orders = self.order_count,
                used,
                worst_case,
                "update pdu full; rolling over"
            );
            self.force_flush()?;
            self.open()?;
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Bytes written since the order-count placeholder.
    fn used(&self) -> isize {
        match self.count_at {
            Some(ph) => self.out.len() as isize - ph.offset() as isize,
            None => -1,
        }
    }

    fn start_pdu(&mut self) -> Result<(), OrderError> {
        self.out.discard();
        self.transport.begin_pdu(&mut self.out)?;
        self.out.put_u16_le(UPDATE_ORDERS);
        self.out.put_zeros(2);
        self.count_at = Some(self.out.reserve(2));
        self.out.put_zeros(2);
        self.order_count = 0;
        Ok(())
    }

    fn finish_pdu(&mut self) -> Result<(), OrderError> {
        let count_at = self
            .count_at
            .take()
            .ok_or(OrderError::BatchCorrupt { used: -1 })?;
        self.out.mark_end();
        self.out.patch(count_at, u32::from(self.order_count))?;
        debug!(
            orders = self.order_count,
            bytes = self.out.len(),
            "sending update pdu"
        );
        self.transport.send_pdu(&mut self.out, DataPduType::Update)?;
        self.pdus_sent += 1;
        self.order_count = 0;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
