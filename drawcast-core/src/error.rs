//! Domain-specific error types for the drawing-order encoder.
//!
//! All fallible operations return `Result<T, OrderError>`.
//! Nothing is retried internally; every failure reaches the caller,
//! which decides whether to redraw, drop the update, or end the session.

use thiserror::Error;

/// The canonical error type for order encoding.
#[derive(Debug, Error)]
pub enum OrderError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The transport collaborator refused or failed to deliver a PDU.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The channel feeding a session worker was closed.
    #[error("channel closed")]
    ChannelClosed,

    // ── Sizing Errors ────────────────────────────────────────────
    /// A single order can never fit in one update PDU.
    #[error("order too large: {size} bytes (max {max})")]
    OrderTooLarge { size: usize, max: usize },

    /// The open batch reports a size that cannot be real.
    #[error("batch corrupt: {used} bytes in use")]
    BatchCorrupt { used: isize },

    /// A placeholder was back-patched after its buffer was sent.
    #[error("stale placeholder at offset {offset}")]
    StalePlaceholder { offset: usize },

    // ── Bitmap Errors ────────────────────────────────────────────
    /// The compressor encoded fewer rows than the bitmap has.
    #[error("compression shortfall: expected {expected} rows, got {actual}")]
    CompressionShortfall { expected: usize, actual: usize },

    /// A bitmap exceeds the largest cacheable tile.
    #[error("bitmap {width}x{height} exceeds {max}x{max} cache tile")]
    BitmapTooLarge { width: u32, height: u32, max: u32 },

    /// Pixels must be one, two or three bytes wide.
    #[error("unsupported bitmap depth: {0} bpp")]
    UnsupportedDepth(u8),

    /// The compressor itself failed.
    #[error("compression failed: {0}")]
    Compression(String),

    /// A compressed bitmap was requested but no compressor is attached.
    #[error("no bitmap compressor attached")]
    CompressorUnavailable,

    // ── Payload Errors ───────────────────────────────────────────
    /// Text runs carry a one-byte length.
    #[error("text run too long: {0} bytes (max 255)")]
    TextTooLong(usize),

    /// Glyph bytes exceed the size implied by its geometry.
    #[error("glyph data too large: {actual} bytes (max {max})")]
    GlyphTooLarge { actual: usize, max: usize },

    // ── Session Errors ───────────────────────────────────────────
    /// An earlier failure left the output stream in an unknown state.
    #[error("session failed; encoder must be torn down")]
    SessionFailed,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── TransportError ────────────────────────────────────────────────

/// Typed error reported by a [`PduTransport`](crate::transport::PduTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The receiving side of the PDU channel is gone.
    #[error("pdu receiver dropped")]
    Disconnected,

    /// The underlying I/O layer reported an error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic transport failure with a human-readable message.
    #[error("transport failed: {0}")]
    Failed(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for OrderError {
    fn from(s: String) -> Self {
        OrderError::Other(s)
    }
}

impl From<&str> for OrderError {
    fn from(s: &str) -> Self {
        OrderError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for OrderError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        OrderError::ChannelClosed
    }
}

impl OrderError {
    /// Whether this error leaves the wire stream out of step with the
    /// encoder's cached state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrderError::Transport(_)
                | OrderError::BatchCorrupt { .. }
                | OrderError::StalePlaceholder { .. }
                | OrderError::SessionFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = OrderError::OrderTooLarge {
            size: 9000,
            max: 8000,
        };
        assert!(e.to_string().contains("9000"));
        assert!(e.to_string().contains("8000"));

        let e = OrderError::CompressionShortfall {
            expected: 64,
            actual: 12,
        };
        assert!(e.to_string().contains("64"));
        assert!(e.to_string().contains("12"));
    }

    #[test]
    fn from_string() {
        let e: OrderError = "something broke".into();
        assert!(matches!(e, OrderError::Other(_)));
    }

    #[test]
    fn from_transport_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: OrderError = TransportError::from(io_err).into();
        assert!(matches!(e, OrderError::Transport(TransportError::Io(_))));
        assert!(e.is_fatal());
    }

    #[test]
    fn bitmap_errors_are_not_fatal() {
        let e = OrderError::BitmapTooLarge {
            width: 65,
            height: 10,
            max: 64,
        };
        assert!(!e.is_fatal());
        assert!(!OrderError::TextTooLong(300).is_fatal());
        assert!(!OrderError::UnsupportedDepth(32).is_fatal());
    }
}
