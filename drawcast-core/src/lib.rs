//! # drawcast-core
//!
//! Stateful drawing-order encoder for the legacy RDP update channel.
//!
//! This crate contains:
//! - **Types**: `Rect`, `Color`, `Brush`, `Pen`, the per-kind order structs, cache payloads
//! - **Flags**: `OrderFlags`, `BoundsFlags` and one present bit-set per primary order kind
//! - **State**: `OrderState`, the client's copy of every last-sent field, and `BoundsCache`
//! - **Batching**: `PacketBatcher`, nested update PDUs with size-driven rollover
//! - **Encoder**: `OrderEncoder`, one entry point per primary and secondary order
//! - **Transport**: `PduTransport` and the Tokio-backed `ChannelTransport`
//! - **Session**: `OrderSession`, a per-session worker that serialises drawing calls
//! - **Error**: `OrderError`, a typed, `thiserror`-based error hierarchy

pub mod batch;
pub mod bounds;
pub mod compress;
pub mod delta;
pub mod encoder;
pub mod error;
pub mod flags;
pub mod secondary;
pub mod session;
pub mod state;
pub mod stream;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use batch::{BatchLimits, BatchState, PacketBatcher};
pub use bounds::BoundsCache;
pub use compress::{BitmapCompressor, CompressedBitmap, MAX_COMPRESSED_SIZE};
pub use encoder::{MAX_TEXT_LEN, OrderEncoder};
pub use error::{OrderError, TransportError};
pub use flags::{BoundsFlags, OrderFlags, PresentField};
pub use session::{
    DrawCommand, OrderSession, SessionConfig, SessionHandle, SessionStats,
    StopHandle,
};
pub use state::OrderState;
pub use stream::{OutputBuffer, Placeholder};
pub use transport::{ChannelTransport, DataPduType, MAX_PDU_SIZE, PduTransport, UpdatePdu};
pub use types::{
    Bitmap, Brush, Color, DestBltOrder, FontGlyph, LineOrder, MemBltOrder, OrderKind, Palette,
    PatBltOrder, Pen, Rect, RectOrder, ScreenBltOrder, TextOrder,
};
