//! Per-session record of what the client currently holds.
//!
//! Every field equals the value most recently written to the wire for
//! its order kind, so each new order is diffed against the client's
//! copy rather than against the last request. Fields start at zero,
//! matching a freshly connected client, and are only ever updated by
//! the encoder as it writes them.

use crate::bounds::BoundsCache;
use crate::types::{
    Brush, Color, DestBltOrder, MemBltOrder, OrderKind, Pen, Rect, RectOrder, ScreenBltOrder,
};

/// Last-sent pattern blit, with the brush always materialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatBltState {
    pub x: i32,
    pub y: i32,
    pub cx: i32,
    pub cy: i32,
    pub rop: u8,
    pub bg_color: Color,
    pub fg_color: Color,
    pub brush: Brush,
}

/// Last-sent line, with the pen always materialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    pub mix_mode: u16,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub bg_color: Color,
    pub rop: u8,
    pub pen: Pen,
}

/// Last-sent text order. The glyph run itself is never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextState {
    pub font: u8,
    pub flags: u8,
    pub mix_mode: u8,
    pub fg_color: Color,
    pub bg_color: Color,
    pub clip: Rect,
    pub bbox: Rect,
    pub x: i32,
    pub y: i32,
}

/// Everything the encoder diffs against.
#[derive(Debug, Clone, Default)]
pub struct OrderState {
    /// Kind of the previous primary order. Starts at code 0 (DestBlt),
    /// like the client.
    pub last_kind: OrderKind,
    /// Clip rectangle shared by all primary kinds.
    pub bounds: BoundsCache,
    pub rect: RectOrder,
    pub screen_blt: ScreenBltOrder,
    pub pat_blt: PatBltState,
    pub dest_blt: DestBltOrder,
    pub line: LineState,
    pub mem_blt: MemBltOrder,
    pub text: TextState,
}

impl OrderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `kind` as the latest primary order.
    ///
    /// Returns `true` when it differs from the previous one, i.e. when
    /// the kind byte must be written.
    pub fn switch_kind(&mut self, kind: OrderKind) -> bool {
        debug_assert!(!kind.is_secondary());
        let changed = self.last_kind != kind;
        self.last_kind = kind;
        changed
    }
}
