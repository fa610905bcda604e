//! Wire bit-sets: order control flags, bounds flags and the per-kind
//! present fields.
//!
//! Each primary order kind gets its own present type so that a bit from
//! one schema can never be set on another kind's order by accident.

use bitflags::{Flags, bitflags};

use crate::types::OrderKind;

bitflags! {
    /// Control byte that opens every order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OrderFlags: u8 {
        const STANDARD = 0x01;
        const SECONDARY = 0x02;
        const BOUNDS = 0x04;
        /// The kind differs from the previous primary order; a kind byte follows.
        const CHANGE = 0x08;
        /// Coordinates are one-byte signed deltas.
        const DELTA = 0x10;
        /// Reuse the last clip rectangle; no bounds record follows.
        const LAST_BOUNDS = 0x20;
        const SMALL = 0x40;
        const TINY = 0x80;
    }
}

bitflags! {
    /// Leading byte of a bounds record, one absolute and one delta bit per edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BoundsFlags: u8 {
        const LEFT = 0x01;
        const TOP = 0x02;
        const RIGHT = 0x04;
        const BOTTOM = 0x08;
        const DELTA_LEFT = 0x10;
        const DELTA_TOP = 0x20;
        const DELTA_RIGHT = 0x40;
        const DELTA_BOTTOM = 0x80;
    }
}

// ── Present fields ───────────────────────────────────────────────

/// A present bit-field for one primary order kind.
pub trait PresentField: Flags<Bits = u32> + Copy + std::fmt::Debug {
    /// Bytes the field occupies on the wire.
    const WIDTH: usize;
    /// Kind whose schema this field describes.
    const KIND: OrderKind;
    /// Largest encoding of one order of this kind, used for budgeting.
    const MAX_SIZE: usize;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RectFields: u32 {
        const X = 0x01;
        const Y = 0x02;
        const CX = 0x04;
        const CY = 0x08;
        const COLOR_0 = 0x10;
        const COLOR_1 = 0x20;
        const COLOR_2 = 0x40;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScreenBltFields: u32 {
        const X = 0x01;
        const Y = 0x02;
        const CX = 0x04;
        const CY = 0x08;
        const ROP = 0x10;
        const SRC_X = 0x20;
        const SRC_Y = 0x40;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PatBltFields: u32 {
        const X = 0x0001;
        const Y = 0x0002;
        const CX = 0x0004;
        const CY = 0x0008;
        const ROP = 0x0010;
        const BG_COLOR = 0x0020;
        const FG_COLOR = 0x0040;
        const BRUSH_X_ORIGIN = 0x0080;
        const BRUSH_Y_ORIGIN = 0x0100;
        const BRUSH_STYLE = 0x0200;
        const BRUSH_PATTERN_HEAD = 0x0400;
        const BRUSH_PATTERN_TAIL = 0x0800;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DestBltFields: u32 {
        const X = 0x01;
        const Y = 0x02;
        const CX = 0x04;
        const CY = 0x08;
        const ROP = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LineFields: u32 {
        const MIX_MODE = 0x0001;
        const START_X = 0x0002;
        const START_Y = 0x0004;
        const END_X = 0x0008;
        const END_Y = 0x0010;
        const BG_COLOR = 0x0020;
        const ROP = 0x0040;
        const PEN_STYLE = 0x0080;
        const PEN_WIDTH = 0x0100;
        const PEN_COLOR = 0x0200;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemBltFields: u32 {
        /// Cache id and color table travel together.
        const CACHE_ID = 0x0001;
        const X = 0x0002;
        const Y = 0x0004;
        const CX = 0x0008;
        const CY = 0x0010;
        const ROP = 0x0020;
        const SRC_X = 0x0040;
        const SRC_Y = 0x0080;
        const CACHE_INDEX = 0x0100;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextFields: u32 {
        const FONT = 0x00_0001;
        const FLAGS = 0x00_0002;
        const MIX_MODE = 0x00_0008;
        const FG_COLOR = 0x00_0010;
        const BG_COLOR = 0x00_0020;
        const CLIP_LEFT = 0x00_0040;
        const CLIP_TOP = 0x00_0080;
        const CLIP_RIGHT = 0x00_0100;
        const CLIP_BOTTOM = 0x00_0200;
        const BOX_LEFT = 0x00_0400;
        const BOX_TOP = 0x00_0800;
        const BOX_RIGHT = 0x00_1000;
        const BOX_BOTTOM = 0x00_2000;
        const X = 0x08_0000;
        const Y = 0x10_0000;
        /// Set on every text order.
        const DATA = 0x20_0000;
    }
}

impl PresentField for RectFields {
    const WIDTH: usize = 1;
    const KIND: OrderKind = OrderKind::Rect;
    const MAX_SIZE: usize = 23;
}

impl PresentField for ScreenBltFields {
    const WIDTH: usize = 1;
    const KIND: OrderKind = OrderKind::ScreenBlt;
    const MAX_SIZE: usize = 25;
}

impl PresentField for PatBltFields {
    const WIDTH: usize = 2;
    const KIND: OrderKind = OrderKind::PatBlt;
    const MAX_SIZE: usize = 39;
}

impl PresentField for DestBltFields {
    const WIDTH: usize = 1;
    const KIND: OrderKind = OrderKind::DestBlt;
    const MAX_SIZE: usize = 21;
}

impl PresentField for LineFields {
    const WIDTH: usize = 2;
    const KIND: OrderKind = OrderKind::Line;
    const MAX_SIZE: usize = 32;
}

impl PresentField for MemBltFields {
    const WIDTH: usize = 2;
    const KIND: OrderKind = OrderKind::MemBlt;
    const MAX_SIZE: usize = 30;
}

impl PresentField for TextFields {
    const WIDTH: usize = 3;
    const KIND: OrderKind = OrderKind::Text;
    const MAX_SIZE: usize = 100;
}
