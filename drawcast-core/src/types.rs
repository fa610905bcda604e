//! Shared value types: rectangles, colors, brushes, pens, the order
//! kinds, the per-kind order descriptions and cache payloads.
//!
//! Primary order structs double as the "last sent" records kept in
//! [`OrderState`](crate::state::OrderState), so every field here is a
//! plain value with a zero default.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ── Rect ─────────────────────────────────────────────────────────

/// Four signed edges; used both as a drawing region and as a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

// ── Color ────────────────────────────────────────────────────────

/// A 24-bit color as the client stores it.
///
/// Transmitted as three bytes, least significant first. Bits above 23
/// are ignored on the wire but still take part in comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    /// The three wire bytes, low to high.
    pub const fn to_wire(self) -> [u8; 3] {
        [self.0 as u8, (self.0 >> 8) as u8, (self.0 >> 16) as u8]
    }

    /// Byte `index` (0..3) of the wire form.
    pub const fn channel(self, index: usize) -> u8 {
        (self.0 >> (8 * index)) as u8
    }

    /// Copy of `self` with byte `index` replaced.
    pub const fn with_channel(self, index: usize, value: u8) -> Self {
        let shift = 8 * index;
        Self((self.0 & !(0xff << shift)) | ((value as u32) << shift))
    }
}

impl From<u32> for Color {
    fn from(v: u32) -> Self {
        Color(v)
    }
}

// ── Brush / Pen ──────────────────────────────────────────────────

/// Pattern brush used by pattern blits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Brush {
    pub x_origin: u8,
    pub y_origin: u8,
    pub style: u8,
    pub pattern: [u8; 8],
}

/// Pen used by line orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Pen {
    pub style: u8,
    pub width: u8,
    pub color: Color,
}

// ── OrderKind ────────────────────────────────────────────────────

/// Every order the encoder can emit.
///
/// The default is the kind with wire code 0, which is what a freshly
/// connected client assumes before any kind byte arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Rect,
    ScreenBlt,
    PatBlt,
    #[default]
    DestBlt,
    Line,
    MemBlt,
    Text,
    Palette,
    RawBitmapCache,
    CompressedBitmapCache,
    FontCache,
}

impl OrderKind {
    /// Type code written on the wire: the kind byte for primary orders,
    /// the type byte for secondary ones.
    pub const fn code(self) -> u8 {
        match self {
            OrderKind::DestBlt => 0,
            OrderKind::PatBlt => 1,
            OrderKind::ScreenBlt => 2,
            OrderKind::Line => 9,
            OrderKind::Rect => 10,
            OrderKind::MemBlt => 13,
            OrderKind::Text => 27,
            OrderKind::RawBitmapCache => 0,
            OrderKind::Palette => 1,
            OrderKind::CompressedBitmapCache => 2,
            OrderKind::FontCache => 3,
        }
    }

    /// Secondary orders are self-contained and never diffed.
    pub const fn is_secondary(self) -> bool {
        matches!(
            self,
            OrderKind::Palette
                | OrderKind::RawBitmapCache
                | OrderKind::CompressedBitmapCache
                | OrderKind::FontCache
        )
    }
}

// ── Primary orders ───────────────────────────────────────────────

/// Solid rectangle fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectOrder {
    pub x: i32,
    pub y: i32,
    pub cx: i32,
    pub cy: i32,
    pub color: Color,
}

/// Screen-to-screen copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenBltOrder {
    pub x: i32,
    pub y: i32,
    pub cx: i32,
    pub cy: i32,
    pub rop: u8,
    pub src_x: i32,
    pub src_y: i32,
}

/// Pattern blit; a missing brush is sent as the all-zero brush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatBltOrder {
    pub x: i32,
    pub y: i32,
    pub cx: i32,
    pub cy: i32,
    pub rop: u8,
    pub bg_color: Color,
    pub fg_color: Color,
    pub brush: Option<Brush>,
}

/// Destination-only blit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestBltOrder {
    pub x: i32,
    pub y: i32,
    pub cx: i32,
    pub cy: i32,
    pub rop: u8,
}

/// Line segment; a missing pen is sent as the all-zero pen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineOrder {
    pub mix_mode: u16,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub bg_color: Color,
    pub rop: u8,
    pub pen: Option<Pen>,
}

/// Blit from a client-side bitmap cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemBltOrder {
    pub cache_id: u8,
    pub color_table: u8,
    pub x: i32,
    pub y: i32,
    pub cx: i32,
    pub cy: i32,
    pub rop: u8,
    pub src_x: i32,
    pub src_y: i32,
    pub cache_index: u16,
}

/// Glyph run drawn from a client-side font cache.
///
/// `data` is the run's glyph index stream; it is sent on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOrder {
    pub font: u8,
    pub flags: u8,
    pub mix_mode: u8,
    pub fg_color: Color,
    pub bg_color: Color,
    pub clip: Rect,
    #[serde(rename = "box")]
    pub bbox: Rect,
    pub x: i32,
    pub y: i32,
    pub data: Bytes,
}

// ── Cache payloads ───────────────────────────────────────────────

/// Largest bitmap edge accepted for the compressed cache.
pub const MAX_CACHE_TILE: u32 = 64;

/// An uncompressed bitmap.
///
/// `pixels` holds `width * height` values in row-major order, top row
/// first; only the low `bytes_per_pixel() * 8` bits of each are used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Bits per pixel, at most 24 (8, 15, 16 or 24 in practice).
    pub bpp: u8,
    pub pixels: Vec<u32>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, bpp: u8) -> Self {
        Self {
            width,
            height,
            bpp,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    /// Bytes per pixel on the wire.
    pub const fn bytes_per_pixel(&self) -> usize {
        (self.bpp as usize + 7) / 8
    }

    /// Pixels appended to each row to reach a multiple of four.
    pub const fn row_padding(&self) -> u32 {
        (4 - self.width % 4) % 4
    }

    /// Row width including padding.
    pub const fn padded_width(&self) -> u32 {
        self.width + self.row_padding()
    }

    /// Pixel at `(x, y)`, or 0 when the pixel store is short.
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels.get(idx).copied().unwrap_or(0)
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: u32) {
        let idx = y as usize * self.width as usize + x as usize;
        if let Some(p) = self.pixels.get_mut(idx) {
            *p = value;
        }
    }
}

/// One glyph for the font cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontGlyph {
    pub offset: i16,
    pub baseline: i16,
    pub width: u16,
    pub height: u16,
    /// 1bpp rows, each padded to a whole byte.
    pub data: Bytes,
}

impl FontGlyph {
    /// Glyph payload size: byte-padded rows, rounded up to four bytes.
    pub const fn data_size(&self) -> usize {
        let row = (self.width as usize + 7) / 8;
        (self.height as usize * row + 3) & !3
    }
}

/// A full 256-entry color table.
pub type Palette = [u32; 256];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_wire_order_is_low_byte_first() {
        assert_eq!(Color(0x00112233).to_wire(), [0x33, 0x22, 0x11]);
        assert_eq!(Color(0x00112233).channel(2), 0x11);
    }

    #[test]
    fn color_with_channel_replaces_one_byte() {
        let c = Color(0x00112233).with_channel(1, 0xff);
        assert_eq!(c, Color(0x0011ff33));
    }

    #[test]
    fn primary_and_secondary_codes() {
        assert_eq!(OrderKind::Rect.code(), 10);
        assert_eq!(OrderKind::Text.code(), 27);
        assert_eq!(OrderKind::FontCache.code(), 3);
        assert!(OrderKind::Palette.is_secondary());
        assert!(!OrderKind::MemBlt.is_secondary());
    }

    #[test]
    fn bitmap_padding() {
        assert_eq!(Bitmap::new(5, 1, 8).row_padding(), 3);
        assert_eq!(Bitmap::new(8, 1, 8).row_padding(), 0);
        assert_eq!(Bitmap::new(5, 1, 24).bytes_per_pixel(), 3);
        assert_eq!(Bitmap::new(5, 1, 15).bytes_per_pixel(), 2);
    }

    #[test]
    fn glyph_data_size_rounds_to_four() {
        let glyph = FontGlyph {
            width: 9,
            height: 3,
            ..Default::default()
        };
        // 2 bytes per row * 3 rows = 6 -> 8.
        assert_eq!(glyph.data_size(), 8);
    }
}
