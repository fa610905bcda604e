//! Primary drawing-order encoder.
//!
//! Every primary order follows the same shape:
//!
//! ```text
//! control flags : u8        STANDARD [| CHANGE] [| BOUNDS [| LAST_BOUNDS]] [| DELTA]
//! kind          : u8        only when CHANGE is set
//! present       : 1-3 bytes little-endian, back-patched
//! bounds        : variable  only when BOUNDS is set without LAST_BOUNDS
//! fields        : variable  changed fields only, in schema order
//! ```
//!
//! A field is written only when it differs from the client's copy in
//! [`OrderState`], and the copy is updated as it is written. When every
//! coordinate of the order lies within 127 of its previous value the
//! whole order switches to one-byte deltas.

use tracing::{error, trace};

use crate::batch::{BatchLimits, PacketBatcher};
use crate::compress::BitmapCompressor;
use crate::delta::{delta_byte, prefers_delta};
use crate::error::OrderError;
use crate::flags::{
    DestBltFields, LineFields, MemBltFields, OrderFlags, PatBltFields, PresentField, RectFields,
    ScreenBltFields, TextFields,
};
use crate::state::OrderState;
use crate::stream::{OutputBuffer, Placeholder};
use crate::transport::PduTransport;
use crate::types::{
    Color, DestBltOrder, LineOrder, MemBltOrder, PatBltOrder, Rect, RectOrder, ScreenBltOrder,
    TextOrder,
};

/// Longest glyph run a text order can carry.
pub const MAX_TEXT_LEN: usize = 255;

// ── OrderEncoder ─────────────────────────────────────────────────

/// Stateful encoder bound to one output stream.
///
/// Not shareable between callers: the owner must serialise all drawing
/// for its session (see [`OrderSession`](crate::session::OrderSession)).
pub struct OrderEncoder<T> {
    pub(crate) batcher: PacketBatcher<T>,
    pub(crate) state: OrderState,
    pub(crate) compressor: Option<Box<dyn BitmapCompressor + Send>>,
    failed: bool,
}

impl<T: PduTransport> OrderEncoder<T> {
    /// Create an encoder with the default 8192-byte PDU budget.
    pub fn new(transport: T) -> Self {
        Self::with_limits(transport, BatchLimits::default())
    }

    pub fn with_limits(transport: T, limits: BatchLimits) -> Self {
        Self {
            batcher: PacketBatcher::new(transport, limits),
            state: OrderState::new(),
            compressor: None,
            failed: false,
        }
    }

    /// Attach the codec used by [`bitmap`](Self::bitmap).
    pub fn with_compressor(mut self, compressor: impl BitmapCompressor + Send + 'static) -> Self {
        self.compressor = Some(Box::new(compressor));
        self
    }

    /// What the client currently holds.
    pub fn state(&self) -> &OrderState {
        &self.state
    }

    pub fn batcher(&self) -> &PacketBatcher<T> {
        &self.batcher
    }

    pub fn transport(&self) -> &T {
        self.batcher.transport()
    }

    /// Whether an earlier fatal error has disabled this encoder.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    // ── Batch lifecycle ──────────────────────────────────────────

    /// Open (or nest into) an update PDU.
    pub fn init(&mut self) -> Result<(), OrderError> {
        self.run(|enc| enc.batcher.open())
    }

    /// Close one nesting level; the outermost close sends the PDU.
    pub fn flush(&mut self) -> Result<(), OrderError> {
        self.run(|enc| enc.batcher.close())
    }

    /// Send the pending PDU now, whatever the nesting depth.
    pub fn force_flush(&mut self) -> Result<(), OrderError> {
        self.run(|enc| enc.batcher.force_flush())
    }

    /// Run one operation, disabling the encoder if it fails in a way
    /// that desynchronises the client.
    pub(crate) fn run<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, OrderError>,
    ) -> Result<R, OrderError> {
        if self.failed {
            return Err(OrderError::SessionFailed);
        }
        let result = op(self);
        if let Err(e) = &result {
            if e.is_fatal() {
                error!("order stream failed: {e}");
                self.failed = true;
            }
        }
        result
    }

    // ── Primary orders ───────────────────────────────────────────

    /// Solid rectangle fill.
    pub fn rect(&mut self, order: &RectOrder, clip: Option<&Rect>) -> Result<(), OrderError> {
        self.run(|enc| {
            let Self { batcher, state, .. } = enc;
            let last = state.rect;
            let delta = prefers_delta(&[
                (order.x, last.x),
                (order.y, last.y),
                (order.cx, last.cx),
                (order.cy, last.cy),
            ]);
            let mut w = begin_primary::<RectFields, T>(batcher, state, clip, delta)?;
            let last = &mut state.rect;
            w.coord(RectFields::X, order.x, &mut last.x);
            w.coord(RectFields::Y, order.y, &mut last.y);
            w.coord(RectFields::CX, order.cx, &mut last.cx);
            w.coord(RectFields::CY, order.cy, &mut last.cy);
            w.color_channels(
                [RectFields::COLOR_0, RectFields::COLOR_1, RectFields::COLOR_2],
                order.color,
                &mut last.color,
            );
            w.finish()
        })
    }

    /// Screen-to-screen copy.
    pub fn screen_blt(
        &mut self,
        order: &ScreenBltOrder,
        clip: Option<&Rect>,
    ) -> Result<(), OrderError> {
        self.run(|enc| {
            let Self { batcher, state, .. } = enc;
            let last = state.screen_blt;
            let delta = prefers_delta(&[
                (order.x, last.x),
                (order.y, last.y),
                (order.cx, last.cx),
                (order.cy, last.cy),
                (order.src_x, last.src_x),
                (order.src_y, last.src_y),
            ]);
            let mut w = begin_primary::<ScreenBltFields, T>(batcher, state, clip, delta)?;
            let last = &mut state.screen_blt;
            w.coord(ScreenBltFields::X, order.x, &mut last.x);
            w.coord(ScreenBltFields::Y, order.y, &mut last.y);
            w.coord(ScreenBltFields::CX, order.cx, &mut last.cx);
            w.coord(ScreenBltFields::CY, order.cy, &mut last.cy);
            w.byte(ScreenBltFields::ROP, order.rop, &mut last.rop);
            w.coord(ScreenBltFields::SRC_X, order.src_x, &mut last.src_x);
            w.coord(ScreenBltFields::SRC_Y, order.src_y, &mut last.src_y);
            w.finish()
        })
    }

    /// Pattern blit.
    pub fn pat_blt(&mut self, order: &PatBltOrder, clip: Option<&Rect>) -> Result<(), OrderError> {
        self.run(|enc| {
            let Self { batcher, state, .. } = enc;
            let last = state.pat_blt;
            let delta = prefers_delta(&[
                (order.x, last.x),
                (order.y, last.y),
                (order.cx, last.cx),
                (order.cy, last.cy),
            ]);
            let brush = order.brush.unwrap_or_default();
            let mut w = begin_primary::<PatBltFields, T>(batcher, state, clip, delta)?;
            let last = &mut state.pat_blt;
            w.coord(PatBltFields::X, order.x, &mut last.x);
            w.coord(PatBltFields::Y, order.y, &mut last.y);
            w.coord(PatBltFields::CX, order.cx, &mut last.cx);
            w.coord(PatBltFields::CY, order.cy, &mut last.cy);
            w.byte(PatBltFields::ROP, order.rop, &mut last.rop);
            w.color(PatBltFields::BG_COLOR, order.bg_color, &mut last.bg_color);
            w.color(PatBltFields::FG_COLOR, order.fg_color, &mut last.fg_color);
            let cached = &mut last.brush;
            w.byte(PatBltFields::BRUSH_X_ORIGIN, brush.x_origin, &mut cached.x_origin);
            w.byte(PatBltFields::BRUSH_Y_ORIGIN, brush.y_origin, &mut cached.y_origin);
            w.byte(PatBltFields::BRUSH_STYLE, brush.style, &mut cached.style);
            let (head, tail) = cached.pattern.split_at_mut(1);
            w.byte(PatBltFields::BRUSH_PATTERN_HEAD, brush.pattern[0], &mut head[0]);
            w.block(PatBltFields::BRUSH_PATTERN_TAIL, &brush.pattern[1..], tail);
            w.finish()
        })
    }

    /// Destination-only blit.
    pub fn dest_blt(&mut self, order: &DestBltOrder, clip: Option<&Rect>) -> Result<(), OrderError> {
        self.run(|enc| {
            let Self { batcher, state, .. } = enc;
            let last = state.dest_blt;
            let delta = prefers_delta(&[
                (order.x, last.x),
                (order.y, last.y),
                (order.cx, last.cx),
                (order.cy, last.cy),
            ]);
            let mut w = begin_primary::<DestBltFields, T>(batcher, state, clip, delta)?;
            let last = &mut state.dest_blt;
            w.coord(DestBltFields::X, order.x, &mut last.x);
            w.coord(DestBltFields::Y, order.y, &mut last.y);
            w.coord(DestBltFields::CX, order.cx, &mut last.cx);
            w.coord(DestBltFields::CY, order.cy, &mut last.cy);
            w.byte(DestBltFields::ROP, order.rop, &mut last.rop);
            w.finish()
        })
    }

    /// Line segment.
    pub fn line(&mut self, order: &LineOrder, clip: Option<&Rect>) -> Result<(), OrderError> {
        self.run(|enc| {
            let Self { batcher, state, .. } = enc;
            let last = state.line;
            let delta = prefers_delta(&[
                (order.start_x, last.start_x),
                (order.start_y, last.start_y),
                (order.end_x, last.end_x),
                (order.end_y, last.end_y),
            ]);
            let pen = order.pen.unwrap_or_default();
            let mut w = begin_primary::<LineFields, T>(batcher, state, clip, delta)?;
            let last = &mut state.line;
            w.word(LineFields::MIX_MODE, order.mix_mode, &mut last.mix_mode);
            w.coord(LineFields::START_X, order.start_x, &mut last.start_x);
            w.coord(LineFields::START_Y, order.start_y, &mut last.start_y);
            w.coord(LineFields::END_X, order.end_x, &mut last.end_x);
            w.coord(LineFields::END_Y, order.end_y, &mut last.end_y);
            w.color(LineFields::BG_COLOR, order.bg_color, &mut last.bg_color);
            w.byte(LineFields::ROP, order.rop, &mut last.rop);
            w.byte(LineFields::PEN_STYLE, pen.style, &mut last.pen.style);
            w.byte(LineFields::PEN_WIDTH, pen.width, &mut last.pen.width);
            w.color(LineFields::PEN_COLOR, pen.color, &mut last.pen.color);
            w.finish()
        })
    }

    /// Blit from a cached bitmap.
    pub fn mem_blt(&mut self, order: &MemBltOrder, clip: Option<&Rect>) -> Result<(), OrderError> {
        self.run(|enc| {
            let Self { batcher, state, .. } = enc;
            let last = state.mem_blt;
            let delta = prefers_delta(&[
                (order.x, last.x),
                (order.y, last.y),
                (order.cx, last.cx),
                (order.cy, last.cy),
                (order.src_x, last.src_x),
                (order.src_y, last.src_y),
            ]);
            let mut w = begin_primary::<MemBltFields, T>(batcher, state, clip, delta)?;
            let last = &mut state.mem_blt;
            if order.cache_id != last.cache_id || order.color_table != last.color_table {
                w.mark(MemBltFields::CACHE_ID);
                w.out.put_u8(order.cache_id);
                w.out.put_u8(order.color_table);
                last.cache_id = order.cache_id;
                last.color_table = order.color_table;
            }
            w.coord(MemBltFields::X, order.x, &mut last.x);
            w.coord(MemBltFields::Y, order.y, &mut last.y);
            w.coord(MemBltFields::CX, order.cx, &mut last.cx);
            w.coord(MemBltFields::CY, order.cy, &mut last.cy);
            w.byte(MemBltFields::ROP, order.rop, &mut last.rop);
            w.coord(MemBltFields::SRC_X, order.src_x, &mut last.src_x);
            w.coord(MemBltFields::SRC_Y, order.src_y, &mut last.src_y);
            w.word(MemBltFields::CACHE_INDEX, order.cache_index, &mut last.cache_index);
            w.finish()
        })
    }

    /// Glyph run. The run bytes are sent every time, even if unchanged.
    pub fn text(&mut self, order: &TextOrder, clip: Option<&Rect>) -> Result<(), OrderError> {
        self.run(|enc| {
            if order.data.len() > MAX_TEXT_LEN {
                return Err(OrderError::TextTooLong(order.data.len()));
            }
            let Self { batcher, state, .. } = enc;
            let mut w = begin_primary::<TextFields, T>(batcher, state, clip, false)?;
            let last = &mut state.text;
            w.byte(TextFields::FONT, order.font, &mut last.font);
            w.byte(TextFields::FLAGS, order.flags, &mut last.flags);
            w.byte(TextFields::MIX_MODE, order.mix_mode, &mut last.mix_mode);
            w.color(TextFields::FG_COLOR, order.fg_color, &mut last.fg_color);
            w.color(TextFields::BG_COLOR, order.bg_color, &mut last.bg_color);
            w.absolute(TextFields::CLIP_LEFT, order.clip.left, &mut last.clip.left);
            w.absolute(TextFields::CLIP_TOP, order.clip.top, &mut last.clip.top);
            w.absolute(TextFields::CLIP_RIGHT, order.clip.right, &mut last.clip.right);
            w.absolute(TextFields::CLIP_BOTTOM, order.clip.bottom, &mut last.clip.bottom);
            w.absolute(TextFields::BOX_LEFT, order.bbox.left, &mut last.bbox.left);
            w.absolute(TextFields::BOX_TOP, order.bbox.top, &mut last.bbox.top);
            w.absolute(TextFields::BOX_RIGHT, order.bbox.right, &mut last.bbox.right);
            w.absolute(TextFields::BOX_BOTTOM, order.bbox.bottom, &mut last.bbox.bottom);
            w.absolute(TextFields::X, order.x, &mut last.x);
            w.absolute(TextFields::Y, order.y, &mut last.y);
            w.mark(TextFields::DATA);
            w.out.put_u8(order.data.len() as u8);
            w.out.put_slice(&order.data);
            w.finish()
        })
    }
}

// ── Order header ─────────────────────────────────────────────────

/// Budget, count and write the common header of a primary order, then
/// hand back a writer for its fields.
fn begin_primary<'a, F: PresentField, T: PduTransport>(
    batcher: &'a mut PacketBatcher<T>,
    state: &mut OrderState,
    clip: Option<&Rect>,
    delta: bool,
) -> Result<FieldWriter<'a, F>, OrderError> {
    batcher.ensure_open_and_sized(F::MAX_SIZE)?;
    batcher.count_order();

    let mut flags = OrderFlags::STANDARD;
    if state.switch_kind(F::KIND) {
        flags |= OrderFlags::CHANGE;
    }
    if let Some(rect) = clip {
        flags |= OrderFlags::BOUNDS;
        if state.bounds.is_same_as_last(rect) {
            flags |= OrderFlags::LAST_BOUNDS;
        }
    }
    if delta {
        flags |= OrderFlags::DELTA;
    }

    let out = batcher.out();
    out.put_u8(flags.bits());
    if flags.contains(OrderFlags::CHANGE) {
        out.put_u8(F::KIND.code());
    }
    let slot = out.reserve(F::WIDTH);
    if let Some(rect) = clip {
        if !flags.contains(OrderFlags::LAST_BOUNDS) {
            state.bounds.encode_bounds(rect, out);
        }
    }

    Ok(FieldWriter {
        out,
        flags,
        present: F::empty(),
        slot,
    })
}

// ── FieldWriter ──────────────────────────────────────────────────

/// Writes the changed fields of one order and collects its present bits.
struct FieldWriter<'a, F: PresentField> {
    out: &'a mut OutputBuffer,
    flags: OrderFlags,
    present: F,
    slot: Placeholder,
}

impl<F: PresentField> FieldWriter<'_, F> {
    fn mark(&mut self, bit: F) {
        self.present.insert(bit);
    }

    /// Coordinate: a delta byte or an absolute u16, per the order's verdict.
    fn coord(&mut self, bit: F, new: i32, cached: &mut i32) {
        if new == *cached {
            return;
        }
        self.mark(bit);
        if self.flags.contains(OrderFlags::DELTA) {
            self.out.put_u8(delta_byte(new, *cached));
        } else {
            self.out.put_coord(new);
        }
        *cached = new;
    }

    /// Coordinate that is always absolute.
    fn absolute(&mut self, bit: F, new: i32, cached: &mut i32) {
        if new == *cached {
            return;
        }
        self.mark(bit);
        self.out.put_coord(new);
        *cached = new;
    }

    fn byte(&mut self, bit: F, new: u8, cached: &mut u8) {
        if new == *cached {
            return;
        }
        self.mark(bit);
        self.out.put_u8(new);
        *cached = new;
    }

    fn word(&mut self, bit: F, new: u16, cached: &mut u16) {
        if new == *cached {
            return;
        }
        self.mark(bit);
        self.out.put_u16_le(new);
        *cached = new;
    }

    fn color(&mut self, bit: F, new: Color, cached: &mut Color) {
        if new == *cached {
            return;
        }
        self.mark(bit);
        self.out.put_color(new);
        *cached = new;
    }

    /// Color with one present bit per byte.
    fn color_channels(&mut self, bits: [F; 3], new: Color, cached: &mut Color) {
        for (index, bit) in bits.into_iter().enumerate() {
            let value = new.channel(index);
            if value == cached.channel(index) {
                continue;
            }
            self.mark(bit);
            self.out.put_u8(value);
            *cached = cached.with_channel(index, value);
        }
    }

    /// Byte block compared and sent as a unit.
    fn block(&mut self, bit: F, new: &[u8], cached: &mut [u8]) {
        if *new == *cached {
            return;
        }
        self.mark(bit);
        self.out.put_slice(new);
        cached.copy_from_slice(new);
    }

    /// Back-patch the present field.
    fn finish(self) -> Result<(), OrderError> {
        self.out.patch(self.slot, self.present.bits())?;
        trace!(
            kind = ?F::KIND,
            flags = self.flags.bits(),
            present = self.present.bits(),
            "primary order encoded"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
