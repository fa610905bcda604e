//! Clip-rectangle cache.
//!
//! Remembers the last bounds sent to the client and encodes a new clip
//! edge by edge: unchanged edges cost nothing, close edges cost one
//! signed byte, the rest an absolute 16-bit value.

use crate::delta::{delta_byte, fits_delta};
use crate::flags::BoundsFlags;
use crate::stream::OutputBuffer;
use crate::types::Rect;

/// Last clip rectangle sent, shared by all primary order kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundsCache {
    last: Rect,
}

impl BoundsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rectangle the client currently holds.
    pub fn last(&self) -> Rect {
        self.last
    }

    /// Whether `rect` repeats the cached clip exactly.
    ///
    /// Check this before [`encode_bounds`](Self::encode_bounds): a repeat
    /// is signalled with the order's LAST_BOUNDS flag and no record.
    pub fn is_same_as_last(&self, rect: &Rect) -> bool {
        *rect == self.last
    }

    /// Write a bounds record for `rect` and make it the cached clip.
    pub fn encode_bounds(&mut self, rect: &Rect, out: &mut OutputBuffer) -> BoundsFlags {
        let edges = [
            (rect.left, self.last.left, BoundsFlags::LEFT, BoundsFlags::DELTA_LEFT),
            (rect.top, self.last.top, BoundsFlags::TOP, BoundsFlags::DELTA_TOP),
            (rect.right, self.last.right, BoundsFlags::RIGHT, BoundsFlags::DELTA_RIGHT),
            (rect.bottom, self.last.bottom, BoundsFlags::BOTTOM, BoundsFlags::DELTA_BOTTOM),
        ];

        let mut flags = BoundsFlags::empty();
        for &(new, old, absolute, delta) in &edges {
            if new == old {
                continue;
            }
            flags |= if fits_delta(new, old) { delta } else { absolute };
        }

        out.put_u8(flags.bits());
        for &(new, old, absolute, delta) in &edges {
            if flags.contains(absolute) {
                out.put_coord(new);
            } else if flags.contains(delta) {
                out.put_u8(delta_byte(new, old));
            }
        }

        self.last = *rect;
        flags
    }
}
