//! Compression collaborator for bitmap cache loads.
//!
//! The run-length codec itself lives outside this crate; the encoder
//! only needs to hand it a bitmap and learn how many rows made it into
//! the output.

use bytes::Bytes;

use crate::error::OrderError;
use crate::types::Bitmap;

/// Output cap handed to the compressor for one cache tile.
pub const MAX_COMPRESSED_SIZE: usize = 8192;

/// Result of compressing (part of) a bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBitmap {
    pub data: Bytes,
    /// Rows actually encoded, counted from `start_row` upwards.
    pub rows: usize,
}

/// Bitmap compressor used for compressed cache loads.
pub trait BitmapCompressor {
    /// Compress `bitmap` bottom-up starting at `start_row`, producing
    /// at most `max_output` bytes. Rows are padded to
    /// [`Bitmap::padded_width`] pixels.
    fn compress(
        &mut self,
        bitmap: &Bitmap,
        max_output: usize,
        start_row: usize,
    ) -> Result<CompressedBitmap, OrderError>;
}

impl<C: BitmapCompressor + ?Sized> BitmapCompressor for Box<C> {
    fn compress(
        &mut self,
        bitmap: &Bitmap,
        max_output: usize,
        start_row: usize,
    ) -> Result<CompressedBitmap, OrderError> {
        (**self).compress(bitmap, max_output, start_row)
    }
}
