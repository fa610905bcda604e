//! Secondary orders: palette, bitmap-cache and font-cache loads.
//!
//! These are self-contained records, always sent in full:
//!
//! ```text
//! control : u8   STANDARD | SECONDARY
//! length  : u16  bytes after the type byte, minus 7
//! flags   : u16
//! type    : u8
//! body    : variable
//! ```
//!
//! They count towards the PDU's order total but leave the primary-order
//! state alone.

use tracing::{trace, warn};

use crate::compress::MAX_COMPRESSED_SIZE;
use crate::encoder::OrderEncoder;
use crate::error::OrderError;
use crate::flags::OrderFlags;
use crate::stream::OutputBuffer;
use crate::transport::PduTransport;
use crate::types::{Bitmap, FontGlyph, MAX_CACHE_TILE, OrderKind, Palette};

/// Largest palette order, header included.
const PALETTE_MAX_SIZE: usize = 2000;
/// Header overhead budgeted for a bitmap cache load.
const BITMAP_OVERHEAD: usize = 16;
/// Header overhead budgeted for a font cache load.
const FONT_OVERHEAD: usize = 18;
/// Width and height travel as single bytes.
const MAX_RAW_EDGE: u32 = 255;
/// Bytes the length field leaves uncounted.
const LENGTH_BIAS: usize = 7;
/// Secondary flags used by cache loads.
const CACHE_LOAD_FLAGS: u16 = 8;

impl<T: PduTransport> OrderEncoder<T> {
    /// Load a 256-entry color table into the client's palette cache.
    pub fn palette(&mut self, palette: &Palette, cache_id: u8) -> Result<(), OrderError> {
        self.run(|enc| {
            let out = enc.begin_secondary(OrderKind::Palette, PALETTE_MAX_SIZE, 3 + 256 * 4, 0)?;
            out.put_u8(cache_id);
            out.put_u16_le(256);
            for &entry in palette.iter() {
                out.put_u8(entry as u8);
                out.put_u8((entry >> 8) as u8);
                out.put_u8((entry >> 16) as u8);
                out.put_u8(0);
            }
            trace!(cache_id, "palette order encoded");
            Ok(())
        })
    }

    /// Load an uncompressed bitmap into cache slot `cache_idx`.
    pub fn raw_bitmap(
        &mut self,
        bitmap: &Bitmap,
        cache_id: u8,
        cache_idx: u16,
    ) -> Result<(), OrderError> {
        self.run(|enc| {
            if bitmap.padded_width() > MAX_RAW_EDGE || bitmap.height > MAX_RAW_EDGE {
                warn!(
                    width = bitmap.width,
                    height = bitmap.height,
                    "raw bitmap rejected"
                );
                return Err(OrderError::BitmapTooLarge {
                    width: bitmap.width,
                    height: bitmap.height,
                    max: MAX_RAW_EDGE,
                });
            }
            let depth = PixelDepth::of(bitmap)?;
            let bpp = depth.bytes();
            let bufsize = bitmap.padded_width() as usize * bitmap.height as usize * bpp;

            let out = enc.begin_secondary(
                OrderKind::RawBitmapCache,
                bufsize + BITMAP_OVERHEAD,
                9 + bufsize,
                CACHE_LOAD_FLAGS,
            )?;
            out.put_u8(cache_id);
            out.put_u8(0);
            put_geometry(out, bitmap);
            out.put_u16_le(bufsize as u16);
            out.put_u16_le(cache_idx);

            let trailer = bitmap.row_padding() as usize * bpp;
            for y in (0..bitmap.height).rev() {
                for x in 0..bitmap.width {
                    put_pixel(out, bitmap.pixel(x, y), depth);
                }
                out.put_zeros(trailer);
            }
            trace!(cache_id, cache_idx, bufsize, "raw bitmap order encoded");
            Ok(())
        })
    }

    /// Compress a bitmap tile and load it into cache slot `cache_idx`.
    ///
    /// The tile must be at most 64x64 and must compress completely into
    /// one order; otherwise nothing is written.
    pub fn bitmap(
        &mut self,
        bitmap: &Bitmap,
        cache_id: u8,
        cache_idx: u16,
    ) -> Result<(), OrderError> {
        self.run(|enc| {
            if bitmap.width > MAX_CACHE_TILE || bitmap.height > MAX_CACHE_TILE {
                warn!(
                    width = bitmap.width,
                    height = bitmap.height,
                    "bitmap exceeds cache tile; rejected"
                );
                return Err(OrderError::BitmapTooLarge {
                    width: bitmap.width,
                    height: bitmap.height,
                    max: MAX_CACHE_TILE,
                });
            }
            let depth = PixelDepth::of(bitmap)?;

            let compressor = enc
                .compressor
                .as_mut()
                .ok_or(OrderError::CompressorUnavailable)?;
            let expected = bitmap.height as usize;
            let compressed = compressor.compress(
                bitmap,
                MAX_COMPRESSED_SIZE,
                expected.saturating_sub(1),
            )?;
            if compressed.rows != expected {
                warn!(
                    expected,
                    actual = compressed.rows,
                    "bitmap compression fell short"
                );
                return Err(OrderError::CompressionShortfall {
                    expected,
                    actual: compressed.rows,
                });
            }

            let bufsize = compressed.data.len();
            let line_size = bitmap.padded_width() as usize * depth.bytes();
            let out = enc.begin_secondary(
                OrderKind::CompressedBitmapCache,
                bufsize + BITMAP_OVERHEAD,
                17 + bufsize,
                CACHE_LOAD_FLAGS,
            )?;
            out.put_u8(cache_id);
            out.put_u8(0);
            put_geometry(out, bitmap);
            out.put_u16_le((bufsize + 8) as u16);
            out.put_u16_le(cache_idx);
            out.put_zeros(2);
            out.put_u16_le(bufsize as u16);
            out.put_u16_le(line_size as u16);
            out.put_u16_le((line_size * expected) as u16);
            out.put_slice(&compressed.data);
            trace!(cache_id, cache_idx, bufsize, "compressed bitmap order encoded");
            Ok(())
        })
    }

    /// Load one glyph into font cache `font_index`.
    pub fn font(
        &mut self,
        glyph: &FontGlyph,
        font_index: u8,
        char_index: u16,
    ) -> Result<(), OrderError> {
        self.run(|enc| {
            let datasize = glyph.data_size();
            if glyph.data.len() > datasize {
                return Err(OrderError::GlyphTooLarge {
                    actual: glyph.data.len(),
                    max: datasize,
                });
            }
            let out = enc.begin_secondary(
                OrderKind::FontCache,
                datasize + FONT_OVERHEAD,
                12 + datasize,
                CACHE_LOAD_FLAGS,
            )?;
            out.put_u8(font_index);
            out.put_u8(1);
            out.put_u16_le(char_index);
            out.put_u16_le(glyph.offset as u16);
            out.put_u16_le(glyph.baseline as u16);
            out.put_u16_le(glyph.width);
            out.put_u16_le(glyph.height);
            out.put_slice(&glyph.data);
            out.put_zeros(datasize - glyph.data.len());
            trace!(font_index, char_index, datasize, "font order encoded");
            Ok(())
        })
    }

    /// Budget and count a secondary order, then write its header.
    ///
    /// `body_len` is the number of bytes that will follow the type byte.
    fn begin_secondary(
        &mut self,
        kind: OrderKind,
        worst_case: usize,
        body_len: usize,
        flags: u16,
    ) -> Result<&mut OutputBuffer, OrderError> {
        debug_assert!(kind.is_secondary());
        self.batcher.ensure_open_and_sized(worst_case)?;
        self.batcher.count_order();
        let out = self.batcher.out();
        out.put_u8((OrderFlags::STANDARD | OrderFlags::SECONDARY).bits());
        out.put_u16_le(body_len.saturating_sub(LENGTH_BIAS) as u16);
        out.put_u16_le(flags);
        out.put_u8(kind.code());
        Ok(out)
    }
}

/// Padded width, height and bit depth, one byte each.
fn put_geometry(out: &mut OutputBuffer, bitmap: &Bitmap) {
    out.put_u8(bitmap.padded_width() as u8);
    out.put_u8(bitmap.height as u8);
    out.put_u8(bitmap.bpp);
}

/// Bytes per pixel a cache load can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelDepth {
    One,
    Two,
    Three,
}

impl PixelDepth {
    fn of(bitmap: &Bitmap) -> Result<Self, OrderError> {
        match bitmap.bytes_per_pixel() {
            1 => Ok(PixelDepth::One),
            2 => Ok(PixelDepth::Two),
            3 => Ok(PixelDepth::Three),
            _ => {
                warn!(bpp = bitmap.bpp, "unsupported bitmap depth; rejected");
                Err(OrderError::UnsupportedDepth(bitmap.bpp))
            }
        }
    }

    const fn bytes(self) -> usize {
        match self {
            PixelDepth::One => 1,
            PixelDepth::Two => 2,
            PixelDepth::Three => 3,
        }
    }
}

fn put_pixel(out: &mut OutputBuffer, pixel: u32, depth: PixelDepth) {
    match depth {
        PixelDepth::Three => {
            out.put_u8((pixel >> 16) as u8);
            out.put_u8((pixel >> 8) as u8);
            out.put_u8(pixel as u8);
        }
        PixelDepth::Two => {
            out.put_u8(pixel as u8);
            out.put_u8((pixel >> 8) as u8);
        }
        PixelDepth::One => out.put_u8(pixel as u8),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{BitmapCompressor, CompressedBitmap};
    use crate::transport::{ChannelTransport, UpdatePdu};
    use crate::types::{OrderKind, RectOrder};
    use bytes::Bytes;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Compressor that returns fixed bytes and a fixed row count.
    struct FixedCompressor {
        data: &'static [u8],
        rows: Option<usize>,
    }

    impl BitmapCompressor for FixedCompressor {
        fn compress(
            &mut self,
            bitmap: &Bitmap,
            _max_output: usize,
            start_row: usize,
        ) -> Result<CompressedBitmap, OrderError> {
            assert_eq!(start_row, bitmap.height as usize - 1);
            Ok(CompressedBitmap {
                data: Bytes::from_static(self.data),
                rows: self.rows.unwrap_or(bitmap.height as usize),
            })
        }
    }

    fn encoder() -> (OrderEncoder<ChannelTransport>, UnboundedReceiver<UpdatePdu>) {
        let (transport, rx) = ChannelTransport::pair();
        (OrderEncoder::new(transport), rx)
    }

    fn sent(enc: &mut OrderEncoder<ChannelTransport>, rx: &mut UnboundedReceiver<UpdatePdu>) -> UpdatePdu {
        enc.force_flush().unwrap();
        rx.try_recv().unwrap()
    }

    #[test]
    fn palette_layout() {
        let (mut enc, mut rx) = encoder();
        let mut palette: Palette = [0; 256];
        palette[0] = 0x00_112233;
        palette[255] = 0x00_abcdef;
        enc.palette(&palette, 0).unwrap();

        let pdu = sent(&mut enc, &mut rx);
        let orders = pdu.orders();
        assert_eq!(orders.len(), 6 + 3 + 1024);
        assert_eq!(&orders[..9], &[0x03, 0xfc, 0x03, 0x00, 0x00, 1, 0, 0x00, 0x01]);
        assert_eq!(&orders[9..13], &[0x33, 0x22, 0x11, 0]);
        assert_eq!(&orders[orders.len() - 4..], &[0xef, 0xcd, 0xab, 0]);
    }

    #[test]
    fn raw_bitmap_rows_bottom_up_with_padding() {
        let (mut enc, mut rx) = encoder();
        let mut bitmap = Bitmap::new(3, 2, 24);
        bitmap.set_pixel(0, 0, 0x00_010203);
        bitmap.set_pixel(0, 1, 0x00_0a0b0c);
        enc.raw_bitmap(&bitmap, 1, 7).unwrap();

        let pdu = sent(&mut enc, &mut rx);
        let orders = pdu.orders();
        // 4 padded pixels * 2 rows * 3 bytes.
        let bufsize = 24;
        assert_eq!(
            &orders[..15],
            &[0x03, 26, 0, 8, 0, 0, 1, 0, 4, 2, 24, 24, 0, 7, 0]
        );
        let body = &orders[15..];
        assert_eq!(body.len(), bufsize);
        // Bottom row first, high byte first.
        assert_eq!(&body[..3], &[0x0a, 0x0b, 0x0c]);
        assert_eq!(&body[9..12], &[0, 0, 0]);
        assert_eq!(&body[12..15], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn raw_bitmap_sixteen_bit_is_low_byte_first() {
        let (mut enc, mut rx) = encoder();
        let mut bitmap = Bitmap::new(4, 1, 16);
        bitmap.set_pixel(0, 0, 0xf800);
        enc.raw_bitmap(&bitmap, 0, 0).unwrap();
        let pdu = sent(&mut enc, &mut rx);
        assert_eq!(&pdu.orders()[15..17], &[0x00, 0xf8]);
    }

    #[test]
    fn compressed_bitmap_layout() {
        let (transport, mut rx) = ChannelTransport::pair();
        let mut enc = OrderEncoder::new(transport).with_compressor(FixedCompressor {
            data: &[0xde, 0xad, 0xbe],
            rows: None,
        });
        let bitmap = Bitmap::new(6, 2, 8);
        enc.bitmap(&bitmap, 2, 0x0105).unwrap();

        let pdu = sent(&mut enc, &mut rx);
        assert_eq!(
            pdu.orders(),
            &[
                0x03, 13, 0, 8, 0, 2, // header, len = 3 + 10
                2, 0, 8, 2, 8, // cache id, pad, w+e, h, bpp
                11, 0, 0x05, 0x01, // bufsize + 8, cache index
                0, 0, 3, 0, 8, 0, 16, 0, // pad, bufsize, line size, final size
                0xde, 0xad, 0xbe,
            ]
        );
    }

    #[test]
    fn compression_shortfall_writes_nothing() {
        let (transport, _rx) = ChannelTransport::pair();
        let mut enc = OrderEncoder::new(transport).with_compressor(FixedCompressor {
            data: &[1],
            rows: Some(3),
        });
        let bitmap = Bitmap::new(8, 8, 8);
        assert!(matches!(
            enc.bitmap(&bitmap, 0, 0),
            Err(OrderError::CompressionShortfall { expected: 8, actual: 3 })
        ));
        assert!(!enc.batcher().is_open());
        assert!(!enc.is_failed());
    }

    #[test]
    fn oversize_tile_is_rejected_before_compression() {
        let (transport, _rx) = ChannelTransport::pair();
        let mut enc = OrderEncoder::new(transport);
        let bitmap = Bitmap::new(65, 10, 8);
        assert!(matches!(
            enc.bitmap(&bitmap, 0, 0),
            Err(OrderError::BitmapTooLarge { width: 65, height: 10, max: 64 })
        ));
    }

    #[test]
    fn missing_compressor_is_reported() {
        let (mut enc, _rx) = encoder();
        assert!(matches!(
            enc.bitmap(&Bitmap::new(4, 4, 8), 0, 0),
            Err(OrderError::CompressorUnavailable)
        ));
    }

    #[test]
    fn font_glyph_is_zero_padded() {
        let (mut enc, mut rx) = encoder();
        let glyph = FontGlyph {
            offset: -1,
            baseline: 9,
            width: 8,
            height: 3,
            data: Bytes::from_static(&[0x81, 0x42, 0x24]),
        };
        enc.font(&glyph, 4, 0x41).unwrap();
        let pdu = sent(&mut enc, &mut rx);
        assert_eq!(
            pdu.orders(),
            &[
                0x03, 9, 0, 8, 0, 3, // header, len = 4 + 5
                4, 1, 0x41, 0, 0xff, 0xff, 9, 0, 8, 0, 3, 0, // geometry
                0x81, 0x42, 0x24, 0,
            ]
        );
    }

    #[test]
    fn oversize_glyph_data_is_rejected() {
        let (mut enc, _rx) = encoder();
        let glyph = FontGlyph {
            width: 8,
            height: 1,
            data: Bytes::from_static(&[0; 5]),
            ..Default::default()
        };
        assert!(matches!(
            enc.font(&glyph, 0, 0),
            Err(OrderError::GlyphTooLarge { actual: 5, max: 4 })
        ));
    }

    #[test]
    fn unsupported_depth_writes_nothing() {
        let (transport, _rx) = ChannelTransport::pair();
        let mut enc = OrderEncoder::new(transport).with_compressor(FixedCompressor {
            data: &[1],
            rows: None,
        });
        for bpp in [0, 32] {
            let bitmap = Bitmap::new(4, 1, bpp);
            assert!(matches!(
                enc.raw_bitmap(&bitmap, 0, 0),
                Err(OrderError::UnsupportedDepth(b)) if b == bpp
            ));
            assert!(matches!(
                enc.bitmap(&bitmap, 0, 0),
                Err(OrderError::UnsupportedDepth(b)) if b == bpp
            ));
        }
        assert!(!enc.batcher().is_open());
        assert!(!enc.is_failed());
    }

    #[test]
    fn failed_encoder_reports_session_failure_before_validation() {
        let (mut enc, rx) = encoder();
        drop(rx);
        enc.palette(&[0; 256], 0).unwrap();
        assert!(enc.force_flush().is_err());
        assert!(enc.is_failed());

        let wide = Bitmap::new(400, 1, 8);
        assert!(matches!(
            enc.raw_bitmap(&wide, 0, 0),
            Err(OrderError::SessionFailed)
        ));
        assert!(matches!(
            enc.bitmap(&wide, 0, 0),
            Err(OrderError::SessionFailed)
        ));
        let glyph = FontGlyph {
            width: 8,
            height: 1,
            data: Bytes::from_static(&[0; 5]),
            ..Default::default()
        };
        assert!(matches!(
            enc.font(&glyph, 0, 0),
            Err(OrderError::SessionFailed)
        ));
    }

    #[test]
    fn secondary_orders_leave_primary_state_alone() {
        let (mut enc, mut rx) = encoder();
        enc.init().unwrap();
        enc.rect(&RectOrder::default(), None).unwrap();
        enc.palette(&[0; 256], 0).unwrap();
        enc.rect(&RectOrder::default(), None).unwrap();
        enc.flush().unwrap();

        let pdu = rx.try_recv().unwrap();
        assert_eq!(pdu.order_count(), Some(3));
        assert_eq!(enc.state().last_kind, OrderKind::Rect);
        // The second rect carries no kind byte.
        let orders = pdu.orders();
        assert_eq!(&orders[orders.len() - 2..], &[0x11, 0x00]);
    }
}
