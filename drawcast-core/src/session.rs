//! Per-session drawing worker.
//!
//! An [`OrderEncoder`] must only ever be driven by one caller at a time.
//! [`OrderSession`] owns the encoder inside a Tokio task and applies
//! [`DrawCommand`]s from a bounded queue in arrival order; any number of
//! producers hold a cloneable [`SessionHandle`].
//!
//! Each command runs to completion before the next is taken, and the
//! encoder never awaits. When every handle is gone or
//! [`SessionHandle::shutdown`] is called, the worker force-flushes what
//! is pending and returns its statistics.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use crate::batch::BatchLimits;
use crate::compress::BitmapCompressor;
use crate::encoder::OrderEncoder;
use crate::error::OrderError;
use crate::transport::PduTransport;
use crate::types::{
    Bitmap, DestBltOrder, FontGlyph, LineOrder, MemBltOrder, Palette, PatBltOrder, Rect,
    RectOrder, ScreenBltOrder, TextOrder,
};

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for [`OrderSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Commands that may wait in the queue before producers block.
    pub queue_depth: usize,
    /// PDU budget handed to the encoder.
    pub limits: BatchLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            limits: BatchLimits::default(),
        }
    }
}

// ── DrawCommand ──────────────────────────────────────────────────

/// One encoder call, queued for the session worker.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Init,
    Flush,
    ForceFlush,
    Rect {
        order: RectOrder,
        clip: Option<Rect>,
    },
    ScreenBlt {
        order: ScreenBltOrder,
        clip: Option<Rect>,
    },
    PatBlt {
        order: PatBltOrder,
        clip: Option<Rect>,
    },
    DestBlt {
        order: DestBltOrder,
        clip: Option<Rect>,
    },
    Line {
        order: LineOrder,
        clip: Option<Rect>,
    },
    MemBlt {
        order: MemBltOrder,
        clip: Option<Rect>,
    },
    Text {
        order: TextOrder,
        clip: Option<Rect>,
    },
    Palette {
        palette: Box<Palette>,
        cache_id: u8,
    },
    RawBitmap {
        bitmap: Bitmap,
        cache_id: u8,
        cache_idx: u16,
    },
    Bitmap {
        bitmap: Bitmap,
        cache_id: u8,
        cache_idx: u16,
    },
    Font {
        glyph: FontGlyph,
        font_index: u8,
        char_index: u16,
    },
}

impl DrawCommand {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            DrawCommand::Init => "init",
            DrawCommand::Flush => "flush",
            DrawCommand::ForceFlush => "force_flush",
            DrawCommand::Rect { .. } => "rect",
            DrawCommand::ScreenBlt { .. } => "screen_blt",
            DrawCommand::PatBlt { .. } => "pat_blt",
            DrawCommand::DestBlt { .. } => "dest_blt",
            DrawCommand::Line { .. } => "line",
            DrawCommand::MemBlt { .. } => "mem_blt",
            DrawCommand::Text { .. } => "text",
            DrawCommand::Palette { .. } => "palette",
            DrawCommand::RawBitmap { .. } => "raw_bitmap",
            DrawCommand::Bitmap { .. } => "bitmap",
            DrawCommand::Font { .. } => "font",
        }
    }
}

// ── SessionStats ─────────────────────────────────────────────────

/// Totals reported when a session worker finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Commands taken off the queue.
    pub commands: u64,
    /// Commands the encoder refused without failing the session.
    pub rejected: u64,
    /// Update PDUs handed to the transport.
    pub pdus_sent: u64,
}

// ── SessionHandle ────────────────────────────────────────────────

/// Producer side of a session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<DrawCommand>,
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    /// Queue a command, waiting while the queue is full.
    pub async fn send(&self, command: DrawCommand) -> Result<(), OrderError> {
        self.tx.send(command).await?;
        Ok(())
    }

    /// Ask the worker to flush and stop. Commands still queued are dropped.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Whether the worker has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// A stop trigger that, unlike a handle, does not keep the worker alive.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.shutdown))
    }
}

/// Stops a session worker without holding its queue open.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<Notify>);

impl StopHandle {
    /// Same as [`SessionHandle::shutdown`].
    pub fn stop(&self) {
        self.0.notify_one();
    }
}

// ── OrderSession ─────────────────────────────────────────────────

/// Session worker owning one encoder.
pub struct OrderSession<T> {
    encoder: OrderEncoder<T>,
    rx: mpsc::Receiver<DrawCommand>,
    shutdown: Arc<Notify>,
    stats: SessionStats,
}

impl<T: PduTransport> OrderSession<T> {
    /// Create a worker drawing to `transport`, plus its first handle.
    pub fn new(transport: T, config: SessionConfig) -> (Self, SessionHandle) {
        Self::with_encoder(OrderEncoder::with_limits(transport, config.limits), config)
    }

    /// Create a worker around an already configured encoder.
    /// `config.limits` is ignored.
    pub fn with_encoder(encoder: OrderEncoder<T>, config: SessionConfig) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let shutdown = Arc::new(Notify::new());
        let session = Self {
            encoder,
            rx,
            shutdown: Arc::clone(&shutdown),
            stats: SessionStats::default(),
        };
        (session, SessionHandle { tx, shutdown })
    }

    /// Attach the codec used for compressed bitmap cache loads.
    pub fn with_compressor(mut self, compressor: impl BitmapCompressor + Send + 'static) -> Self {
        self.encoder = self.encoder.with_compressor(compressor);
        self
    }

    pub fn encoder(&self) -> &OrderEncoder<T> {
        &self.encoder
    }

    /// Apply commands until all handles are dropped or shutdown is
    /// requested, then force-flush.
    ///
    /// Returns an error only when the encoder failed fatally; refused
    /// orders are logged and counted in [`SessionStats::rejected`].
    pub async fn run(mut self) -> Result<SessionStats, OrderError> {
        info!("order session started");
        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    debug!("order session shutdown requested");
                    break;
                }
                command = self.rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            self.stats.commands += 1;
            let name = command.name();
            if let Err(e) = self.apply(command) {
                if e.is_fatal() || self.encoder.is_failed() {
                    error!(command = name, "order session aborted: {e}");
                    return Err(e);
                }
                warn!(command = name, "draw command rejected: {e}");
                self.stats.rejected += 1;
            }
        }

        self.rx.close();
        self.encoder.force_flush()?;
        self.stats.pdus_sent = self.encoder.batcher().pdus_sent();
        info!(
            commands = self.stats.commands,
            rejected = self.stats.rejected,
            pdus = self.stats.pdus_sent,
            "order session finished"
        );
        Ok(self.stats)
    }

    fn apply(&mut self, command: DrawCommand) -> Result<(), OrderError> {
        let enc = &mut self.encoder;
        match command {
            DrawCommand::Init => enc.init(),
            DrawCommand::Flush => enc.flush(),
            DrawCommand::ForceFlush => enc.force_flush(),
            DrawCommand::Rect { order, clip } => enc.rect(&order, clip.as_ref()),
            DrawCommand::ScreenBlt { order, clip } => enc.screen_blt(&order, clip.as_ref()),
            DrawCommand::PatBlt { order, clip } => enc.pat_blt(&order, clip.as_ref()),
            DrawCommand::DestBlt { order, clip } => enc.dest_blt(&order, clip.as_ref()),
            DrawCommand::Line { order, clip } => enc.line(&order, clip.as_ref()),
            DrawCommand::MemBlt { order, clip } => enc.mem_blt(&order, clip.as_ref()),
            DrawCommand::Text { order, clip } => enc.text(&order, clip.as_ref()),
            DrawCommand::Palette { palette, cache_id } => enc.palette(&palette, cache_id),
            DrawCommand::RawBitmap {
                bitmap,
                cache_id,
                cache_idx,
            } => enc.raw_bitmap(&bitmap, cache_id, cache_idx),
            DrawCommand::Bitmap {
                bitmap,
                cache_id,
                cache_idx,
            } => enc.bitmap(&bitmap, cache_id, cache_idx),
            DrawCommand::Font {
                glyph,
                font_index,
                char_index,
            } => enc.font(&glyph, font_index, char_index),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use crate::types::Color;
    use bytes::Bytes;

    fn rect(x: i32) -> DrawCommand {
        DrawCommand::Rect {
            order: RectOrder {
                x,
                y: 0,
                cx: 10,
                cy: 10,
                color: Color(0x00ff_0000),
            },
            clip: None,
        }
    }

    #[tokio::test]
    async fn commands_apply_in_order_and_flush_on_drop() {
        let (transport, mut pdus) = ChannelTransport::pair();
        let (session, handle) = OrderSession::new(transport, SessionConfig::default());
        let worker = tokio::spawn(session.run());

        handle.send(DrawCommand::Init).await.unwrap();
        handle.send(rect(5)).await.unwrap();
        handle.send(rect(6)).await.unwrap();
        drop(handle);

        let stats = worker.await.unwrap().unwrap();
        assert_eq!(stats.commands, 3);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.pdus_sent, 1);

        let pdu = pdus.recv().await.unwrap();
        assert_eq!(pdu.order_count(), Some(2));
        // The second rect moved by one pixel.
        let orders = pdu.orders();
        assert_eq!(&orders[orders.len() - 3..], &[0x11, 0x01, 1]);
    }

    #[tokio::test]
    async fn rejected_command_does_not_stop_session() {
        let (transport, mut pdus) = ChannelTransport::pair();
        let (session, handle) = OrderSession::new(transport, SessionConfig::default());
        let worker = tokio::spawn(session.run());

        let long_text = TextOrder {
            data: Bytes::from(vec![1u8; 300]),
            ..Default::default()
        };
        handle
            .send(DrawCommand::Text {
                order: long_text,
                clip: None,
            })
            .await
            .unwrap();
        handle.send(rect(1)).await.unwrap();
        handle.send(DrawCommand::Flush).await.unwrap();
        drop(handle);

        let stats = worker.await.unwrap().unwrap();
        assert_eq!(stats.rejected, 1);
        assert_eq!(pdus.recv().await.unwrap().order_count(), Some(1));
    }

    #[tokio::test]
    async fn shutdown_stops_the_worker() {
        let (transport, _pdus) = ChannelTransport::pair();
        let (session, handle) = OrderSession::new(transport, SessionConfig::default());
        let keep = handle.clone();
        handle.shutdown();

        let stats = session.run().await.unwrap();
        assert_eq!(stats.commands, 0);
        assert!(keep.is_closed());
        assert!(matches!(
            keep.send(DrawCommand::Init).await,
            Err(OrderError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn stop_handle_does_not_keep_session_alive() {
        let (transport, _pdus) = ChannelTransport::pair();
        let (session, handle) = OrderSession::new(transport, SessionConfig::default());
        let stop = handle.stop_handle();
        drop(handle);

        let stats = session.run().await.unwrap();
        assert_eq!(stats.commands, 0);
        // Stopping a finished session is harmless.
        stop.stop();
    }

    #[tokio::test]
    async fn transport_failure_ends_session() {
        let (transport, pdus) = ChannelTransport::pair();
        drop(pdus);
        let (session, handle) = OrderSession::new(transport, SessionConfig::default());
        let worker = tokio::spawn(session.run());

        handle.send(rect(0)).await.unwrap();
        handle.send(DrawCommand::ForceFlush).await.unwrap();

        let result = worker.await.unwrap();
        assert!(matches!(result, Err(OrderError::Transport(_))));
    }

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.queue_depth, 256);
        assert_eq!(config.limits, BatchLimits::default());
    }
}
