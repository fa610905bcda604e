//! Drawing scripts.
//!
//! A script is a TOML document with one `[[ops]]` entry per encoder
//! call. The `op` key picks the call; the remaining keys are the fields
//! of the matching order, and primary orders take an optional `bounds`
//! table used as the clip rectangle:
//!
//! ```toml
//! [[ops]]
//! op = "rect"
//! x = 10
//! y = 10
//! cx = 100
//! cy = 50
//! color = 0xff0000
//! bounds = { left = 0, top = 0, right = 640, bottom = 480 }
//!
//! [[ops]]
//! op = "flush"
//! ```

use std::path::Path;

use drawcast_core::{
    Bitmap, DestBltOrder, DrawCommand, FontGlyph, LineOrder, MemBltOrder, PatBltOrder, Rect,
    RectOrder, ScreenBltOrder, TextOrder,
};
use serde::Deserialize;

/// A parsed script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub ops: Vec<ScriptOp>,
}

/// One scripted encoder call.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Rect {
        #[serde(flatten)]
        order: RectOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    ScreenBlt {
        #[serde(flatten)]
        order: ScreenBltOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    PatBlt {
        #[serde(flatten)]
        order: PatBltOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    DestBlt {
        #[serde(flatten)]
        order: DestBltOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    Line {
        #[serde(flatten)]
        order: LineOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    MemBlt {
        #[serde(flatten)]
        order: MemBltOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    Text {
        #[serde(flatten)]
        order: TextOrder,
        #[serde(default)]
        bounds: Option<Rect>,
    },
    /// Up to 256 colors; missing entries are black.
    Palette {
        #[serde(default)]
        cache_id: u8,
        #[serde(default)]
        colors: Vec<u32>,
    },
    RawBitmap {
        #[serde(flatten)]
        bitmap: Bitmap,
        #[serde(default)]
        cache_id: u8,
        #[serde(default)]
        cache_idx: u16,
    },
    Font {
        #[serde(flatten)]
        glyph: FontGlyph,
        #[serde(default)]
        font_index: u8,
        #[serde(default)]
        char_index: u16,
    },
    Flush,
}

impl ScriptOp {
    /// The session command this op stands for.
    pub fn into_command(self) -> DrawCommand {
        match self {
            ScriptOp::Rect { order, bounds } => DrawCommand::Rect {
                order,
                clip: bounds,
            },
            ScriptOp::ScreenBlt { order, bounds } => DrawCommand::ScreenBlt {
                order,
                clip: bounds,
            },
            ScriptOp::PatBlt { order, bounds } => DrawCommand::PatBlt {
                order,
                clip: bounds,
            },
            ScriptOp::DestBlt { order, bounds } => DrawCommand::DestBlt {
                order,
                clip: bounds,
            },
            ScriptOp::Line { order, bounds } => DrawCommand::Line {
                order,
                clip: bounds,
            },
            ScriptOp::MemBlt { order, bounds } => DrawCommand::MemBlt {
                order,
                clip: bounds,
            },
            ScriptOp::Text { order, bounds } => DrawCommand::Text {
                order,
                clip: bounds,
            },
            ScriptOp::Palette { cache_id, colors } => {
                let mut palette = Box::new([0u32; 256]);
                for (slot, color) in palette.iter_mut().zip(colors) {
                    *slot = color;
                }
                DrawCommand::Palette { palette, cache_id }
            }
            ScriptOp::RawBitmap {
                bitmap,
                cache_id,
                cache_idx,
            } => DrawCommand::RawBitmap {
                bitmap,
                cache_id,
                cache_idx,
            },
            ScriptOp::Font {
                glyph,
                font_index,
                char_index,
            } => DrawCommand::Font {
                glyph,
                font_index,
                char_index,
            },
            ScriptOp::Flush => DrawCommand::Flush,
        }
    }
}

impl Script {
    /// Parse a script from TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read script {}: {e}", path.display()))?;
        Ok(Self::parse(&text)?)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use drawcast_core::Color;

    #[test]
    fn parses_primary_ops_with_bounds() {
        let script = Script::parse(
            r#"
            [[ops]]
            op = "rect"
            x = 10
            cx = 100
            color = 0xff0000
            bounds = { left = 0, top = 0, right = 640, bottom = 480 }

            [[ops]]
            op = "screen_blt"
            x = 5
            rop = 0xcc
            src_x = 50
            "#,
        )
        .unwrap();

        assert_eq!(script.ops.len(), 2);
        match &script.ops[0] {
            ScriptOp::Rect { order, bounds } => {
                assert_eq!(order.x, 10);
                assert_eq!(order.y, 0);
                assert_eq!(order.color, Color(0xff0000));
                assert_eq!(*bounds, Some(Rect::new(0, 0, 640, 480)));
            }
            other => panic!("unexpected op {other:?}"),
        }
        match &script.ops[1] {
            ScriptOp::ScreenBlt { order, bounds } => {
                assert_eq!(order.rop, 0xcc);
                assert_eq!(order.src_x, 50);
                assert!(bounds.is_none());
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn parses_brush_pen_and_text() {
        let script = Script::parse(
            r#"
            [[ops]]
            op = "pat_blt"
            cx = 8
            brush = { style = 3, pattern = [1, 2, 3, 4, 5, 6, 7, 8] }

            [[ops]]
            op = "line"
            end_x = 20
            pen = { width = 1, color = 0x00ff00 }

            [[ops]]
            op = "text"
            font = 2
            clip = { left = 0, top = 0, right = 100, bottom = 20 }
            data = [0, 1, 2]
            "#,
        )
        .unwrap();

        match &script.ops[0] {
            ScriptOp::PatBlt { order, .. } => {
                let brush = order.brush.unwrap();
                assert_eq!(brush.style, 3);
                assert_eq!(brush.pattern[7], 8);
            }
            other => panic!("unexpected op {other:?}"),
        }
        match &script.ops[1] {
            ScriptOp::Line { order, .. } => {
                assert_eq!(order.pen.unwrap().color, Color(0x00ff00));
            }
            other => panic!("unexpected op {other:?}"),
        }
        match &script.ops[2] {
            ScriptOp::Text { order, bounds } => {
                assert_eq!(order.clip, Rect::new(0, 0, 100, 20));
                assert_eq!(&order.data[..], &[0, 1, 2]);
                assert!(bounds.is_none());
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn parses_secondary_ops() {
        let script = Script::parse(
            r#"
            [[ops]]
            op = "palette"
            colors = [0x000000, 0xffffff]

            [[ops]]
            op = "raw_bitmap"
            width = 2
            height = 1
            bpp = 8
            pixels = [1, 2]
            cache_idx = 4

            [[ops]]
            op = "font"
            width = 8
            height = 2
            data = [255, 129]
            char_index = 65

            [[ops]]
            op = "flush"
            "#,
        )
        .unwrap();
        assert_eq!(script.ops.len(), 4);

        let mut commands = script.ops.into_iter().map(ScriptOp::into_command);
        match commands.next() {
            Some(DrawCommand::Palette { palette, cache_id }) => {
                assert_eq!(cache_id, 0);
                assert_eq!(palette[1], 0xffffff);
                assert_eq!(palette[255], 0);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match commands.next() {
            Some(DrawCommand::RawBitmap { bitmap, cache_idx, .. }) => {
                assert_eq!(bitmap.pixels, vec![1, 2]);
                assert_eq!(cache_idx, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match commands.next() {
            Some(DrawCommand::Font { glyph, char_index, .. }) => {
                assert_eq!(glyph.data_size(), 4);
                assert_eq!(char_index, 65);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(matches!(commands.next(), Some(DrawCommand::Flush)));
    }

    #[test]
    fn unknown_op_is_an_error() {
        assert!(Script::parse("[[ops]]\nop = \"spline\"\n").is_err());
    }

    #[test]
    fn empty_script_has_no_ops() {
        assert!(Script::parse("").unwrap().ops.is_empty());
    }
}
