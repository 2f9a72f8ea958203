//! Layout config – the frozen draw list produced by a render pass. It encodes
//! exactly what goes on each page, in page-absolute points, and is what the
//! PDF writer consumes.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Align, Border, Color, Font, Pen, Point, Rect};

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of draw operations, in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Text { rect: Rect, text: TextContent },
    Line { from: Point, to: Point, pen: Pen },
    Rect {
        rect: Rect,
        border: Option<Border>,
        fill: Option<Color>,
    },
    Image { rect: Rect, image: ImageContent },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    pub font: Font,
    pub color: Color,
    pub line_height: f32,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the text rect (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the text rect
    pub y_offset: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// File path or `data:` URI.
    pub src: String,
}

impl LayoutConfig {
    pub fn new(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    /// Create an empty A4 layout config.
    pub fn a4() -> Self {
        // A4: 210mm × 297mm = 595.28 × 841.89 points
        Self::new(Self::default_title(), 595.28, 841.89)
    }

    fn default_title() -> String {
        "franq report".to_string()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl PageLayout {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            ops: Vec::new(),
        }
    }

    /// Every text op on the page as `(rect, joined lines)`.
    pub fn texts(&self) -> Vec<(Rect, String)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { rect, text } => Some((*rect, text.joined())),
                _ => None,
            })
            .collect()
    }

    /// Rect of the first text op whose content equals `needle`.
    pub fn find_text(&self, needle: &str) -> Option<Rect> {
        self.texts()
            .into_iter()
            .find(|(_, text)| text == needle)
            .map(|(rect, _)| rect)
    }
}

impl TextContent {
    /// Lines joined with `\n`.
    pub fn joined(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
