//! Paint backend contract.
//!
//! The pagination engine is the only caller. It computes geometry and calls
//! into a [`PaintBackend`] with page-absolute rectangles; how the result
//! reaches paper or screen is the backend's business. Calls are synchronous
//! and any error aborts the render (output already painted is kept).
//!
//! [`LayoutRecorder`] is the in-memory backend: it freezes every call into a
//! [`LayoutConfig`] that [`crate::render`] turns into PDF bytes.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::error::{Error, Result};
use crate::fonts::FontManager;
use crate::layout_config::{DrawOp, ImageContent, LayoutConfig, PageLayout, TextContent, TextLine};
use crate::markup;
use crate::model::{Align, Border, Color, Font, ImageSource, PageGeometry, Pen, Point, Rect, VAlign};

/// Resolved text attributes for one draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: Font,
    pub color: Color,
    pub align: Align,
    pub valign: VAlign,
    pub wrap: bool,
    pub rich_text: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: Font::default(),
            color: Color::BLACK,
            align: Align::Left,
            valign: VAlign::Top,
            wrap: true,
            rich_text: false,
        }
    }
}

/// The drawing surface the engine paints onto.
pub trait PaintBackend {
    /// Start the document; the first page is open afterwards.
    fn begin_document(&mut self, geometry: &PageGeometry) -> Result<()>;

    /// Close the current page and open the next one.
    fn new_page(&mut self) -> Result<()>;

    fn end_document(&mut self) -> Result<()>;

    fn draw_text(&mut self, rect: Rect, text: &str, style: &TextStyle) -> Result<()>;

    fn draw_line(&mut self, from: Point, to: Point, pen: &Pen) -> Result<()>;

    fn draw_rect(&mut self, rect: Rect, border: Option<&Border>, fill: Option<Color>) -> Result<()>;

    fn draw_image(&mut self, rect: Rect, image: &ImageSource) -> Result<()>;

    /// Height of `text` as [`PaintBackend::draw_text`] would lay it out in a
    /// box `max_width` wide.
    fn measure_text(&self, text: &str, style: &TextStyle, max_width: f32) -> f32;
}

// ---------------------------------------------------------------------------
// Recording backend
// ---------------------------------------------------------------------------

/// Backend that records draw calls into a [`LayoutConfig`].
pub struct LayoutRecorder {
    fonts: FontManager,
    layout: LayoutConfig,
    finished: bool,
}

impl LayoutRecorder {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_fonts(title, FontManager::new())
    }

    pub fn with_fonts(title: impl Into<String>, fonts: FontManager) -> Self {
        Self {
            fonts,
            layout: LayoutConfig::new(title, 0.0, 0.0),
            finished: false,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn into_layout(self) -> LayoutConfig {
        self.layout
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn page(&mut self) -> Result<&mut PageLayout> {
        self.layout
            .pages
            .last_mut()
            .ok_or_else(|| Error::Backend("draw call before begin_document".to_string()))
    }

    /// Lines as drawn: markup reduced to text, then wrapped or split at
    /// newlines per `style.wrap`.
    fn lines(&self, text: &str, style: &TextStyle, max_width: f32) -> Vec<String> {
        let plain;
        let text = if style.rich_text {
            plain = markup::plain_text(text);
            plain.as_str()
        } else {
            text
        };
        if style.wrap {
            self.fonts.wrap(text, &style.font, max_width)
        } else {
            text.split('\n').map(str::to_string).collect()
        }
    }

    fn push(&mut self, op: DrawOp) -> Result<()> {
        self.page()?.ops.push(op);
        Ok(())
    }
}

impl PaintBackend for LayoutRecorder {
    fn begin_document(&mut self, geometry: &PageGeometry) -> Result<()> {
        self.layout.page_width_pt = geometry.width;
        self.layout.page_height_pt = geometry.height;
        self.layout.pages.clear();
        self.layout.pages.push(PageLayout::new(0));
        self.finished = false;
        Ok(())
    }

    fn new_page(&mut self) -> Result<()> {
        if self.layout.pages.is_empty() {
            return Err(Error::Backend("new_page before begin_document".to_string()));
        }
        let index = self.layout.pages.len();
        self.layout.pages.push(PageLayout::new(index));
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn draw_text(&mut self, rect: Rect, text: &str, style: &TextStyle) -> Result<()> {
        let font = &style.font;
        let raw_lines = self.lines(text, style, rect.width);
        let line_height = font.line_height();
        let block_height = raw_lines.len() as f32 * line_height;
        let y_start = match style.valign {
            VAlign::Top => 0.0,
            VAlign::Middle => ((rect.height - block_height) / 2.0).max(0.0),
            VAlign::Bottom => (rect.height - block_height).max(0.0),
        };
        let lines = raw_lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let width = self.fonts.measure_width(&line, font);
                let x_offset = match style.align {
                    Align::Left => 0.0,
                    Align::Center => ((rect.width - width) / 2.0).max(0.0),
                    Align::Right => (rect.width - width).max(0.0),
                };
                TextLine {
                    text: line,
                    x_offset,
                    y_offset: y_start + i as f32 * line_height,
                }
            })
            .collect();
        self.push(DrawOp::Text {
            rect,
            text: TextContent {
                lines,
                font: font.clone(),
                color: style.color,
                line_height,
                align: style.align,
            },
        })
    }

    fn draw_line(&mut self, from: Point, to: Point, pen: &Pen) -> Result<()> {
        self.push(DrawOp::Line {
            from,
            to,
            pen: *pen,
        })
    }

    fn draw_rect(&mut self, rect: Rect, border: Option<&Border>, fill: Option<Color>) -> Result<()> {
        self.push(DrawOp::Rect {
            rect,
            border: border.copied(),
            fill,
        })
    }

    fn draw_image(&mut self, rect: Rect, image: &ImageSource) -> Result<()> {
        let src = match image {
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Data(bytes) => {
                format!("data:{};base64,{}", sniff_mime(bytes), BASE64_STD.encode(bytes))
            }
        };
        self.push(DrawOp::Image {
            rect,
            image: ImageContent { src },
        })
    }

    fn measure_text(&self, text: &str, style: &TextStyle, max_width: f32) -> f32 {
        self.lines(text, style, max_width).len() as f32 * style.font.line_height()
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Margins, Orientation, PaperSize};

    fn started() -> LayoutRecorder {
        let mut rec = LayoutRecorder::new("test");
        let geometry = PageGeometry::new(PaperSize::A4, Orientation::Portrait, Margins::uniform(0.0));
        rec.begin_document(&geometry).unwrap();
        rec
    }

    #[test]
    fn draw_before_begin_fails() {
        let mut rec = LayoutRecorder::new("test");
        let err = rec.draw_line(Point::default(), Point::new(1.0, 1.0), &Pen::default());
        assert!(matches!(err, Err(Error::Backend(_))));
    }

    #[test]
    fn pages_are_indexed_in_order() {
        let mut rec = started();
        rec.new_page().unwrap();
        rec.new_page().unwrap();
        rec.end_document().unwrap();
        let layout = rec.into_layout();
        let indices: Vec<usize> = layout.pages.iter().map(|p| p.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn right_aligned_text_is_offset() {
        let mut rec = started();
        let style = TextStyle {
            align: Align::Right,
            ..TextStyle::default()
        };
        rec.draw_text(Rect::new(0.0, 0.0, 100.0, 12.0), "abcd", &style).unwrap();
        let DrawOp::Text { text, .. } = &rec.layout().pages[0].ops[0] else {
            panic!("expected text op");
        };
        // 4 chars × 10 × 0.5 = 20 wide
        assert!((text.lines[0].x_offset - 80.0).abs() < 1e-3);
    }

    #[test]
    fn inline_images_become_data_uris() {
        let mut rec = started();
        rec.draw_image(Rect::default(), &ImageSource::Data(b"\x89PNG....".to_vec()))
            .unwrap();
        let DrawOp::Image { image, .. } = &rec.layout().pages[0].ops[0] else {
            panic!("expected image op");
        };
        assert!(image.src.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn measured_height_follows_wrap_and_markup() {
        let rec = started();
        let wrapped = TextStyle::default();
        let single = TextStyle {
            wrap: false,
            ..TextStyle::default()
        };
        let rich = TextStyle {
            rich_text: true,
            ..TextStyle::default()
        };
        let line = wrapped.font.line_height();
        assert_eq!(rec.measure_text("aaaaa bbbbb ccccc", &wrapped, 30.0), 3.0 * line);
        assert_eq!(rec.measure_text("aaaaa bbbbb ccccc", &single, 30.0), line);
        assert_eq!(rec.measure_text("one\ntwo", &single, 30.0), 2.0 * line);
        assert_eq!(rec.measure_text("<b>aa</b> <i>bb</i>", &rich, 30.0), line);
    }

    #[test]
    fn rich_text_draws_plain_lines() {
        let mut rec = started();
        let style = TextStyle {
            rich_text: true,
            wrap: false,
            ..TextStyle::default()
        };
        rec.draw_text(Rect::new(0.0, 0.0, 200.0, 24.0), "<b>Total</b><br/>due &amp; paid", &style)
            .unwrap();
        assert!(rec.layout().pages[0].find_text("Total\ndue & paid").is_some());
    }
}
