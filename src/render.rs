//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).
//!
//! Layout coordinates are top-left based; PDF is bottom-left based, so every
//! Y is flipped against the page height here and nowhere else.

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::error::{Error, Result};
use crate::layout_config::{DrawOp, LayoutConfig, TextContent};
use crate::model as m;

const PT_TO_MM: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Images that cannot be read or decoded are skipped with a `log::warn`.
/// A layout with no pages still yields a one-page document.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>> {
    if config.page_width_pt <= 0.0 || config.page_height_pt <= 0.0 {
        return Err(Error::Backend(format!(
            "invalid page size {}x{}pt",
            config.page_width_pt, config.page_height_pt
        )));
    }
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);

    // ── Pre-register all images ────────────────────────────────────────────
    let all_srcs: HashSet<&str> = config
        .pages
        .iter()
        .flat_map(|page| page.ops.iter())
        .filter_map(|op| match op {
            DrawOp::Image { image, .. } => Some(image.src.as_str()),
            _ => None,
        })
        .collect();

    let mut images: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in all_srcs {
        match register_image(&mut doc, src, &mut img_warnings) {
            Ok(res) => {
                images.insert(src.to_string(), res);
            }
            Err(e) => {
                let shown: String = src.chars().take(60).collect();
                log::warn!("Skipping image {shown:?}: {e}");
            }
        }
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|layout| {
            let mut ops = Vec::new();
            for op in &layout.ops {
                paint_op(&mut ops, op, config.page_height_pt, &images);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        log::info!("layout has no pages; writing a single blank page");
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    // Raw text operators are dropped unless `secure` is off.
    let opts = PdfSaveOptions {
        secure: false,
        ..PdfSaveOptions::default()
    };
    Ok(doc.save(&opts, &mut Vec::new()))
}

fn register_image(doc: &mut PdfDocument, src: &str, warnings: &mut Vec<PdfWarnMsg>) -> Result<ImageResource> {
    let bytes = if src.starts_with("data:") {
        parse_data_uri(src)?
    } else {
        std::fs::read(src)?
    };

    // Decode with the `image` crate to obtain pixel dimensions.
    let dyn_img = ::image::load_from_memory(&bytes).map_err(|e| Error::Image(format!("decode error: {e}")))?;
    let (px_width, px_height) = (dyn_img.width(), dyn_img.height());

    let raw = RawImage::decode_from_bytes(&bytes, warnings)
        .map_err(|e| Error::Image(format!("PDF encode error: {e}")))?;
    Ok(ImageResource {
        xobj_id: doc.add_image(&raw),
        px_width,
        px_height,
    })
}

/// Encode text as WinAnsiEncoding (Windows-1252) bytes, one byte per glyph
/// of the builtin fonts. Characters outside the code page become `?`.
fn win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| Error::Image("not a data URI".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::Image("invalid data URI: missing `,` separator".to_string()))?;
    if !header.contains(";base64") {
        return Err(Error::Image("only base64-encoded data URIs are supported".to_string()));
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| Error::Image(format!("base64 decode error: {e}")))
}

/// Map a report font onto one of the 14 standard PDF fonts.
fn builtin_font(font: &m::Font) -> BuiltinFont {
    let family = font.family.to_ascii_lowercase();
    if family.contains("times") || (family.contains("serif") && !family.contains("sans")) {
        match (font.bold, font.italic) {
            (true, true) => BuiltinFont::TimesBoldItalic,
            (true, false) => BuiltinFont::TimesBold,
            (false, true) => BuiltinFont::TimesItalic,
            (false, false) => BuiltinFont::TimesRoman,
        }
    } else if family.contains("courier") || family.contains("mono") {
        match (font.bold, font.italic) {
            (true, true) => BuiltinFont::CourierBoldOblique,
            (true, false) => BuiltinFont::CourierBold,
            (false, true) => BuiltinFont::CourierOblique,
            (false, false) => BuiltinFont::Courier,
        }
    } else {
        match (font.bold, font.italic) {
            (true, true) => BuiltinFont::HelveticaBoldOblique,
            (true, false) => BuiltinFont::HelveticaBold,
            (false, true) => BuiltinFont::HelveticaOblique,
            (false, false) => BuiltinFont::Helvetica,
        }
    }
}

fn rgb(color: m::Color) -> Color {
    Color::Rgb(Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn stroke(ops: &mut Vec<Op>, pen: &m::Pen, points: Vec<LinePoint>) {
    if pen.width <= 0.0 || pen.color.is_transparent() {
        return;
    }
    ops.push(Op::SetOutlineColor { col: rgb(pen.color) });
    ops.push(Op::SetOutlineThickness { pt: Pt(pen.width) });
    ops.push(Op::DrawLine {
        line: Line {
            points,
            is_closed: false,
        },
    });
}

/// Translate one draw op into PDF ops.
fn paint_op(ops: &mut Vec<Op>, op: &DrawOp, page_height: f32, images: &HashMap<String, ImageResource>) {
    match op {
        DrawOp::Rect { rect, border, fill } => {
            let (x1, x2) = (rect.x, rect.right());
            let (top, bottom) = (page_height - rect.y, page_height - rect.bottom());
            if let Some(fill) = fill.filter(|c| !c.is_transparent()) {
                ops.push(Op::SetFillColor { col: rgb(fill) });
                ops.push(Op::DrawPolygon {
                    polygon: Polygon {
                        rings: vec![PolygonRing {
                            points: vec![
                                point(x1, bottom),
                                point(x2, bottom),
                                point(x2, top),
                                point(x1, top),
                            ],
                        }],
                        mode: PaintMode::Fill,
                        winding_order: WindingOrder::NonZero,
                    },
                });
            }
            if let Some(border) = border {
                let edges = [
                    (border.top, (x1, top), (x2, top)),
                    (border.right, (x2, top), (x2, bottom)),
                    (border.bottom, (x1, bottom), (x2, bottom)),
                    (border.left, (x1, top), (x1, bottom)),
                ];
                for (pen, from, to) in edges {
                    if let Some(pen) = pen {
                        stroke(ops, &pen, vec![point(from.0, from.1), point(to.0, to.1)]);
                    }
                }
            }
        }
        DrawOp::Line { from, to, pen } => {
            stroke(
                ops,
                pen,
                vec![
                    point(from.x, page_height - from.y),
                    point(to.x, page_height - to.y),
                ],
            );
        }
        DrawOp::Text { rect, text } => paint_text(ops, rect, text, page_height),
        DrawOp::Image { rect, image } => {
            let Some(res) = images.get(&image.src) else {
                return;
            };
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                rect.width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                rect.height / res.px_height as f32
            } else {
                1.0
            };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(rect.x)),
                    translate_y: Some(Pt(page_height - rect.bottom())),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

fn paint_text(ops: &mut Vec<Op>, rect: &m::Rect, text: &TextContent, page_height: f32) {
    let font = builtin_font(&text.font);
    let size = text.font.size;
    // Baseline ≈ top of line + ascender (approx 0.75 × font_size)
    let ascender = size * 0.75;
    for line in text.lines.iter().filter(|l| !l.text.is_empty()) {
        let x = rect.x + line.x_offset;
        let y = page_height - rect.y - line.y_offset - ascender;
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point { x: Pt(x), y: Pt(y) },
        });
        ops.push(Op::SetFontSizeBuiltinFont { size: Pt(size), font });
        ops.push(Op::SetLineHeight {
            lh: Pt(text.line_height),
        });
        ops.push(Op::SetFillColor { col: rgb(text.color) });
        // printpdf only writes `Tj` strings from UTF-8 text, so the encoded
        // bytes go out as a raw operator. The empty write registers the font.
        ops.push(Op::WriteTextBuiltinFont { items: Vec::new(), font });
        ops.push(Op::Unknown {
            key: "Tj".to_string(),
            value: vec![DictItem::String {
                data: win_ansi(&line.text),
                literal: false,
            }],
        });
        ops.push(Op::EndTextSection);
    }
}
