//! Font metrics and word wrapping.
//!
//! Reports normally print with the PDF builtin Helvetica family, for which we
//! use synthetic metrics. Real TTF/OTF faces can be registered per family and
//! are measured glyph by glyph with `ttf-parser`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::Font;

/// Metrics of one registered face.
#[derive(Clone)]
struct FaceData {
    /// Raw font bytes, empty for synthetic faces.
    bytes: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct FaceKey {
    family: String,
    bold: bool,
    italic: bool,
}

impl FaceKey {
    fn of(font: &Font) -> Self {
        Self {
            family: font.family.to_ascii_lowercase(),
            bold: font.bold,
            italic: font.italic,
        }
    }
}

/// Registry of font faces used for measuring text.
#[derive(Clone, Default)]
pub struct FontManager {
    faces: HashMap<FaceKey, FaceData>,
}

impl std::fmt::Debug for FontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontManager")
            .field("faces", &self.faces.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a TTF/OTF face for `family` with the given variant flags.
    pub fn load_font(&mut self, family: &str, bold: bool, italic: bool, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::Font(format!("failed to parse font for '{family}': {e}")))?;
        let data = FaceData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            bytes,
        };
        log::debug!("registered font face {family} (bold={bold}, italic={italic})");
        self.faces.insert(
            FaceKey {
                family: family.to_ascii_lowercase(),
                bold,
                italic,
            },
            data,
        );
        Ok(())
    }

    pub fn load_font_file(&mut self, family: &str, bold: bool, italic: bool, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_font(family, bold, italic, bytes)
    }

    pub fn has_face(&self, font: &Font) -> bool {
        self.faces.contains_key(&FaceKey::of(font))
    }

    /// Width of a single line of text in points.
    ///
    /// Without a registered face we use an average character width of
    /// 0.5 × size (bold ~10 % wider).
    pub fn measure_width(&self, text: &str, font: &Font) -> f32 {
        let heuristic = |text: &str| {
            let avg = if font.bold { 0.55 } else { 0.5 };
            text.chars().count() as f32 * font.size * avg
        };
        let Some(data) = self.faces.get(&FaceKey::of(font)) else {
            return heuristic(text);
        };
        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font.size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font.size * 0.5,
                    })
                    .sum()
            }
            Err(_) => heuristic(text),
        }
    }

    /// Distance from the top of a line to its baseline.
    pub fn ascender(&self, font: &Font) -> f32 {
        match self.faces.get(&FaceKey::of(font)) {
            Some(data) => data.ascender * font.size / data.units_per_em,
            None => font.size * 0.75,
        }
    }

    /// Wrap `text` into lines no wider than `max_width`.
    pub fn wrap(&self, text: &str, font: &Font, max_width: f32) -> Vec<String> {
        wrap_text(text, font, max_width, self)
    }
}

/// Word-wrap text to fit within `max_width` points. Existing newlines are
/// kept; a single word wider than the line is placed on its own line.
pub fn wrap_text(text: &str, font: &Font, max_width: f32, fonts: &FontManager) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fonts.measure_width(&candidate, font) > max_width && !current.is_empty() {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}
