//! Document Model – the static band tree a report is built from.
//!
//! ```text
//! Report
//!  ├─ begin / header / footer / summary   (Band)
//!  └─ sections: Section*
//!       └─ items: SectionItem*            (plain Band or DetailBand)
//!            └─ DetailBand
//!                 ├─ band                 (the detail row)
//!                 ├─ groups: DetailGroup* (header / footer bands)
//!                 ├─ subdetails: DetailBand*
//!                 └─ begin / summary / column_header / column_footer
//! ```
//!
//! The model is pure data plus callbacks. It is built by the caller,
//! validated once, and borrowed read-only by the pagination engine; all
//! per-render state lives in the engine.
//!
//! All lengths are PDF points (1/72 inch). Use [`mm`] to convert.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::{AttrPath, AttributeError, Record};

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

/// Convert millimetres to points.
pub fn mm(value: f32) -> f32 {
    value * MM
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, origin top-left, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.right(), self.y)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.x, self.bottom())
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    /// Same rectangle shifted by `(dx, dy)`.
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Paper sizes offered by the designer, plus arbitrary custom sizes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    B5,
    Letter,
    Legal,
    Executive,
    Custom { width: f32, height: f32 },
}

impl PaperSize {
    /// Portrait `(width, height)` in points.
    pub fn dimensions(&self) -> (f32, f32) {
        match *self {
            PaperSize::A0 => (2383.94, 3370.39),
            PaperSize::A1 => (1683.78, 2383.94),
            PaperSize::A2 => (1190.55, 1683.78),
            PaperSize::A3 => (841.89, 1190.55),
            PaperSize::A4 => (595.28, 841.89),
            PaperSize::A5 => (419.53, 595.28),
            PaperSize::B5 => (498.90, 708.66),
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
            PaperSize::Executive => (522.0, 756.0),
            PaperSize::Custom { width, height } => (width, height),
        }
    }
}

/// Page margins in points, in `(top, right, bottom, left)` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(mm(10.0))
    }
}

/// Physical page plus margins, after orientation has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margins: Margins,
}

impl PageGeometry {
    pub fn new(paper: PaperSize, orientation: Orientation, margins: Margins) -> Self {
        let (w, h) = paper.dimensions();
        let (width, height) = match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        Self {
            width,
            height,
            margins,
        }
    }

    /// Width available for content inside the margins.
    pub fn printable_width(&self) -> f32 {
        self.width - self.margins.left - self.margins.right
    }

    /// Height available for content inside the margins.
    pub fn printable_height(&self) -> f32 {
        self.height - self.margins.top - self.margins.bottom
    }

    /// The printable area in page coordinates.
    pub fn printable_rect(&self) -> Rect {
        Rect::new(
            self.margins.left,
            self.margins.top,
            self.printable_width(),
            self.printable_height(),
        )
    }
}

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    /// Parse `#rrggbb` or `#rgb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(hex[0..1].repeat(2).as_str())?,
                channel(hex[1..2].repeat(2).as_str())?,
                channel(hex[2..3].repeat(2).as_str())?,
            )),
            _ => None,
        }
    }
}

/// Stroke colour and width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pen {
    pub color: Color,
    pub width: f32,
}

impl Pen {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

impl Default for Pen {
    fn default() -> Self {
        Self::new(Color::BLACK, 0.5)
    }
}

/// Per-edge border pens. `None` leaves that edge undrawn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Border {
    pub top: Option<Pen>,
    pub right: Option<Pen>,
    pub bottom: Option<Pen>,
    pub left: Option<Pen>,
}

impl Border {
    pub fn all(pen: Pen) -> Self {
        Self {
            top: Some(pen),
            right: Some(pen),
            bottom: Some(pen),
            left: Some(pen),
        }
    }

    /// Build from one pen (all edges) or four (top, right, bottom, left).
    pub fn from_edges(edges: &[Option<Pen>]) -> Result<Self> {
        match edges {
            [one] => Ok(Self {
                top: *one,
                right: *one,
                bottom: *one,
                left: *one,
            }),
            [top, right, bottom, left] => Ok(Self {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            other => Err(Error::config(format!(
                "invalid border: expected 1 or 4 edges, got {}",
                other.len()
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub size: f32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

impl Font {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
            bold: false,
            italic: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Line advance used for wrapped text.
    pub fn line_height(&self) -> f32 {
        self.size * 1.2
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::new("Helvetica", 10.0)
    }
}

/// Visual attributes shared by reports, bands and elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub font: Option<Font>,
    pub pen: Option<Pen>,
    pub border: Option<Border>,
    pub background: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Page state visible to text callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageContext {
    /// 1-based page number.
    pub page: usize,
    /// 0-based index of the current record within its dataset.
    pub row: usize,
}

macro_rules! callback {
    ($(#[$meta:meta])* $name:ident: Fn($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Arc<dyn Fn($($ty),*) -> $ret + Send + Sync>);

        impl $name {
            pub fn new<F>(f: F) -> Self
            where
                F: Fn($($ty),*) -> $ret + Send + Sync + 'static,
            {
                Self(Arc::new(f))
            }

            pub fn call(&self, $($arg: $ty),*) -> $ret {
                (self.0)($($arg),*)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(..)"))
            }
        }
    };
}

callback! {
    /// `record, page → text` for `Function` elements.
    TextFn: Fn(record: &Record, page: &PageContext) -> String
}

callback! {
    /// Turns a resolved field value (or the resolution failure) into text.
    Formatter: Fn(value: std::result::Result<&Record, &AttributeError>) -> std::result::Result<String, String>
}

callback! {
    /// `record → grouping key`.
    GroupExpr: Fn(record: &Record) -> Value
}

callback! {
    /// `record → print?`; returning `false` vetoes the band for this pass.
    BeforePrint: Fn(record: &Record) -> bool
}

callback! {
    /// Invoked with the new key whenever a group header starts.
    NewGroupHook: Fn(key: &Value) -> ()
}

impl TextFn {
    /// Wrap a callback that only needs the record.
    pub fn from_record<F>(f: F) -> Self
    where
        F: Fn(&Record) -> String + Send + Sync + 'static,
    {
        Self::new(move |record, _| f(record))
    }
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// Where a text element gets its text.
#[derive(Debug, Clone)]
pub enum TextSource {
    Label(String),
    Field {
        path: AttrPath,
        formatter: Option<Formatter>,
    },
    Function(TextFn),
}

#[derive(Debug, Clone)]
pub struct TextElement {
    pub source: TextSource,
    /// Grow the element to fit its wrapped text.
    pub expand: bool,
    pub rich_text: bool,
    /// Skip drawing when the text equals the previously drawn text.
    pub no_repeat: bool,
    pub align: Align,
    pub valign: VAlign,
    pub wrap: bool,
}

impl TextElement {
    pub fn new(source: TextSource) -> Self {
        Self {
            source,
            expand: false,
            rich_text: false,
            no_repeat: false,
            align: Align::Left,
            valign: VAlign::Top,
            wrap: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(PathBuf),
    /// Encoded PNG / JPEG bytes.
    Data(Vec<u8>),
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Text(TextElement),
    /// Stroke from the frame's top-left to its bottom-right corner.
    Line,
    Box,
    Image(ImageSource),
}

/// A positioned element inside a band. `frame` is relative to the band origin.
#[derive(Debug, Clone)]
pub struct Element {
    pub frame: Rect,
    pub style: Style,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(frame: Rect, kind: ElementKind) -> Self {
        Self {
            frame,
            style: Style::default(),
            kind,
        }
    }

    pub fn label(frame: Rect, text: impl Into<String>) -> Self {
        Self::text(frame, TextSource::Label(text.into()))
    }

    /// A field bound to a dot-separated attribute path.
    pub fn field(frame: Rect, path: &str) -> Result<Self> {
        let path = AttrPath::parse(path)
            .ok_or_else(|| Error::config(format!("field element has invalid attrName '{path}'")))?;
        Ok(Self::text(
            frame,
            TextSource::Field {
                path,
                formatter: None,
            },
        ))
    }

    pub fn function<F>(frame: Rect, f: F) -> Self
    where
        F: Fn(&Record) -> String + Send + Sync + 'static,
    {
        Self::text(frame, TextSource::Function(TextFn::from_record(f)))
    }

    pub fn text(frame: Rect, source: TextSource) -> Self {
        Self::new(frame, ElementKind::Text(TextElement::new(source)))
    }

    pub fn line(frame: Rect) -> Self {
        Self::new(frame, ElementKind::Line)
    }

    pub fn rect(frame: Rect) -> Self {
        Self::new(frame, ElementKind::Box)
    }

    pub fn image(frame: Rect, source: ImageSource) -> Self {
        Self::new(frame, ElementKind::Image(source))
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.style.font = Some(font);
        self
    }

    pub fn with_pen(mut self, pen: Pen) -> Self {
        self.style.pen = Some(pen);
        self
    }

    pub fn with_border(mut self, border: Border) -> Self {
        self.style.border = Some(border);
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.style.background = Some(color);
        self
    }

    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        if let ElementKind::Text(TextElement {
            source: TextSource::Field { formatter: slot, .. },
            ..
        }) = &mut self.kind
        {
            *slot = Some(formatter);
        }
        self
    }

    pub fn expand(self) -> Self {
        self.map_text(|t| t.expand = true)
    }

    pub fn no_repeat(self) -> Self {
        self.map_text(|t| t.no_repeat = true)
    }

    pub fn align(self, align: Align) -> Self {
        self.map_text(|t| t.align = align)
    }

    /// Break lines only at explicit newlines.
    pub fn no_wrap(self) -> Self {
        self.map_text(|t| t.wrap = false)
    }

    /// Treat the text as HTML-like markup; only its text content is drawn.
    pub fn rich_text(self) -> Self {
        self.map_text(|t| t.rich_text = true)
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match &self.kind {
            ElementKind::Text(t) => Some(t),
            _ => None,
        }
    }

    fn map_text(mut self, f: impl FnOnce(&mut TextElement)) -> Self {
        if let ElementKind::Text(t) = &mut self.kind {
            f(t);
        }
        self
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            ElementKind::Text(t) => match &t.source {
                TextSource::Label(text) => format!("label '{text}'"),
                TextSource::Field { path, .. } => format!("field '{path}'"),
                TextSource::Function(_) => "function".to_string(),
            },
            ElementKind::Line => "line".to_string(),
            ElementKind::Box => "box".to_string(),
            ElementKind::Image(_) => "image".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// A horizontal strip of elements.
#[derive(Debug, Clone, Default)]
pub struct Band {
    /// Optional identity used in logs, placements and errors.
    pub name: Option<String>,
    /// Declared height; a floor when `expand` is set.
    pub height: f32,
    pub elements: Vec<Element>,
    /// Chained band printed immediately below this band's own height.
    pub child: Option<Box<Band>>,
    pub style: Style,
    /// Break to a new page before every placement of this band.
    pub force_new_page: bool,
    /// Break to a new page after every placement of this band.
    pub force_new_page_after: bool,
    /// Break to a new page before the band (or detail run) starts.
    pub start_new_page: bool,
    /// Grow to the bottom of the lowest element.
    pub expand: bool,
    /// Dataset name for detail bands; the record attribute path for subdetails.
    pub data_set: Option<String>,
    pub on_before_print: Option<BeforePrint>,
}

impl Band {
    pub fn new(height: f32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_elements(mut self, elements: impl IntoIterator<Item = Element>) -> Self {
        self.elements.extend(elements);
        self
    }

    pub fn with_child(mut self, child: Band) -> Self {
        self.child = Some(Box::new(child));
        self
    }

    pub fn with_data_set(mut self, name: impl Into<String>) -> Self {
        self.data_set = Some(name.into());
        self
    }

    pub fn with_border(mut self, border: Border) -> Self {
        self.style.border = Some(border);
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.style.background = Some(color);
        self
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.style.font = Some(font);
        self
    }

    pub fn expanding(mut self) -> Self {
        self.expand = true;
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    fn validate(&self, at: &str) -> Result<()> {
        if !self.height.is_finite() || self.height < 0.0 {
            return Err(Error::config(format!("{at}: band height must be >= 0")));
        }
        for element in &self.elements {
            let f = element.frame;
            if [f.x, f.y, f.width, f.height]
                .iter()
                .any(|v| !v.is_finite() || *v < 0.0)
            {
                return Err(Error::config(format!(
                    "{at}: {} has a negative or non-finite frame",
                    element.describe()
                )));
            }
        }
        if let Some(child) = &self.child {
            child.validate(&format!("{at}.child"))?;
        }
        Ok(())
    }
}

/// A run of consecutive records sharing a key.
#[derive(Debug, Clone)]
pub struct DetailGroup {
    pub expression: GroupExpr,
    pub header: Option<Band>,
    pub footer: Option<Band>,
    pub on_new_group: Option<NewGroupHook>,
}

impl DetailGroup {
    pub fn new(expression: GroupExpr) -> Self {
        Self {
            expression,
            header: None,
            footer: None,
            on_new_group: None,
        }
    }

    /// Group on the value at `path`; records lacking it group under `null`.
    pub fn by_path(path: &str) -> Result<Self> {
        let path = AttrPath::parse(path)
            .ok_or_else(|| Error::config(format!("invalid group expression '{path}'")))?;
        Ok(Self::new(GroupExpr::new(move |record| {
            path.resolve(record).cloned().unwrap_or(Value::Null)
        })))
    }

    pub fn with_header(mut self, band: Band) -> Self {
        self.header = Some(band);
        self
    }

    pub fn with_footer(mut self, band: Band) -> Self {
        self.footer = Some(band);
        self
    }

    pub fn on_new_group(mut self, hook: NewGroupHook) -> Self {
        self.on_new_group = Some(hook);
        self
    }
}

/// A band repeated once per record of a dataset.
#[derive(Debug, Clone, Default)]
pub struct DetailBand {
    pub band: Band,
    pub groups: Vec<DetailGroup>,
    /// Nested runs over a collection attribute of each record
    /// (`band.data_set` is the attribute path).
    pub subdetails: Vec<DetailBand>,
    pub column_header: Option<Band>,
    pub column_footer: Option<Band>,
    pub begin: Option<Band>,
    pub summary: Option<Band>,
    pub render_if_empty: bool,
}

impl DetailBand {
    pub fn new(band: Band) -> Self {
        Self {
            band,
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: DetailGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_subdetail(mut self, sub: DetailBand) -> Self {
        self.subdetails.push(sub);
        self
    }

    pub fn with_column_header(mut self, band: Band) -> Self {
        self.column_header = Some(band);
        self
    }

    pub fn with_column_footer(mut self, band: Band) -> Self {
        self.column_footer = Some(band);
        self
    }

    pub fn with_begin(mut self, band: Band) -> Self {
        self.begin = Some(band);
        self
    }

    pub fn with_summary(mut self, band: Band) -> Self {
        self.summary = Some(band);
        self
    }

    pub fn render_if_empty(mut self, yes: bool) -> Self {
        self.render_if_empty = yes;
        self
    }

    fn validate(&self, at: &str, nested: bool) -> Result<()> {
        self.band.validate(at)?;
        if nested && self.band.data_set.is_none() {
            return Err(Error::config(format!(
                "{at}: subdetail band needs a dataSet attribute path"
            )));
        }
        if let Some(path) = &self.band.data_set {
            if nested && AttrPath::parse(path).is_none() {
                return Err(Error::config(format!("{at}: invalid subdetail path '{path}'")));
            }
        }
        let optional = [
            ("columnHeader", &self.column_header),
            ("columnFooter", &self.column_footer),
            ("detailBegin", &self.begin),
            ("detailSummary", &self.summary),
        ];
        for (key, band) in optional {
            if let Some(band) = band {
                band.validate(&format!("{at}.{key}"))?;
            }
        }
        for (i, group) in self.groups.iter().enumerate() {
            if let Some(h) = &group.header {
                h.validate(&format!("{at}.groups[{i}].header"))?;
            }
            if let Some(f) = &group.footer {
                f.validate(&format!("{at}.groups[{i}].footer"))?;
            }
        }
        for (i, sub) in self.subdetails.iter().enumerate() {
            sub.validate(&format!("{at}.subdetails[{i}]"), true)?;
        }
        Ok(())
    }
}

/// Content of a section, in document order.
#[derive(Debug, Clone)]
pub enum SectionItem {
    /// Printed once, not bound to a dataset.
    Band(Band),
    Detail(DetailBand),
}

/// A layout zone with its own column count.
#[derive(Debug, Clone)]
pub struct Section {
    pub columns: usize,
    pub column_space: f32,
    pub items: Vec<SectionItem>,
}

impl Section {
    pub fn new(columns: usize, column_space: f32) -> Self {
        Self {
            columns,
            column_space,
            items: Vec::new(),
        }
    }

    pub fn with_band(mut self, band: Band) -> Self {
        self.items.push(SectionItem::Band(band));
        self
    }

    pub fn with_detail(mut self, detail: DetailBand) -> Self {
        self.items.push(SectionItem::Detail(detail));
        self
    }

    /// Width of one column given the printable width.
    pub fn column_width(&self, printable_width: f32) -> f32 {
        let columns = self.columns.max(1) as f32;
        (printable_width - self.column_space * (columns - 1.0)) / columns
    }

    /// Left offset of column `index` relative to the printable area.
    pub fn column_x(&self, index: usize, printable_width: f32) -> f32 {
        index as f32 * (self.column_width(printable_width) + self.column_space)
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new(1, 0.0)
    }
}

/// Root of the document model.
#[derive(Debug, Clone)]
pub struct Report {
    pub title: String,
    pub paper: PaperSize,
    pub orientation: Orientation,
    pub margins: Margins,
    /// Report font plus border/background drawn on every page.
    pub style: Style,
    pub begin: Option<Band>,
    pub header: Option<Band>,
    pub sections: Vec<Section>,
    pub footer: Option<Band>,
    pub summary: Option<Band>,
    /// Dataset used by detail bands without their own `data_set`.
    pub data_set: Option<String>,
    pub header_in_first_page: bool,
    pub footer_in_last_page: bool,
    /// When false and the default dataset is empty, nothing is emitted.
    pub print_if_empty: bool,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            title: "franq report".to_string(),
            paper: PaperSize::A4,
            orientation: Orientation::Portrait,
            margins: Margins::default(),
            style: Style::default(),
            begin: None,
            header: None,
            sections: Vec::new(),
            footer: None,
            summary: None,
            data_set: None,
            header_in_first_page: true,
            footer_in_last_page: true,
            print_if_empty: true,
        }
    }
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand: wrap a single detail band into a one-column section.
    pub fn with_detail(mut self, detail: DetailBand) -> Self {
        self.sections.push(Section::new(1, 0.0).with_detail(detail));
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_header(mut self, band: Band) -> Self {
        self.header = Some(band);
        self
    }

    pub fn with_footer(mut self, band: Band) -> Self {
        self.footer = Some(band);
        self
    }

    pub fn with_begin(mut self, band: Band) -> Self {
        self.begin = Some(band);
        self
    }

    pub fn with_summary(mut self, band: Band) -> Self {
        self.summary = Some(band);
        self
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn with_data_set(mut self, name: impl Into<String>) -> Self {
        self.data_set = Some(name.into());
        self
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::new(self.paper, self.orientation, self.margins)
    }

    /// Check structural invariants. Called before any render pass.
    pub fn validate(&self) -> Result<()> {
        let geometry = self.geometry();
        if geometry.printable_width() <= 0.0 || geometry.printable_height() <= 0.0 {
            return Err(Error::config("margins leave no printable area"));
        }
        let bands = [
            ("begin", &self.begin),
            ("header", &self.header),
            ("footer", &self.footer),
            ("summary", &self.summary),
        ];
        for (key, band) in bands {
            if let Some(band) = band {
                band.validate(key)?;
            }
        }
        for (s, section) in self.sections.iter().enumerate() {
            let at = format!("sections[{s}]");
            if section.columns == 0 {
                return Err(Error::config(format!("{at}: columns must be >= 1")));
            }
            if !section.column_space.is_finite() || section.column_space < 0.0 {
                return Err(Error::config(format!("{at}: columnSpace must be >= 0")));
            }
            if section.column_width(geometry.printable_width()) <= 0.0 {
                return Err(Error::config(format!("{at}: columns do not fit the page width")));
            }
            for (i, item) in section.items.iter().enumerate() {
                let at = format!("{at}.items[{i}]");
                match item {
                    SectionItem::Band(band) => band.validate(&at)?,
                    SectionItem::Detail(detail) => detail.validate(&at, false)?,
                }
            }
        }
        Ok(())
    }
}
