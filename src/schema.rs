//! Persisted report documents.
//!
//! A report document is a JSON object tree mirroring the model. Elements carry
//! a `type` discriminator (`label`, `field`, `function`, `line`, `box`,
//! `image`); bands carry optional children under `begin`, `header`, `footer`,
//! `summary`, `child`, `columnHeader`, `columnFooter`, `detailBegin`,
//! `detailSummary`, `groups`, `sections` and `detailBands`. Every optional
//! key defaults to absent. A section lists its bands in print order under
//! `items`, each entry tagged `band` or `detail`. A report uses either the
//! `detail` shorthand or `sections`, never both.
//!
//! Callbacks cannot be serialised, so documents reference them by name and a
//! [`Registry`] supplies the closures at load time.
//!
//! ```json
//! {
//!   "title": "Foods",
//!   "unit": "mm",
//!   "dataSet": "foods",
//!   "header": { "height": 10, "elements": [
//!     { "type": "label", "left": 0, "top": 0, "width": 100, "height": 10, "text": "Foods" }
//!   ]},
//!   "detail": { "height": 5, "elements": [
//!     { "type": "field", "left": 0, "top": 0, "width": 40, "height": 5, "attrName": "name" }
//!   ]}
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    mm, Align, Band, BeforePrint, Border, Color, DetailBand, DetailGroup, Element, ElementKind, Font,
    Formatter, GroupExpr, ImageSource, Margins, NewGroupHook, Orientation, PaperSize, Pen, Rect, Report,
    Section, Style, TextElement, TextFn, TextSource, VAlign,
};
use crate::record::{display_value, AttrPath};

// ---------------------------------------------------------------------------
// Callback registry
// ---------------------------------------------------------------------------

/// Named callbacks referenced from report documents.
#[derive(Debug, Clone)]
pub struct Registry {
    functions: HashMap<String, TextFn>,
    formatters: HashMap<String, Formatter>,
    expressions: HashMap<String, GroupExpr>,
    before_print: HashMap<String, BeforePrint>,
    group_hooks: HashMap<String, NewGroupHook>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry holding the built-in functions `page`, `row` and `record`.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
            formatters: HashMap::new(),
            expressions: HashMap::new(),
            before_print: HashMap::new(),
            group_hooks: HashMap::new(),
        };
        registry
            .register_function("page", TextFn::new(|_, ctx| ctx.page.to_string()))
            .register_function("row", TextFn::new(|_, ctx| (ctx.row + 1).to_string()))
            .register_function("record", TextFn::from_record(display_value));
        registry
    }

    pub fn register_function(&mut self, name: impl Into<String>, f: TextFn) -> &mut Self {
        self.functions.insert(name.into(), f);
        self
    }

    pub fn register_formatter(&mut self, name: impl Into<String>, f: Formatter) -> &mut Self {
        self.formatters.insert(name.into(), f);
        self
    }

    pub fn register_expression(&mut self, name: impl Into<String>, f: GroupExpr) -> &mut Self {
        self.expressions.insert(name.into(), f);
        self
    }

    pub fn register_before_print(&mut self, name: impl Into<String>, f: BeforePrint) -> &mut Self {
        self.before_print.insert(name.into(), f);
        self
    }

    pub fn register_group_hook(&mut self, name: impl Into<String>, f: NewGroupHook) -> &mut Self {
        self.group_hooks.insert(name.into(), f);
        self
    }

    fn lookup<T: Clone>(table: &HashMap<String, T>, kind: &str, name: &str) -> Result<T> {
        table
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("unknown {kind} '{name}'")))
    }
}

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// Length unit for every geometry value in a document. Font sizes and pen
/// widths are always points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Pt,
    Mm,
}

impl Unit {
    fn to_pt(self, value: f32) -> f32 {
        match self {
            Unit::Pt => value,
            Unit::Mm => mm(value),
        }
    }
}

/// Pen written as `{ "color": "#rrggbb", "width": 1.0 }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PenDoc {
    pub color: Option<String>,
    pub width: Option<f32>,
}

/// One pen for all edges, or `[top, right, bottom, left]` with `null` gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BorderDoc {
    Edges(Vec<Option<PenDoc>>),
    All(PenDoc),
}

/// A single value for all four margins, or `[top, right, bottom, left]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarginsDoc {
    Uniform(f32),
    Edges([f32; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Label,
    Field,
    Function,
    Line,
    Box,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDoc {
    #[serde(rename = "type")]
    pub kind: ElementType,
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    pub text: Option<String>,
    pub attr_name: Option<String>,
    pub formatter: Option<String>,
    pub function: Option<String>,
    pub src: Option<PathBuf>,
    pub data: Option<String>,
    pub font: Option<Font>,
    pub pen: Option<PenDoc>,
    pub border: Option<BorderDoc>,
    pub background: Option<String>,
    #[serde(default)]
    pub expand: bool,
    #[serde(default)]
    pub no_repeat: bool,
    #[serde(default)]
    pub rich_text: bool,
    pub align: Option<Align>,
    pub valign: Option<VAlign>,
    pub wrap: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandDoc {
    pub name: Option<String>,
    pub height: f32,
    pub elements: Vec<ElementDoc>,
    pub child: Option<Box<BandDoc>>,
    pub font: Option<Font>,
    pub border: Option<BorderDoc>,
    pub background: Option<String>,
    pub force_new_page: bool,
    pub force_new_page_after: bool,
    pub start_new_page: bool,
    pub expand: bool,
    pub data_set: Option<String>,
    pub on_before_print: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupDoc {
    /// Registered expression name, or an attribute path.
    pub expression: String,
    pub header: Option<BandDoc>,
    pub footer: Option<BandDoc>,
    pub on_new_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailBandDoc {
    #[serde(flatten)]
    pub band: BandDoc,
    pub groups: Vec<GroupDoc>,
    /// Nested subdetails; their `dataSet` is an attribute path.
    pub detail_bands: Vec<DetailBandDoc>,
    pub column_header: Option<BandDoc>,
    pub column_footer: Option<BandDoc>,
    pub detail_begin: Option<BandDoc>,
    pub detail_summary: Option<BandDoc>,
    pub render_if_empty: bool,
}

/// One entry of a section's ordered `items`: `{"band": {..}}` or `{"detail": {..}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionItemDoc {
    Band(BandDoc),
    Detail(DetailBandDoc),
}

/// A section lists its bands in print order under `items`. The older
/// `bands` + `detailBands` pair still loads, plain bands first, but cannot
/// be mixed with `items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionDoc {
    pub columns: usize,
    pub column_space: f32,
    pub items: Vec<SectionItemDoc>,
    pub bands: Vec<BandDoc>,
    pub detail_bands: Vec<DetailBandDoc>,
}

impl Default for SectionDoc {
    fn default() -> Self {
        Self {
            columns: 1,
            column_space: 0.0,
            items: Vec::new(),
            bands: Vec::new(),
            detail_bands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportDoc {
    pub title: Option<String>,
    pub unit: Unit,
    pub paper_size: Option<PaperSize>,
    pub orientation: Option<Orientation>,
    pub margins: Option<MarginsDoc>,
    pub font: Option<Font>,
    pub border: Option<BorderDoc>,
    pub background: Option<String>,
    pub data_set: Option<String>,
    pub print_if_empty: Option<bool>,
    pub header_in_first_page: Option<bool>,
    pub footer_in_last_page: Option<bool>,
    pub begin: Option<BandDoc>,
    pub header: Option<BandDoc>,
    pub footer: Option<BandDoc>,
    pub summary: Option<BandDoc>,
    /// Shorthand for a one-column section holding this band.
    pub detail: Option<DetailBandDoc>,
    pub sections: Vec<SectionDoc>,
}

impl ReportDoc {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve names against `registry` and build a validated [`Report`].
    pub fn into_report(self, registry: &Registry) -> Result<Report> {
        let cx = Loader {
            registry,
            unit: self.unit,
        };
        let defaults = Report::default();
        let margins = match self.margins {
            None => defaults.margins,
            Some(MarginsDoc::Uniform(v)) => Margins::uniform(cx.len(v)),
            Some(MarginsDoc::Edges([top, right, bottom, left])) => {
                Margins::new(cx.len(top), cx.len(right), cx.len(bottom), cx.len(left))
            }
        };
        if self.detail.is_some() && !self.sections.is_empty() {
            return Err(Error::config("report: use either `detail` or `sections`, not both"));
        }
        let mut sections = Vec::with_capacity(self.sections.len() + 1);
        if let Some(detail) = self.detail {
            sections.push(Section::new(1, 0.0).with_detail(cx.detail(detail, "detail")?));
        }
        for (i, section) in self.sections.into_iter().enumerate() {
            sections.push(cx.section(section, &format!("sections[{i}]"))?);
        }
        let report = Report {
            title: self.title.unwrap_or(defaults.title),
            paper: self.paper_size.unwrap_or(defaults.paper),
            orientation: self.orientation.unwrap_or(defaults.orientation),
            margins,
            style: cx.style(self.font, None, self.border, self.background, "report")?,
            begin: cx.opt_band(self.begin, "begin")?,
            header: cx.opt_band(self.header, "header")?,
            sections,
            footer: cx.opt_band(self.footer, "footer")?,
            summary: cx.opt_band(self.summary, "summary")?,
            data_set: self.data_set,
            header_in_first_page: self.header_in_first_page.unwrap_or(defaults.header_in_first_page),
            footer_in_last_page: self.footer_in_last_page.unwrap_or(defaults.footer_in_last_page),
            print_if_empty: self.print_if_empty.unwrap_or(defaults.print_if_empty),
        };
        report.validate()?;
        Ok(report)
    }
}

impl Report {
    /// Load a report document, resolving callbacks through `registry`.
    pub fn from_json(json: &str, registry: &Registry) -> Result<Self> {
        load_report(json, registry)
    }
}

pub fn load_report(json: &str, registry: &Registry) -> Result<Report> {
    ReportDoc::from_json(json)?.into_report(registry)
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

struct Loader<'a> {
    registry: &'a Registry,
    unit: Unit,
}

impl Loader<'_> {
    fn len(&self, value: f32) -> f32 {
        self.unit.to_pt(value)
    }

    fn section(&self, doc: SectionDoc, at: &str) -> Result<Section> {
        let mut section = Section::new(doc.columns, self.len(doc.column_space));
        if !doc.items.is_empty() && !(doc.bands.is_empty() && doc.detail_bands.is_empty()) {
            return Err(Error::config(format!(
                "{at}: use either `items` or `bands`/`detailBands`, not both"
            )));
        }
        for (i, item) in doc.items.into_iter().enumerate() {
            let at = format!("{at}.items[{i}]");
            section = match item {
                SectionItemDoc::Band(band) => section.with_band(self.band(band, &at)?),
                SectionItemDoc::Detail(detail) => section.with_detail(self.detail(detail, &at)?),
            };
        }
        for (i, band) in doc.bands.into_iter().enumerate() {
            section = section.with_band(self.band(band, &format!("{at}.bands[{i}]"))?);
        }
        for (i, detail) in doc.detail_bands.into_iter().enumerate() {
            section = section.with_detail(self.detail(detail, &format!("{at}.detailBands[{i}]"))?);
        }
        Ok(section)
    }

    fn detail(&self, doc: DetailBandDoc, at: &str) -> Result<DetailBand> {
        let mut detail = DetailBand::new(self.band(doc.band, at)?).render_if_empty(doc.render_if_empty);
        for (i, group) in doc.groups.into_iter().enumerate() {
            detail = detail.with_group(self.group(group, &format!("{at}.groups[{i}]"))?);
        }
        for (i, sub) in doc.detail_bands.into_iter().enumerate() {
            detail = detail.with_subdetail(self.detail(sub, &format!("{at}.detailBands[{i}]"))?);
        }
        detail.column_header = self.opt_band(doc.column_header, &format!("{at}.columnHeader"))?;
        detail.column_footer = self.opt_band(doc.column_footer, &format!("{at}.columnFooter"))?;
        detail.begin = self.opt_band(doc.detail_begin, &format!("{at}.detailBegin"))?;
        detail.summary = self.opt_band(doc.detail_summary, &format!("{at}.detailSummary"))?;
        Ok(detail)
    }

    fn group(&self, doc: GroupDoc, at: &str) -> Result<DetailGroup> {
        let mut group = match self.registry.expressions.get(&doc.expression) {
            Some(expr) => DetailGroup::new(expr.clone()),
            None => DetailGroup::by_path(&doc.expression)
                .map_err(|_| Error::config(format!("{at}: invalid group expression '{}'", doc.expression)))?,
        };
        group.header = self.opt_band(doc.header, &format!("{at}.header"))?;
        group.footer = self.opt_band(doc.footer, &format!("{at}.footer"))?;
        if let Some(name) = doc.on_new_group {
            group.on_new_group = Some(Registry::lookup(&self.registry.group_hooks, "group hook", &name)?);
        }
        Ok(group)
    }

    fn opt_band(&self, doc: Option<BandDoc>, at: &str) -> Result<Option<Band>> {
        doc.map(|d| self.band(d, at)).transpose()
    }

    fn band(&self, doc: BandDoc, at: &str) -> Result<Band> {
        let mut elements = Vec::with_capacity(doc.elements.len());
        for (i, el) in doc.elements.into_iter().enumerate() {
            elements.push(self.element(el, &format!("{at}.elements[{i}]"))?);
        }
        let child = match doc.child {
            Some(child) => Some(Box::new(self.band(*child, &format!("{at}.child"))?)),
            None => None,
        };
        let on_before_print = match doc.on_before_print {
            Some(name) => Some(Registry::lookup(&self.registry.before_print, "onBeforePrint", &name)?),
            None => None,
        };
        Ok(Band {
            name: doc.name,
            height: self.len(doc.height),
            elements,
            child,
            style: self.style(doc.font, None, doc.border, doc.background, at)?,
            force_new_page: doc.force_new_page,
            force_new_page_after: doc.force_new_page_after,
            start_new_page: doc.start_new_page,
            expand: doc.expand,
            data_set: doc.data_set,
            on_before_print,
        })
    }

    fn element(&self, doc: ElementDoc, at: &str) -> Result<Element> {
        let frame = Rect::new(
            self.len(doc.left),
            self.len(doc.top),
            self.len(doc.width),
            self.len(doc.height),
        );
        let kind = match doc.kind {
            ElementType::Label => self.text(TextSource::Label(doc.text.clone().unwrap_or_default()), &doc),
            ElementType::Field => {
                let raw = doc
                    .attr_name
                    .as_deref()
                    .ok_or_else(|| Error::config(format!("{at}: field element requires attrName")))?;
                let path = AttrPath::parse(raw)
                    .ok_or_else(|| Error::config(format!("{at}: invalid attrName '{raw}'")))?;
                let formatter = match &doc.formatter {
                    Some(name) => Some(Registry::lookup(&self.registry.formatters, "formatter", name)?),
                    None => None,
                };
                self.text(TextSource::Field { path, formatter }, &doc)
            }
            ElementType::Function => {
                let name = doc
                    .function
                    .as_deref()
                    .ok_or_else(|| Error::config(format!("{at}: function element requires function")))?;
                let f = Registry::lookup(&self.registry.functions, "function", name)?;
                self.text(TextSource::Function(f), &doc)
            }
            ElementType::Line => ElementKind::Line,
            ElementType::Box => ElementKind::Box,
            ElementType::Image => ElementKind::Image(image_source(&doc, at)?),
        };
        let style = self.style(doc.font, doc.pen, doc.border, doc.background, at)?;
        Ok(Element { frame, style, kind })
    }

    fn text(&self, source: TextSource, doc: &ElementDoc) -> ElementKind {
        let mut text = TextElement::new(source);
        text.expand = doc.expand;
        text.no_repeat = doc.no_repeat;
        text.rich_text = doc.rich_text;
        text.align = doc.align.unwrap_or(text.align);
        text.valign = doc.valign.unwrap_or(text.valign);
        text.wrap = doc.wrap.unwrap_or(text.wrap);
        ElementKind::Text(text)
    }

    fn style(
        &self,
        font: Option<Font>,
        pen: Option<PenDoc>,
        border: Option<BorderDoc>,
        background: Option<String>,
        at: &str,
    ) -> Result<Style> {
        Ok(Style {
            font,
            pen: pen.map(|p| convert_pen(&p, at)).transpose()?,
            border: border.map(|b| convert_border(&b, at)).transpose()?,
            background: background.map(|c| parse_color(&c, at)).transpose()?,
        })
    }
}

fn parse_color(hex: &str, at: &str) -> Result<Color> {
    Color::from_hex(hex).ok_or_else(|| Error::config(format!("{at}: invalid color '{hex}'")))
}

fn convert_pen(doc: &PenDoc, at: &str) -> Result<Pen> {
    let default = Pen::default();
    Ok(Pen {
        color: match &doc.color {
            Some(c) => parse_color(c, at)?,
            None => default.color,
        },
        width: doc.width.unwrap_or(default.width),
    })
}

fn convert_border(doc: &BorderDoc, at: &str) -> Result<Border> {
    match doc {
        BorderDoc::All(pen) => Ok(Border::all(convert_pen(pen, at)?)),
        BorderDoc::Edges(edges) => {
            let pens = edges
                .iter()
                .map(|e| e.as_ref().map(|p| convert_pen(p, at)).transpose())
                .collect::<Result<Vec<_>>>()?;
            Border::from_edges(&pens).map_err(|e| Error::config(format!("{at}: {e}")))
        }
    }
}

/// `src` names a file; `data` is base64, optionally as a `data:` URI.
fn image_source(doc: &ElementDoc, at: &str) -> Result<ImageSource> {
    if let Some(data) = &doc.data {
        let payload = match data.split_once(";base64,") {
            Some((_, payload)) => payload,
            None => data.as_str(),
        };
        let bytes = BASE64_STD
            .decode(payload.trim())
            .map_err(|e| Error::config(format!("{at}: invalid base64 image data: {e}")))?;
        return Ok(ImageSource::Data(bytes));
    }
    match &doc.src {
        Some(path) => Ok(ImageSource::File(path.clone())),
        None => Err(Error::config(format!("{at}: image element requires src or data"))),
    }
}
