//! Pagination Engine – walks the band tree against the data cursors and
//! decides where every band lands.
//!
//! Handles:
//! - page headers / footers (footer height measured once per render)
//! - sections with N columns and column headers / footers
//! - detail runs with nested groups and subdetails
//! - `force_new_page`, `force_new_page_after` and `start_new_page` hints
//! - cooperative cancellation between records
//!
//! Break ordering is fixed: the outgoing footer (column or page) is drawn
//! before the break, the incoming header right after it, then the pending
//! band is placed.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::backend::PaintBackend;
use crate::band::{self, BandOutcome};
use crate::datasource::{DataSets, DataSource};
use crate::element::{paint_frame, DrawEnv, ElementState, ErrorPolicy};
use crate::error::{Error, Result};
use crate::model::{
    Band, DetailBand, Font, PageContext, PageGeometry, Point, Rect, Report, Section, SectionItem,
};
use crate::record::{AttrPath, Record};

/// Dataset used when neither the band nor the report names one.
pub const DEFAULT_DATA_SET: &str = "data";

/// Slack for the fit check; the cursor is a running f32 sum of band heights.
const FIT_TOLERANCE: f32 = 1e-3;

/// Shared flag for cancelling a render from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call render configuration.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub error_policy: ErrorPolicy,
    /// Checked before every record.
    pub cancel: Option<CancelToken>,
    /// Font used when neither element, band nor report set one.
    pub default_font: Font,
}

/// What a placed band was doing in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandRole {
    Begin,
    PageHeader,
    PageFooter,
    Summary,
    /// Plain band inside a section.
    SectionBand,
    DetailBegin,
    ColumnHeader,
    ColumnFooter,
    /// Group header at nesting level (0 = outermost).
    GroupHeader(usize),
    GroupFooter(usize),
    Detail,
    DetailSummary,
}

/// One band placement. `rect` is relative to the printable area.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// 1-based page number.
    pub page: usize,
    pub column: usize,
    pub role: BandRole,
    pub band: Option<String>,
    pub rect: Rect,
}

/// Outcome of a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderSummary {
    pub page_count: usize,
    /// Records consumed from all cursors.
    pub records: usize,
    pub placements: Vec<Placement>,
}

impl RenderSummary {
    pub fn with_role(&self, role: BandRole) -> impl Iterator<Item = &Placement> + '_ {
        self.placements.iter().filter(move |p| p.role == role)
    }

    pub fn count(&self, role: BandRole) -> usize {
        self.with_role(role).count()
    }
}

/// The report renderer. One instance renders one report once.
pub struct ReportRenderer<'r> {
    report: &'r Report,
    options: RenderOptions,
}

impl<'r> ReportRenderer<'r> {
    /// Validate `report` and prepare a renderer for it.
    pub fn new(report: &'r Report, options: RenderOptions) -> Result<Self> {
        report.validate()?;
        Ok(Self { report, options })
    }

    /// Run the single pagination pass, painting onto `backend`.
    pub fn render(self, backend: &mut dyn PaintBackend, data: DataSets<'_>) -> Result<RenderSummary> {
        let report = self.report;
        if !report.print_if_empty {
            let name = report.data_set.as_deref().unwrap_or(DEFAULT_DATA_SET);
            if data.get(name).map_or(true, |ds| ds.is_exhausted()) {
                log::info!("dataset '{name}' is empty and printIfEmpty is off; nothing to print");
                return Ok(RenderSummary::default());
            }
        }
        let base_font = report
            .style
            .font
            .clone()
            .unwrap_or_else(|| self.options.default_font.clone());
        let geometry = report.geometry();
        let mut pager = Paginator {
            report,
            geometry,
            flow: Flow::full_width(geometry.printable_width(), 0.0),
            options: self.options,
            backend,
            data,
            base_font,
            state: ElementState::new(),
            page: 1,
            y: 0.0,
            footer_height: 0.0,
            details: Vec::new(),
            pending_break: false,
            dirty: false,
            row: 0,
            records: 0,
            last_record: Rc::new(Value::Null),
            placements: Vec::new(),
        };
        pager.run()?;
        Ok(RenderSummary {
            page_count: pager.page,
            records: pager.records,
            placements: pager.placements,
        })
    }
}

// ---------------------------------------------------------------------------
// Internal pass state
// ---------------------------------------------------------------------------

/// Column layout of the zone currently being filled.
#[derive(Debug, Clone, Copy)]
struct Flow {
    columns: usize,
    column: usize,
    width: f32,
    space: f32,
    /// Y where columns start on the current page.
    top: f32,
    /// Lowest Y reached by any column on the current page.
    max_y: f32,
}

impl Flow {
    fn full_width(width: f32, top: f32) -> Self {
        Self {
            columns: 1,
            column: 0,
            width,
            space: 0.0,
            top,
            max_y: top,
        }
    }

    fn for_section(section: &Section, printable_width: f32, top: f32) -> Self {
        Self {
            columns: section.columns,
            column: 0,
            width: section.column_width(printable_width),
            space: section.column_space,
            top,
            max_y: top,
        }
    }

    fn x(&self) -> f32 {
        self.column as f32 * (self.width + self.space)
    }
}

/// A detail run whose column header / footer repeat on breaks.
struct ActiveDetail<'r> {
    detail: &'r DetailBand,
    /// Measured once when the run starts.
    column_footer_height: f32,
}

struct Paginator<'r, 'b, 'd> {
    report: &'r Report,
    geometry: PageGeometry,
    flow: Flow,
    options: RenderOptions,
    backend: &'b mut dyn PaintBackend,
    data: DataSets<'d>,
    base_font: Font,
    state: ElementState,
    page: usize,
    /// Cursor relative to the printable top.
    y: f32,
    footer_height: f32,
    details: Vec<ActiveDetail<'r>>,
    /// Set by `force_new_page_after`; honoured before the next placement.
    pending_break: bool,
    /// Content other than the page header has been placed on this page.
    dirty: bool,
    row: usize,
    records: usize,
    last_record: Rc<Record>,
    placements: Vec<Placement>,
}

impl<'r, 'b, 'd> Paginator<'r, 'b, 'd> {
    fn run(&mut self) -> Result<()> {
        let report = self.report;
        self.backend.begin_document(&self.geometry)?;
        self.paint_page_frame()?;

        if let Some(footer) = &report.footer {
            let record = Rc::clone(&self.last_record);
            self.footer_height = self.measure(footer, &record)?;
        }
        if report.header_in_first_page {
            self.render_page_header()?;
        }
        self.flow = Flow::full_width(self.geometry.printable_width(), self.y);

        if let Some(begin) = &report.begin {
            let record = Rc::clone(&self.last_record);
            self.place(begin, &record, BandRole::Begin)?;
        }
        for section in &report.sections {
            self.run_section(section)?;
        }
        if let Some(summary) = &report.summary {
            let record = Rc::clone(&self.last_record);
            self.place(summary, &record, BandRole::Summary)?;
        }
        if report.footer_in_last_page {
            self.render_page_footer()?;
        }
        self.backend.end_document()?;
        log::info!(
            "rendered {} page(s), {} record(s), {} placement(s)",
            self.page,
            self.records,
            self.placements.len()
        );
        Ok(())
    }

    // -- sections and detail runs ------------------------------------------

    fn run_section(&mut self, section: &'r Section) -> Result<()> {
        self.flow = Flow::for_section(section, self.geometry.printable_width(), self.y);
        for item in &section.items {
            match item {
                SectionItem::Band(band) => {
                    let record = Rc::clone(&self.last_record);
                    self.place(band, &record, BandRole::SectionBand)?;
                }
                SectionItem::Detail(detail) => {
                    let report = self.report;
                    let name = detail
                        .band
                        .data_set
                        .as_deref()
                        .or(report.data_set.as_deref())
                        .unwrap_or(DEFAULT_DATA_SET);
                    match self.data.take(name) {
                        Some(mut cursor) => {
                            let result = self.run_detail(detail, &mut cursor);
                            self.data.restore(name, cursor);
                            result?;
                        }
                        None => {
                            log::warn!("dataset '{name}' is not bound; treating it as empty");
                            self.run_detail(detail, &mut DataSource::new(Vec::new()))?;
                        }
                    }
                }
            }
        }
        self.y = self.y.max(self.flow.max_y);
        self.flow = Flow::full_width(self.geometry.printable_width(), self.y);
        Ok(())
    }

    fn run_detail(&mut self, detail: &'r DetailBand, cursor: &mut DataSource<'_>) -> Result<()> {
        let first = cursor.current().cloned();
        if first.is_none() && !detail.render_if_empty {
            log::debug!("detail band {} has no records; skipped", detail.band.label());
            return Ok(());
        }
        if detail.band.start_new_page {
            self.break_page_if_dirty()?;
        }
        let opening = first.clone().unwrap_or_else(|| Rc::new(Value::Null));

        let column_footer_height = match &detail.column_footer {
            Some(footer) => self.measure(footer, &opening)?,
            None => 0.0,
        };
        self.details.push(ActiveDetail {
            detail,
            column_footer_height,
        });

        if let Some(begin) = &detail.begin {
            self.place(begin, &opening, BandRole::DetailBegin)?;
        }
        if let Some(header) = &detail.column_header {
            self.place(header, &opening, BandRole::ColumnHeader)?;
        }

        let closing = if first.is_some() {
            self.run_records(detail, cursor)?
        } else {
            self.place(&detail.band, &opening, BandRole::Detail)?;
            opening
        };

        if let Some(summary) = &detail.summary {
            self.place(summary, &closing, BandRole::DetailSummary)?;
        }
        if let Some(footer) = &detail.column_footer {
            self.place_at_cursor(footer, &closing, BandRole::ColumnFooter)?;
        }
        self.details.pop();
        Ok(())
    }

    /// The per-record loop. Returns the last record for closing bands.
    fn run_records(&mut self, detail: &'r DetailBand, cursor: &mut DataSource<'_>) -> Result<Rc<Record>> {
        let groups = &detail.groups;
        let mut keys: Vec<Option<Value>> = vec![None; groups.len()];

        while let Some(record) = cursor.current().cloned() {
            if let Some(token) = &self.options.cancel {
                if token.is_cancelled() {
                    return Err(Error::Cancelled {
                        page: self.page,
                        records: self.records,
                    });
                }
            }
            self.row = cursor.index();
            self.records += 1;
            self.last_record = Rc::clone(&record);

            let fresh: Vec<Value> = groups.iter().map(|g| g.expression.call(&record)).collect();
            let changed = keys
                .iter()
                .zip(&fresh)
                .position(|(old, new)| old.as_ref() != Some(new));
            if let Some(level) = changed {
                if let Some(previous) = cursor.previous().cloned() {
                    self.close_groups(detail, &keys, level, &previous)?;
                }
                for (i, group) in groups.iter().enumerate().skip(level) {
                    log::debug!("group {i} starts with key {}", fresh[i]);
                    keys[i] = Some(fresh[i].clone());
                    if let Some(hook) = &group.on_new_group {
                        hook.call(&fresh[i]);
                    }
                    if let Some(header) = &group.header {
                        self.place(header, &record, BandRole::GroupHeader(i))?;
                    }
                }
            }

            self.place(&detail.band, &record, BandRole::Detail)?;

            for sub in &detail.subdetails {
                self.run_subdetail(sub, &record, cursor.index())?;
            }

            if cursor.advance().is_err() {
                break;
            }
        }

        let last = cursor
            .previous()
            .cloned()
            .unwrap_or_else(|| Rc::clone(&self.last_record));
        self.close_groups(detail, &keys, 0, &last)?;
        self.last_record = Rc::clone(&last);
        Ok(last)
    }

    /// Footers for open groups `level..`, innermost first.
    fn close_groups(
        &mut self,
        detail: &'r DetailBand,
        keys: &[Option<Value>],
        level: usize,
        record: &Rc<Record>,
    ) -> Result<()> {
        for i in (level..detail.groups.len()).rev() {
            if keys[i].is_none() {
                continue;
            }
            if let Some(footer) = &detail.groups[i].footer {
                self.place(footer, record, BandRole::GroupFooter(i))?;
            }
        }
        Ok(())
    }

    fn run_subdetail(&mut self, sub: &'r DetailBand, parent: &Rc<Record>, index: usize) -> Result<()> {
        let raw_path = sub.band.data_set.as_deref().unwrap_or_default();
        let missing = || Error::MissingSubdetail {
            band: sub.band.label().to_string(),
            record_index: index,
            path: raw_path.to_string(),
        };
        let path = AttrPath::parse(raw_path).ok_or_else(missing)?;
        let items = match path.resolve(parent) {
            Ok(Value::Array(items)) => items.clone(),
            Ok(Value::Null) => Vec::new(),
            _ => return Err(missing()),
        };
        let mut cursor = DataSource::new(items);
        let result = self.run_detail(sub, &mut cursor);
        self.last_record = Rc::clone(parent);
        result
    }

    // -- placement ---------------------------------------------------------

    /// Place a flowing band at the cursor, breaking first when it does not fit.
    fn place(&mut self, band: &'r Band, record: &Rc<Record>, role: BandRole) -> Result<()> {
        if self.pending_break {
            self.pending_break = false;
            self.break_page()?;
        }
        if band.force_new_page || (band.start_new_page && role == BandRole::SectionBand) {
            self.break_page_if_dirty()?;
        }

        let outer = self.state.begin_pass();
        let placed = self.place_measured(band, record, role);
        self.state.end_pass(outer);
        placed?;

        if band.force_new_page_after {
            self.pending_break = true;
        }
        Ok(())
    }

    fn place_measured(&mut self, band: &'r Band, record: &Rc<Record>, role: BandRole) -> Result<()> {
        if band::vetoed(band, record) {
            log::trace!("band {} vetoed by on_before_print", band.label());
            return Ok(());
        }
        let height = self.measure(band, record)?;
        // An empty column cannot do better; overflow instead of looping.
        if self.y + height > self.detail_bottom() + FIT_TOLERANCE && self.y > self.flow.top {
            self.break_column()?;
        }
        let outcome = self.draw(band, self.flow.x(), self.y, self.flow.width, record, role)?;
        if outcome.rendered {
            self.y += outcome.height;
            self.flow.max_y = self.flow.max_y.max(self.y);
            self.dirty = true;
        }
        Ok(())
    }

    /// Draw at the cursor without a fit check (space is reserved).
    fn place_at_cursor(&mut self, band: &'r Band, record: &Rc<Record>, role: BandRole) -> Result<()> {
        let outer = self.state.begin_pass();
        let drawn = self.draw(band, self.flow.x(), self.y, self.flow.width, record, role);
        self.state.end_pass(outer);
        let outcome = drawn?;
        self.y += outcome.height;
        self.flow.max_y = self.flow.max_y.max(self.y);
        Ok(())
    }

    fn measure(&mut self, band: &Band, record: &Record) -> Result<f32> {
        let mut env = DrawEnv {
            backend: &mut *self.backend,
            state: &mut self.state,
            policy: &self.options.error_policy,
            page: PageContext {
                page: self.page,
                row: self.row,
            },
        };
        band::render_height(band, record, &self.base_font, &mut env)
    }

    /// Render `band` at `(x, y)` relative to the printable area and record
    /// the placement.
    fn draw(
        &mut self,
        band: &'r Band,
        x: f32,
        y: f32,
        width: f32,
        record: &Record,
        role: BandRole,
    ) -> Result<BandOutcome> {
        let origin = Point::new(self.geometry.margins.left + x, self.geometry.margins.top + y);
        let mut env = DrawEnv {
            backend: &mut *self.backend,
            state: &mut self.state,
            policy: &self.options.error_policy,
            page: PageContext {
                page: self.page,
                row: self.row,
            },
        };
        let outcome = band::render(band, origin, width, record, &self.base_font, &mut env)?;
        if outcome.rendered {
            log::trace!(
                "page {} col {}: {:?} {} at y={:.2} h={:.2}",
                self.page,
                self.flow.column,
                role,
                band.label(),
                y,
                outcome.height
            );
            self.placements.push(Placement {
                page: self.page,
                column: self.flow.column,
                role,
                band: band.name.clone(),
                rect: Rect::new(x, y, width, outcome.height),
            });
        }
        Ok(outcome)
    }

    // -- breaks ------------------------------------------------------------

    /// Lowest Y flowing content may reach on this page.
    fn detail_bottom(&self) -> f32 {
        let reserved: f32 = self.details.iter().map(|d| d.column_footer_height).sum();
        self.geometry.printable_height() - self.footer_height - reserved
    }

    /// Move to the next column, or to a new page when columns run out.
    fn break_column(&mut self) -> Result<()> {
        self.render_column_footers()?;
        if self.flow.column + 1 < self.flow.columns {
            self.flow.column += 1;
            self.y = self.flow.top;
            log::debug!("page {}: column break to column {}", self.page, self.flow.column);
        } else {
            self.advance_page()?;
        }
        self.render_column_headers()
    }

    /// Unconditional page break with column footer / header repetition.
    fn break_page(&mut self) -> Result<()> {
        self.render_column_footers()?;
        self.advance_page()?;
        self.render_column_headers()
    }

    fn break_page_if_dirty(&mut self) -> Result<()> {
        if self.dirty {
            self.break_page()?;
        }
        Ok(())
    }

    fn advance_page(&mut self) -> Result<()> {
        self.render_page_footer()?;
        self.backend.new_page()?;
        self.page += 1;
        log::debug!("page break to page {}", self.page);
        self.paint_page_frame()?;
        self.y = 0.0;
        self.dirty = false;
        self.render_page_header()?;
        self.flow.column = 0;
        self.flow.top = self.y;
        self.flow.max_y = self.y;
        Ok(())
    }

    fn render_page_header(&mut self) -> Result<()> {
        let report = self.report;
        if let Some(header) = &report.header {
            let record = Rc::clone(&self.last_record);
            let outer = self.state.begin_pass();
            let width = self.geometry.printable_width();
            let drawn = self.draw(header, 0.0, self.y, width, &record, BandRole::PageHeader);
            self.state.end_pass(outer);
            self.y += drawn?.height;
        }
        Ok(())
    }

    fn render_page_footer(&mut self) -> Result<()> {
        let report = self.report;
        if let Some(footer) = &report.footer {
            let record = Rc::clone(&self.last_record);
            let outer = self.state.begin_pass();
            let y = self.geometry.printable_height() - self.footer_height;
            let width = self.geometry.printable_width();
            let drawn = self.draw(footer, 0.0, y, width, &record, BandRole::PageFooter);
            self.state.end_pass(outer);
            drawn?;
        }
        Ok(())
    }

    /// Column footers of all active runs, innermost first, at the cursor.
    fn render_column_footers(&mut self) -> Result<()> {
        let record = Rc::clone(&self.last_record);
        for i in (0..self.details.len()).rev() {
            let detail = self.details[i].detail;
            if let Some(footer) = &detail.column_footer {
                self.place_at_cursor(footer, &record, BandRole::ColumnFooter)?;
            }
        }
        Ok(())
    }

    /// Column headers of all active runs, outermost first.
    fn render_column_headers(&mut self) -> Result<()> {
        let record = Rc::clone(&self.last_record);
        for i in 0..self.details.len() {
            let detail = self.details[i].detail;
            if let Some(header) = &detail.column_header {
                self.place_at_cursor(header, &record, BandRole::ColumnHeader)?;
            }
        }
        Ok(())
    }

    /// Report border / background over the printable area.
    fn paint_page_frame(&mut self) -> Result<()> {
        paint_frame(&mut *self.backend, self.geometry.printable_rect(), &self.report.style)
    }
}
