//! Pipeline – ties together loading, pagination, and rendering into a single
//! function call.

use std::borrow::Cow;

use crate::backend::LayoutRecorder;
use crate::datasource::DataSets;
use crate::error::Result;
use crate::fonts::FontManager;
use crate::layout_config::LayoutConfig;
use crate::model::{Orientation, Report};
use crate::pagination::{RenderOptions, RenderSummary, ReportRenderer};
use crate::render::render_pdf;
use crate::schema::{load_report, Registry};

/// Configuration for the PDF generation pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Overrides the report title embedded in the PDF metadata.
    pub title: Option<String>,
    /// Overrides the report orientation.
    pub orientation: Option<Orientation>,
    /// Engine options (error policy, cancellation, default font).
    pub render: RenderOptions,
    /// Metrics used for wrapping and expanding text.
    pub fonts: FontManager,
}

impl PipelineConfig {
    /// Landscape config with default options.
    pub fn landscape() -> Self {
        Self {
            orientation: Some(Orientation::Landscape),
            ..Self::default()
        }
    }

    fn apply<'r>(&self, report: &'r Report) -> Cow<'r, Report> {
        if self.title.is_none() && self.orientation.is_none() {
            return Cow::Borrowed(report);
        }
        let mut owned = report.clone();
        if let Some(title) = &self.title {
            owned.title = title.clone();
        }
        if let Some(orientation) = self.orientation {
            owned.orientation = orientation;
        }
        Cow::Owned(owned)
    }
}

/// Paginate `report` against `data`, recording every draw call.
pub fn render_report(
    report: &Report,
    data: DataSets<'_>,
    config: &PipelineConfig,
) -> Result<(LayoutConfig, RenderSummary)> {
    let report = config.apply(report);
    let mut recorder = LayoutRecorder::with_fonts(report.title.clone(), config.fonts.clone());
    let summary = ReportRenderer::new(&report, config.render.clone())?.render(&mut recorder, data)?;

    let mut layout = recorder.into_layout();
    if layout.pages.is_empty() {
        // backend never begun: keep the page size for the writer
        let geometry = report.geometry();
        layout.page_width_pt = geometry.width;
        layout.page_height_pt = geometry.height;
    }
    log::info!(
        "report '{}': {} page(s), {} record(s)",
        report.title,
        summary.page_count,
        summary.records
    );
    Ok((layout, summary))
}

/// Generate only the layout config (no PDF rendering) – useful for testing.
pub fn compute_layout_config(report: &Report, data: DataSets<'_>, config: &PipelineConfig) -> Result<LayoutConfig> {
    Ok(render_report(report, data, config)?.0)
}

/// Full pipeline: report + data → PDF bytes.
///
/// Returns `(pdf_bytes, layout_config)`.
pub fn generate_pdf(
    report: &Report,
    data: DataSets<'_>,
    config: &PipelineConfig,
) -> Result<(Vec<u8>, LayoutConfig)> {
    let (layout, _) = render_report(report, data, config)?;
    let pdf_bytes = render_pdf(&layout)?;
    Ok((pdf_bytes, layout))
}

/// Convenience: report document JSON + data bindings JSON → PDF bytes.
pub fn generate_pdf_from_json(
    report_json: &str,
    data_json: Option<&str>,
    registry: &Registry,
    config: &PipelineConfig,
) -> Result<Vec<u8>> {
    let report = load_report(report_json, registry)?;
    let data = match data_json {
        Some(json) => DataSets::from_json(json)?,
        None => DataSets::new(),
    };
    let (bytes, _) = generate_pdf(&report, data, config)?;
    Ok(bytes)
}
