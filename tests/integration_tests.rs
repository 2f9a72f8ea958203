//! Integration tests for the franq pipeline.
//!
//! These tests validate:
//! - Band placements land where the pagination rules put them
//! - Page, column and group breaks repeat the right headers and footers
//! - Report documents load and render end to end
//! - PDF output exists and has valid format

use franq::backend::LayoutRecorder;
use franq::datasource::DataSets;
use franq::layout_config::LayoutConfig;
use franq::model::{
    mm, Band, DetailBand, DetailGroup, Element, Margins, Rect, Report, Section, TextFn, TextSource,
};
use franq::pagination::{BandRole, RenderOptions, RenderSummary, ReportRenderer};
use franq::pipeline::{compute_layout_config, generate_pdf, render_report, PipelineConfig};
use franq::render::render_pdf;
use franq::schema::{load_report, Registry};
use franq::templates;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

// =====================================================================
// Helper
// =====================================================================

fn default_config() -> PipelineConfig {
    PipelineConfig::default()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn render(report: &Report, data: DataSets<'_>) -> (LayoutConfig, RenderSummary) {
    render_report(report, data, &default_config()).unwrap()
}

fn records(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "n": i })).collect()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

// =====================================================================
// Empty documents
// =====================================================================

#[test]
fn empty_report_renders_single_blank_page() {
    let (layout, summary) = render(&Report::new(), DataSets::new());
    assert_eq!(summary.page_count, 1);
    assert_eq!(layout.pages.len(), 1);
    assert!(layout.pages[0].ops.is_empty());
}

#[test]
fn empty_detail_without_render_if_empty_contributes_nothing() {
    let detail = DetailBand::new(Band::new(mm(5.0)))
        .with_column_header(Band::new(mm(5.0)).with_element(Element::label(Rect::new(0.0, 0.0, 50.0, 10.0), "Col")))
        .with_column_footer(Band::new(mm(5.0)));
    let report = Report::new().with_detail(detail);
    let (layout, summary) = render(&report, DataSets::new().with("data", Vec::new()));
    assert_eq!(summary.page_count, 1);
    assert!(summary.placements.is_empty());
    assert!(layout.pages[0].texts().is_empty());
}

// =====================================================================
// Pagination
// =====================================================================

#[test]
fn one_record_past_capacity_starts_second_page() {
    let (header_h, footer_h, row_h) = (30.0, 20.0, 25.0);
    let report = Report::new()
        .with_header(Band::new(header_h))
        .with_footer(Band::new(footer_h))
        .with_detail(DetailBand::new(Band::new(row_h)));
    let body = report.geometry().printable_height() - header_h - footer_h;
    let fit = (body / row_h).floor() as usize;

    let (_, summary) = render(&report, DataSets::new().with("data", records(fit + 1)));

    assert_eq!(summary.page_count, 2);
    let rows: Vec<_> = summary.with_role(BandRole::Detail).collect();
    assert_eq!(rows.len(), fit + 1);
    assert!(rows[..fit].iter().all(|p| p.page == 1));
    assert_eq!(rows[fit].page, 2);
    assert_eq!(rows[fit].rect.y, header_h);
}

#[test]
fn footer_is_numbered_on_every_page() {
    let sample = templates::sample("header_footer").unwrap();
    let (layout, summary) = render(&sample.report, sample.data);
    assert_eq!(summary.page_count, 3);
    for (i, page) in layout.pages.iter().enumerate() {
        assert!(
            page.find_text(&format!("Page {}", i + 1)).is_some(),
            "page {} lacks its footer number",
            i + 1
        );
        assert!(page.find_text("Header - Title").is_some());
    }
}

#[test]
fn column_header_and_footer_repeat_across_page_break() {
    let detail = DetailBand::new(Band::new(100.0))
        .with_column_header(Band::new(10.0))
        .with_column_footer(Band::new(10.0));
    let report = Report::new().with_margins(Margins::uniform(0.0)).with_detail(detail);
    // bottom = 841.89 - 10: eight rows after the column header
    let (_, summary) = render(&report, DataSets::new().with("data", records(10)));

    assert_eq!(summary.page_count, 2);
    assert_eq!(summary.count(BandRole::ColumnHeader), 2);
    let footers: Vec<_> = summary.with_role(BandRole::ColumnFooter).collect();
    assert_eq!(footers.len(), 2);
    assert_eq!((footers[0].page, footers[0].rect.y), (1, 810.0));
    let ninth = summary.with_role(BandRole::Detail).nth(8).unwrap();
    assert_eq!((ninth.page, ninth.rect.y), (2, 10.0));
}

#[test]
fn rows_overflow_into_second_column() {
    let space = mm(10.0);
    let row_h = mm(5.0);
    let report = Report::new().with_section(Section::new(2, space).with_detail(DetailBand::new(Band::new(row_h))));
    let geometry = report.geometry();
    let (_, summary) = render(&report, DataSets::new().with("data", records(80)));

    let rows: Vec<_> = summary.with_role(BandRole::Detail).collect();
    let first = rows.iter().position(|p| p.column == 1).expect("second column used");
    assert!(first > 0);
    assert!(rows[..first].iter().all(|p| p.column == 0 && p.page == 1));
    assert!(rows[first - 1].rect.bottom() + row_h > geometry.printable_height());

    let expected_x = (geometry.printable_width() - space) / 2.0 + space;
    assert!(approx(rows[first].rect.x, expected_x), "x = {}", rows[first].rect.x);
    assert_eq!(rows[first].rect.y, 0.0);
    assert_eq!(rows[first].page, 1);
}

#[test]
fn section_after_columns_starts_below_deepest_column() {
    let report = Report::new()
        .with_margins(Margins::uniform(0.0))
        .with_section(Section::new(2, 0.0).with_detail(DetailBand::new(Band::new(400.0))))
        .with_summary(Band::new(10.0));
    // three rows: two in column 0, one in column 1
    let (_, summary) = render(&report, DataSets::new().with("data", records(3)));
    let total = summary.with_role(BandRole::Summary).next().unwrap();
    assert_eq!(total.rect.y, 800.0);
    assert_eq!(total.rect.x, 0.0);
}

// =====================================================================
// Groups
// =====================================================================

fn grouped(data: Vec<Value>) -> RenderSummary {
    let report = templates::grouped_report().unwrap();
    render(&report, DataSets::new().with("foods", data)).1
}

#[test]
fn nested_groups_emit_one_header_and_footer_per_run() {
    let summary = grouped(templates::foods());
    assert_eq!(summary.count(BandRole::GroupHeader(0)), 2);
    assert_eq!(summary.count(BandRole::GroupFooter(0)), 2);
    assert_eq!(summary.count(BandRole::GroupHeader(1)), 4);
    assert_eq!(summary.count(BandRole::GroupFooter(1)), 4);
}

#[test]
fn outer_group_change_closes_inner_first() {
    let summary = grouped(templates::foods());
    let roles: Vec<BandRole> = summary.placements.iter().map(|p| p.role).collect();
    let cut = roles
        .iter()
        .position(|r| *r == BandRole::GroupFooter(0))
        .unwrap();
    assert_eq!(
        roles[cut - 1..cut + 3],
        [
            BandRole::GroupFooter(1),
            BandRole::GroupFooter(0),
            BandRole::GroupHeader(0),
            BandRole::GroupHeader(1),
        ]
    );
}

#[test]
fn leading_duplicate_does_not_change_group_counts() {
    let mut data = templates::foods();
    data.insert(0, data[0].clone());
    let summary = grouped(data);
    assert_eq!(summary.count(BandRole::GroupHeader(0)), 2);
    assert_eq!(summary.count(BandRole::GroupFooter(1)), 4);
    assert_eq!(summary.count(BandRole::Detail), 7);
}

#[test]
fn group_footer_sees_last_record_of_its_run() {
    let footer = Band::new(10.0).with_element(Element::function(Rect::new(0.0, 0.0, 100.0, 10.0), |r| {
        format!("last {}", r["name"].as_str().unwrap_or("?"))
    }));
    let detail = DetailBand::new(Band::new(10.0))
        .with_group(DetailGroup::by_path("type").unwrap().with_footer(footer));
    let report = Report::new().with_data_set("foods").with_detail(detail);
    let (layout, _) = render(&report, DataSets::new().with("foods", templates::foods()));
    let texts: Vec<String> = layout.pages[0].texts().into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["last Cookies", "last Pear"]);
}

#[test]
fn forced_page_per_group_skips_blank_first_page() {
    let mut header = Band::new(10.0);
    header.force_new_page = true;
    let detail = DetailBand::new(Band::new(10.0)).with_group(DetailGroup::by_path("type").unwrap().with_header(header));
    let report = Report::new().with_data_set("foods").with_detail(detail);
    let (_, summary) = render(&report, DataSets::new().with("foods", templates::foods()));
    assert_eq!(summary.page_count, 2);
    let headers: Vec<usize> = summary.with_role(BandRole::GroupHeader(0)).map(|p| p.page).collect();
    assert_eq!(headers, vec![1, 2]);
}

// =====================================================================
// Elements
// =====================================================================

#[test]
fn no_repeat_draws_duplicate_values_once_but_keeps_height() {
    let row = Band::new(12.0).with_element(
        Element::field(Rect::new(0.0, 0.0, 100.0, 12.0), "v")
            .unwrap()
            .no_repeat(),
    );
    let report = Report::new().with_detail(DetailBand::new(row));
    let data = vec![json!({"v": "A"}), json!({"v": "A"}), json!({"v": "B"})];
    let (layout, summary) = render(&report, DataSets::new().with("data", data));

    let texts: Vec<String> = layout.pages[0].texts().into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["A", "B"]);
    let ys: Vec<f32> = summary.with_role(BandRole::Detail).map(|p| p.rect.y).collect();
    assert_eq!(ys, vec![0.0, 12.0, 24.0]);
}

#[test]
fn expanding_text_pushes_following_rows_down() {
    let row = Band::new(20.0).expanding().with_element(
        Element::field(Rect::new(0.0, 0.0, 60.0, 20.0), "text")
            .unwrap()
            .expand(),
    );
    let report = Report::new().with_detail(DetailBand::new(row));
    let long = "word ".repeat(40);
    let data = vec![json!({"text": long}), json!({"text": "short"})];
    let (_, summary) = render(&report, DataSets::new().with("data", data));
    let rows: Vec<_> = summary.with_role(BandRole::Detail).collect();
    assert!(rows[0].rect.height > 20.0);
    assert_eq!(rows[1].rect.y, rows[0].rect.height);
    assert_eq!(rows[1].rect.height, 20.0);
}

// =====================================================================
// End-to-end scenario
// =====================================================================

#[test]
fn title_rows_and_page_footer_scenario() {
    let header_h = mm(10.0);
    let footer_h = mm(8.0);
    let report = Report::new()
        .with_header(Band::new(header_h).with_element(Element::label(Rect::new(0.0, 0.0, 100.0, header_h), "Title")))
        .with_detail(DetailBand::new(Band::new(mm(5.0)).with_element(Element::function(
            Rect::new(0.0, 0.0, 50.0, mm(5.0)),
            franq::record::display_value,
        ))))
        .with_footer(Band::new(footer_h).with_element(Element::text(
            Rect::new(0.0, 0.0, 100.0, footer_h),
            TextSource::Function(TextFn::new(|_, ctx| format!("Page {}", ctx.page))),
        )));
    let geometry = report.geometry();
    let (layout, summary) = render(&report, DataSets::new().with("data", vec![json!(1), json!(2), json!(3)]));

    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.count(BandRole::PageHeader), 1);
    let page = &layout.pages[0];
    assert_eq!(page.find_text("Title").unwrap().y, geometry.margins.top);

    let rows: Vec<f32> = summary.with_role(BandRole::Detail).map(|p| p.rect.y).collect();
    let expected = [header_h, header_h + mm(5.0), header_h + mm(10.0)];
    assert!(rows.iter().zip(expected).all(|(a, b)| approx(*a, b)), "rows at {rows:?}");
    for (i, text) in ["1", "2", "3"].iter().enumerate() {
        assert!(approx(page.find_text(text).unwrap().y, geometry.margins.top + expected[i]));
    }

    let footer = summary.with_role(BandRole::PageFooter).next().unwrap();
    assert!(approx(footer.rect.y, geometry.printable_height() - footer_h));
    assert!(page.find_text("Page 1").is_some());
}

// =====================================================================
// Report documents
// =====================================================================

#[test]
fn document_with_subdetails_renders() {
    let doc = r#"{
        "dataSet": "orders",
        "detail": {
            "height": 14,
            "elements": [ { "type": "field", "width": 200, "height": 14, "attrName": "id" } ],
            "detailBands": [ {
                "height": 12,
                "dataSet": "lines",
                "elements": [ { "type": "field", "left": 20, "width": 200, "height": 12, "attrName": "sku" } ]
            } ]
        }
    }"#;
    let report = load_report(doc, &Registry::new()).unwrap();
    let orders = vec![
        json!({ "id": "A-1", "lines": [ { "sku": "bolt" }, { "sku": "nut" } ] }),
        json!({ "id": "A-2", "lines": [] }),
    ];
    let (layout, _) = render(&report, DataSets::new().with("orders", orders));
    let texts: Vec<String> = layout.pages[0].texts().into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["A-1", "bolt", "nut", "A-2"]);
}

#[test]
fn missing_subdetail_attribute_aborts_with_context() {
    let doc = r#"{ "detail": { "height": 10, "detailBands": [ { "name": "lines", "height": 5, "dataSet": "lines" } ] } }"#;
    let report = load_report(doc, &Registry::new()).unwrap();
    let err = render_report(
        &report,
        DataSets::new().with("data", vec![json!({ "lines": [] }), json!({})]),
        &default_config(),
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("lines") && message.contains("#1"), "{message}");
}

#[test]
fn renderer_can_drive_a_custom_recorder() {
    let report = templates::title_child_report();
    let mut recorder = LayoutRecorder::new("child");
    let summary = ReportRenderer::new(&report, RenderOptions::default())
        .unwrap()
        .render(&mut recorder, DataSets::new())
        .unwrap();
    assert!(recorder.is_finished());
    assert_eq!(summary.count(BandRole::Begin), 1);
    let page = &recorder.layout().pages[0];
    let parent = page.find_text("Hello World").unwrap();
    let child = page.find_text("Hello Child").unwrap();
    assert!(approx(child.y - parent.y, mm(20.0)));
}

// =====================================================================
// Layout config JSON round-trip
// =====================================================================

#[test]
fn layout_config_json_roundtrip() {
    let sample = templates::sample("columns").unwrap();
    let config = compute_layout_config(&sample.report, sample.data, &default_config()).unwrap();
    let json = config.to_json().unwrap();
    let parsed = LayoutConfig::from_json(&json).unwrap();
    assert_eq!(config, parsed);
    let bytes = render_pdf(&parsed).unwrap();
    assert_valid_pdf(&bytes);
}

// =====================================================================
// Golden-sample stability test
// =====================================================================

#[test]
fn layout_is_deterministic() {
    let digest = || {
        let sample = templates::sample("groups").unwrap();
        let layout = compute_layout_config(&sample.report, sample.data, &default_config()).unwrap();
        Sha256::digest(layout.to_json().unwrap().as_bytes())
    };
    assert_eq!(digest(), digest());
}

// =====================================================================
// All samples render without error
// =====================================================================

#[test]
fn all_samples_render_successfully() {
    for name in templates::SAMPLE_NAMES {
        let sample = templates::sample(name).unwrap();
        let result = generate_pdf(&sample.report, sample.data, &default_config());
        assert!(result.is_ok(), "Sample '{}' failed: {:?}", name, result.err());
        let (bytes, _) = result.unwrap();
        assert_valid_pdf(&bytes);
    }
}
