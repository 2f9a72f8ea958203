//! Sample reports for testing and demonstration.
//!
//! Each sample pairs a report with the data it expects and exercises a
//! different part of the engine. The grouped sample is written as a report
//! document to show the persisted format; the rest are built in code.

use serde_json::{json, Value};

use crate::datasource::DataSets;
use crate::error::{Error, Result};
use crate::model::{
    mm, Align, Band, Border, Color, DetailBand, Element, Font, Margins, Pen, Rect, Report, Section, TextFn,
};
use crate::schema::{load_report, Registry};

/// A report together with its data bindings.
pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    pub report: Report,
    pub data: DataSets<'static>,
}

/// Names accepted by [`sample`].
pub const SAMPLE_NAMES: [&str; 6] = ["groups", "columns", "header_footer", "detail", "child", "begin"];

/// Build the sample called `name`.
pub fn sample(name: &str) -> Result<Sample> {
    let (description, report, data) = match name {
        "groups" => (
            "foods grouped by type and sweetness",
            grouped_report()?,
            DataSets::new().with("foods", foods()),
        ),
        "columns" => (
            "100 rows flowing through two columns",
            columns_report(),
            DataSets::new().with("data", pairs(100)),
        ),
        "header_footer" => (
            "100 rows with page header and numbered footer",
            header_footer_report(),
            DataSets::new().with("data", pairs(100)),
        ),
        "detail" => (
            "bordered detail rows over a list of fruits",
            detail_report(),
            DataSets::new().with("fruits", fruits()),
        ),
        "child" => ("title band with a chained child band", title_child_report(), DataSets::new()),
        "begin" => ("single begin band on a coloured page", begin_report(), DataSets::new()),
        other => {
            return Err(Error::config(format!(
                "unknown sample '{other}' (expected one of: {})",
                SAMPLE_NAMES.join(", ")
            )))
        }
    };
    let name = SAMPLE_NAMES.iter().copied().find(|n| *n == name).unwrap_or("sample");
    Ok(Sample {
        name,
        description,
        report,
        data,
    })
}

/// Grouped foods report as a persisted document.
pub fn grouped_template() -> &'static str {
    r##"
{
    "title": "Foods",
    "unit": "mm",
    "margins": [10, 10, 25, 10],
    "dataSet": "foods",
    "detail": {
        "height": 5,
        "groups": [
            {
                "expression": "type",
                "header": { "height": 5, "elements": [
                    { "type": "label", "width": 10, "height": 5, "text": "Type:" },
                    { "type": "field", "left": 10, "width": 30, "height": 5, "attrName": "type" }
                ]},
                "footer": { "height": 5, "elements": [
                    { "type": "label", "width": 50, "height": 5, "text": "End of group [type]" }
                ]}
            },
            {
                "expression": "sweet",
                "header": { "height": 5, "elements": [
                    { "type": "label", "left": 10, "width": 12, "height": 5, "text": "Sweet:" },
                    { "type": "field", "left": 25, "width": 30, "height": 5, "attrName": "sweet" }
                ]},
                "footer": { "height": 5, "elements": [
                    { "type": "label", "left": 10, "width": 50, "height": 5, "text": "End of group [sweet]" }
                ]}
            }
        ],
        "elements": [
            { "type": "field", "left": 40, "width": 30, "height": 5, "attrName": "name" }
        ]
    }
}
"##
}

pub fn grouped_report() -> Result<Report> {
    load_report(grouped_template(), &Registry::new())
}

pub fn foods() -> Vec<Value> {
    vec![
        json!({ "name": "Bread", "type": "bakery", "sweet": "no" }),
        json!({ "name": "Cookies", "type": "bakery", "sweet": "yes" }),
        json!({ "name": "Olive", "type": "fruit", "sweet": "no" }),
        json!({ "name": "Apple", "type": "fruit", "sweet": "yes" }),
        json!({ "name": "Orange", "type": "fruit", "sweet": "yes" }),
        json!({ "name": "Pear", "type": "fruit", "sweet": "yes" }),
    ]
}

pub fn fruits() -> Vec<Value> {
    vec![json!("Apple"), json!("Orange"), json!("Pear")]
}

/// `[i, i * 3]` for `i` in `0..n`.
pub fn pairs(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!([i, i * 3])).collect()
}

fn margins() -> Margins {
    Margins::new(mm(10.0), mm(10.0), mm(25.0), mm(10.0))
}

fn title_header() -> Band {
    let underline = Border {
        bottom: Some(Pen::new(Color::BLACK, 3.0)),
        ..Border::default()
    };
    Band::new(mm(10.0)).named("header").with_element(
        Element::label(Rect::new(mm(20.0), 0.0, mm(145.0), mm(10.0)), "Header - Title")
            .with_border(underline)
            .with_font(Font::new("Serif", 14.0))
            .align(Align::Center),
    )
}

fn pair_row(second_left: f32) -> Band {
    let cell = |left: f32, index: usize| {
        Element::function(Rect::new(left, 0.0, mm(30.0), mm(5.0)), move |r| {
            crate::record::display_value(&r[index])
        })
    };
    Band::new(mm(5.0))
        .named("row")
        .with_element(cell(0.0, 0))
        .with_element(cell(second_left, 1))
}

pub fn columns_report() -> Report {
    let section = Section::new(2, mm(10.0)).with_detail(DetailBand::new(pair_row(mm(30.0))));
    Report::new()
        .with_margins(margins())
        .with_header(title_header())
        .with_section(section)
        .with_footer(Band::new(mm(10.0)).named("footer").with_element(Element::label(
            Rect::new(0.0, 0.0, mm(185.0), mm(10.0)),
            "Footer - Title",
        )))
}

pub fn header_footer_report() -> Report {
    let page_number = Element::text(
        Rect::new(mm(160.0), 0.0, mm(25.0), mm(10.0)),
        crate::model::TextSource::Function(TextFn::new(|_, ctx| format!("Page {}", ctx.page))),
    )
    .align(Align::Right);
    Report::new()
        .with_margins(margins())
        .with_data_set("data")
        .with_header(title_header())
        .with_detail(DetailBand::new(pair_row(mm(100.0))))
        .with_footer(
            Band::new(mm(10.0))
                .named("footer")
                .with_element(Element::label(Rect::new(0.0, 0.0, mm(150.0), mm(10.0)), "Footer - Title"))
                .with_element(page_number),
        )
}

pub fn detail_report() -> Report {
    let row = Band::new(mm(5.0))
        .named("fruit")
        .with_data_set("fruits")
        .with_border(Border::all(Pen::new(Color::rgb(0.0, 0.0, 1.0), 0.5)))
        .with_element(Element::function(Rect::new(mm(5.0), 0.0, mm(30.0), mm(5.0)), |r| {
            crate::record::display_value(r)
        }));
    Report::new().with_margins(margins()).with_detail(DetailBand::new(row))
}

const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);

pub fn title_child_report() -> Report {
    let mut report = Report::new();
    report.style.background = Some(CYAN);
    let mut title = Band::new(mm(20.0))
        .named("title")
        .with_border(Border::all(Pen::new(Color::rgb(0.0, 0.0, 1.0), 0.5)))
        .with_background(Color::WHITE)
        .with_element(Element::label(Rect::new(mm(5.0), mm(5.0), mm(30.0), mm(5.0)), "Hello World"))
        .with_child(
            Band::new(mm(15.0))
                .named("child")
                .with_background(Color::rgb(1.0, 1.0, 223.0 / 255.0))
                .with_element(Element::label(Rect::new(mm(15.0), mm(5.0), mm(30.0), mm(5.0)), "Hello Child")),
        );
    title.force_new_page_after = true;
    report.with_begin(title)
}

pub fn begin_report() -> Report {
    let mut report = Report::new();
    report.style.background = Some(CYAN);
    report.with_begin(
        Band::new(mm(20.0))
            .named("begin")
            .with_border(Border::all(Pen::new(Color::rgb(0.0, 0.0, 1.0), 0.5)))
            .with_background(Color::WHITE)
            .with_element(Element::label(Rect::new(mm(5.0), mm(5.0), mm(30.0), mm(5.0)), "Hello World")),
    )
}
