//! Band Renderer – effective band height and per-element drawing.
//!
//! A band's own height is its declared height, or the bottom of its lowest
//! element when it expands. Chained children stack below the parent's own
//! height (not below overflowing elements), so manual stacking stays exact.

use crate::element::{self, paint_frame, DrawEnv};
use crate::error::Result;
use crate::model::{Band, Font, Point, Rect};
use crate::record::Record;

/// Result of [`render`]: whether the band printed and how much vertical space
/// it consumed. A vetoed band consumes nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandOutcome {
    pub rendered: bool,
    pub height: f32,
}

impl BandOutcome {
    pub const SKIPPED: Self = Self {
        rendered: false,
        height: 0.0,
    };
}

/// Height of the band itself, excluding its child.
pub fn own_height(band: &Band, record: &Record, inherited: &Font, env: &mut DrawEnv<'_>) -> Result<f32> {
    if !band.expand {
        return Ok(band.height);
    }
    let font = band.style.font.as_ref().unwrap_or(inherited);
    let mut height = band.height;
    for el in &band.elements {
        let bottom = el.frame.y + element::render_height(el, record, font, env)?;
        height = height.max(bottom);
    }
    Ok(height)
}

/// Height of the band plus its chain of children. Vetoed children add nothing.
pub fn render_height(band: &Band, record: &Record, inherited: &Font, env: &mut DrawEnv<'_>) -> Result<f32> {
    let mut height = own_height(band, record, inherited, env)?;
    if let Some(child) = band.child.as_deref().filter(|c| !vetoed(c, record)) {
        let font = band.style.font.as_ref().unwrap_or(inherited);
        height += render_height(child, record, font, env)?;
    }
    Ok(height)
}

/// `on_before_print` returned `false` for `record`.
pub fn vetoed(band: &Band, record: &Record) -> bool {
    band.on_before_print.as_ref().is_some_and(|hook| !hook.call(record))
}

/// Draw `band` with its top-left corner at `origin` (page-absolute).
pub fn render(
    band: &Band,
    origin: Point,
    width: f32,
    record: &Record,
    inherited: &Font,
    env: &mut DrawEnv<'_>,
) -> Result<BandOutcome> {
    if vetoed(band, record) {
        log::trace!("band {} vetoed by on_before_print", band.label());
        return Ok(BandOutcome::SKIPPED);
    }
    let font = band.style.font.as_ref().unwrap_or(inherited);
    let own = own_height(band, record, inherited, env)?;

    paint_frame(env.backend, Rect::new(origin.x, origin.y, width, own), &band.style)?;
    for el in &band.elements {
        element::render(el, origin, record, font, env)?;
    }

    let mut height = own;
    if let Some(child) = &band.child {
        let below = Point::new(origin.x, origin.y + own);
        height += render(child, below, width, record, font, env)?.height;
    }
    Ok(BandOutcome {
        rendered: true,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LayoutRecorder, PaintBackend};
    use crate::element::{ElementState, ErrorPolicy};
    use crate::layout_config::DrawOp;
    use crate::model::{
        BeforePrint, Border, Color, Element, Margins, Orientation, PageContext, PageGeometry, PaperSize, Pen,
    };
    use serde_json::json;

    fn recorder() -> LayoutRecorder {
        let mut rec = LayoutRecorder::new("bands");
        let geometry = PageGeometry::new(PaperSize::A4, Orientation::Portrait, Margins::uniform(0.0));
        rec.begin_document(&geometry).unwrap();
        rec
    }

    #[test]
    fn expanding_band_grows_to_lowest_element() {
        let band = Band::new(10.0)
            .expanding()
            .with_element(Element::label(Rect::new(0.0, 4.0, 50.0, 20.0), "tall"));
        let fixed = Band::new(10.0).with_element(Element::label(Rect::new(0.0, 4.0, 50.0, 20.0), "tall"));
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        let font = Font::default();
        assert_eq!(render_height(&band, &json!(null), &font, &mut env).unwrap(), 24.0);
        assert_eq!(render_height(&fixed, &json!(null), &font, &mut env).unwrap(), 10.0);
    }

    #[test]
    fn child_stacks_below_own_height() {
        let band = Band::new(20.0)
            .with_element(Element::label(Rect::new(5.0, 5.0, 30.0, 40.0), "Hello World"))
            .with_child(Band::new(15.0).with_element(Element::label(Rect::new(15.0, 5.0, 30.0, 5.0), "Hello Child")));
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        let font = Font::default();
        assert_eq!(render_height(&band, &json!(null), &font, &mut env).unwrap(), 35.0);
        let outcome = render(&band, Point::new(10.0, 100.0), 200.0, &json!(null), &font, &mut env).unwrap();
        assert_eq!(
            outcome,
            BandOutcome {
                rendered: true,
                height: 35.0
            }
        );
        let child = rec.layout().pages[0].find_text("Hello Child").unwrap();
        assert_eq!(child.y, 125.0);
        assert_eq!(child.x, 25.0);
    }

    #[test]
    fn veto_skips_band_and_consumes_nothing() {
        let mut band = Band::new(20.0).with_element(Element::label(Rect::new(0.0, 0.0, 30.0, 5.0), "x"));
        band.on_before_print = Some(BeforePrint::new(|r| r["print"] == json!(true)));
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        let font = Font::default();
        let skipped = render(&band, Point::default(), 100.0, &json!({"print": false}), &font, &mut env).unwrap();
        assert_eq!(skipped, BandOutcome::SKIPPED);
        let printed = render(&band, Point::default(), 100.0, &json!({"print": true}), &font, &mut env).unwrap();
        assert!(printed.rendered);
        assert_eq!(rec.layout().pages[0].texts().len(), 1);
    }

    #[test]
    fn border_and_background_cover_band_rect() {
        let band = Band::new(12.0)
            .with_border(Border::all(Pen::new(Color::rgb(0.0, 0.0, 1.0), 1.0)))
            .with_background(Color::WHITE);
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        render(&band, Point::new(0.0, 50.0), 300.0, &json!(null), &Font::default(), &mut env).unwrap();
        match &rec.layout().pages[0].ops[0] {
            DrawOp::Rect { rect, fill, .. } => {
                assert_eq!(*rect, Rect::new(0.0, 50.0, 300.0, 12.0));
                assert_eq!(*fill, Some(Color::WHITE));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}
