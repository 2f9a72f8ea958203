//! Element Renderer – height computation and draw calls for each element kind.
//!
//! Text resolution is memoised per element for one measure + render pair so
//! `Function` callbacks run once per placement; the engine opens a new pair
//! with [`ElementState::begin_pass`]. `noRepeat` memory lasts for
//! the whole render pass.

use std::collections::HashMap;

use crate::backend::{PaintBackend, TextStyle};
use crate::error::{Error, Result};
use crate::model::{
    Border, Color, Element, ElementKind, Font, PageContext, Point, Rect, Style, TextElement, TextSource,
};
use crate::record::{display_value, Record};

/// What to do when a field or formatter fails.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort the whole render with the error.
    #[default]
    Abort,
    /// Draw this text in place of the value and keep going.
    Placeholder(String),
}

/// Per-render element state, keyed by element identity.
///
/// Memoised text is tagged with the pass that produced it, so a placement
/// interrupted by a page break (footer, header) keeps its cache.
#[derive(Debug, Default)]
pub struct ElementState {
    resolved: HashMap<usize, (u64, String)>,
    last_drawn: HashMap<usize, String>,
    pass: u64,
    passes: u64,
}

impl ElementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new measure + render pair; returns the pass to restore.
    pub fn begin_pass(&mut self) -> u64 {
        self.passes += 1;
        std::mem::replace(&mut self.pass, self.passes)
    }

    /// Return to the pass that was active before [`Self::begin_pass`].
    pub fn end_pass(&mut self, previous: u64) {
        self.pass = previous;
    }
}

/// Everything an element needs from the engine while measuring or drawing.
pub struct DrawEnv<'a> {
    pub backend: &'a mut dyn PaintBackend,
    pub state: &'a mut ElementState,
    pub policy: &'a ErrorPolicy,
    pub page: PageContext,
}

fn key(element: &Element) -> usize {
    element as *const Element as usize
}

/// Resolve the text of a text element against `record`.
pub fn resolve_text(
    element: &Element,
    text: &TextElement,
    record: &Record,
    env: &mut DrawEnv<'_>,
) -> Result<String> {
    if let Some((pass, cached)) = env.state.resolved.get(&key(element)) {
        if *pass == env.state.pass {
            return Ok(cached.clone());
        }
    }
    let resolved = match &text.source {
        TextSource::Label(label) => Ok(label.clone()),
        TextSource::Function(func) => Ok(func.call(record, &env.page)),
        TextSource::Field { path, formatter } => match (path.resolve(record), formatter) {
            (Ok(value), None) => Ok(display_value(value)),
            (Err(err), None) => Err(Error::Attribute(err)),
            (resolved, Some(fmt)) => {
                let arg = match &resolved {
                    Ok(value) => Ok(*value),
                    Err(err) => Err(err),
                };
                fmt.call(arg).map_err(|message| Error::Format {
                    element: element.describe(),
                    message,
                })
            }
        },
    };
    let resolved = match resolved {
        Ok(s) => s,
        Err(err) if err.is_data_error() => match env.policy {
            ErrorPolicy::Placeholder(placeholder) => {
                log::warn!("{err}; drawing placeholder");
                placeholder.clone()
            }
            ErrorPolicy::Abort => return Err(err),
        },
        Err(err) => return Err(err),
    };
    let pass = env.state.pass;
    env.state.resolved.insert(key(element), (pass, resolved.clone()));
    Ok(resolved)
}

/// Height the element occupies for `record`.
pub fn render_height(
    element: &Element,
    record: &Record,
    inherited: &Font,
    env: &mut DrawEnv<'_>,
) -> Result<f32> {
    let declared = element.frame.height;
    match &element.kind {
        ElementKind::Text(text) if text.expand => {
            let value = resolve_text(element, text, record, env)?;
            let style = text_style(element, text, inherited);
            let measured = env.backend.measure_text(&value, &style, element.frame.width);
            Ok(declared.max(measured))
        }
        _ => Ok(declared),
    }
}

/// Draw the element with its frame offset by the band `origin`.
pub fn render(
    element: &Element,
    origin: Point,
    record: &Record,
    inherited: &Font,
    env: &mut DrawEnv<'_>,
) -> Result<()> {
    let height = render_height(element, record, inherited, env)?;
    let mut rect = element.frame.offset(origin.x, origin.y);
    rect.height = height;
    let pen = element.style.pen.unwrap_or_default();

    match &element.kind {
        ElementKind::Text(text) => {
            let value = resolve_text(element, text, record, env)?;
            if text.no_repeat {
                let id = key(element);
                if env.state.last_drawn.get(&id) == Some(&value) {
                    return Ok(());
                }
                env.state.last_drawn.insert(id, value.clone());
            }
            paint_frame(env.backend, rect, &element.style)?;
            env.backend.draw_text(rect, &value, &text_style(element, text, inherited))
        }
        ElementKind::Line => env.backend.draw_line(rect.top_left(), rect.bottom_right(), &pen),
        ElementKind::Box => {
            let border = element.style.border.unwrap_or_else(|| Border::all(pen));
            env.backend.draw_rect(rect, Some(&border), element.style.background)
        }
        ElementKind::Image(source) => {
            paint_frame(env.backend, rect, &element.style)?;
            env.backend.draw_image(rect, source)
        }
    }
}

/// Text attributes shared by measuring and drawing.
fn text_style(element: &Element, text: &TextElement, inherited: &Font) -> TextStyle {
    TextStyle {
        font: element.style.font.clone().unwrap_or_else(|| inherited.clone()),
        color: element.style.pen.map(|p| p.color).unwrap_or(Color::BLACK),
        align: text.align,
        valign: text.valign,
        wrap: text.wrap,
        rich_text: text.rich_text,
    }
}

/// Background fill then border, if the style has either.
pub(crate) fn paint_frame(backend: &mut dyn PaintBackend, rect: Rect, style: &Style) -> Result<()> {
    let border = style.border.filter(|b| !b.is_empty());
    if style.background.is_none() && border.is_none() {
        return Ok(());
    }
    backend.draw_rect(rect, border.as_ref(), style.background)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LayoutRecorder;
    use crate::layout_config::DrawOp;
    use crate::model::{Formatter, Margins, Orientation, PageGeometry, PaperSize, Pen};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recorder() -> LayoutRecorder {
        let mut rec = LayoutRecorder::new("elements");
        let geometry = PageGeometry::new(PaperSize::A4, Orientation::Portrait, Margins::uniform(0.0));
        rec.begin_document(&geometry).unwrap();
        rec
    }

    fn ops(rec: &LayoutRecorder) -> &[DrawOp] {
        &rec.layout().pages[0].ops
    }

    #[test]
    fn field_resolves_and_draws_at_offset() {
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let el = Element::field(Rect::new(5.0, 2.0, 50.0, 12.0), "name").unwrap();
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        render(&el, Point::new(10.0, 100.0), &json!({"name": "Bread"}), &Font::default(), &mut env)
            .unwrap();
        let page = &rec.layout().pages[0];
        assert_eq!(page.find_text("Bread"), Some(Rect::new(15.0, 102.0, 50.0, 12.0)));
    }

    #[test]
    fn missing_field_aborts_or_uses_placeholder() {
        let el = Element::field(Rect::new(0.0, 0.0, 50.0, 12.0), "customer.name").unwrap();
        let record = json!({"customer": null});

        let mut rec = recorder();
        let mut state = ElementState::new();
        let abort = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &abort,
            page: PageContext::default(),
        };
        let err = render(&el, Point::default(), &record, &Font::default(), &mut env).unwrap_err();
        match err {
            Error::Attribute(attr) => {
                assert_eq!(attr.segment, "name");
                assert_eq!(attr.found, "null");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut state = ElementState::new();
        let placeholder = ErrorPolicy::Placeholder("#ERR".into());
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &placeholder,
            page: PageContext::default(),
        };
        render(&el, Point::default(), &record, &Font::default(), &mut env).unwrap();
        assert!(rec.layout().pages[0].find_text("#ERR").is_some());
    }

    #[test]
    fn formatter_can_render_missing_values() {
        let el = Element::field(Rect::new(0.0, 0.0, 50.0, 12.0), "price")
            .unwrap()
            .with_formatter(Formatter::new(|v| match v {
                Ok(value) => Ok(format!("${}", display_value(value))),
                Err(_) => Ok("n/a".to_string()),
            }));
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        render(&el, Point::default(), &json!({"price": 3}), &Font::default(), &mut env).unwrap();
        env.state.begin_pass();
        render(&el, Point::default(), &json!({}), &Font::default(), &mut env).unwrap();
        let texts: Vec<String> = rec.layout().pages[0].texts().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["$3", "n/a"]);
    }

    #[test]
    fn function_runs_once_per_measure_and_render() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let el = Element::function(Rect::new(0.0, 0.0, 40.0, 10.0), move |r| {
            counter.fetch_add(1, Ordering::SeqCst);
            display_value(r)
        })
        .expand();
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        let record = json!("Apple");
        render_height(&el, &record, &Font::default(), &mut env).unwrap();
        render(&el, Point::default(), &record, &Font::default(), &mut env).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        env.state.begin_pass();
        render(&el, Point::default(), &record, &Font::default(), &mut env).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expanding_text_grows_to_wrapped_height() {
        let el = Element::label(Rect::new(0.0, 0.0, 30.0, 5.0), "aaaaa bbbbb ccccc").expand();
        let fixed = Element::label(Rect::new(0.0, 0.0, 30.0, 5.0), "aaaaa bbbbb ccccc");
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        let font = Font::new("Helvetica", 10.0);
        let grown = render_height(&el, &json!(null), &font, &mut env).unwrap();
        assert!((grown - 3.0 * font.line_height()).abs() < 1e-3);
        assert_eq!(render_height(&fixed, &json!(null), &font, &mut env).unwrap(), 5.0);
    }

    #[test]
    fn expanding_text_measures_lines_as_drawn() {
        let rect = Rect::new(0.0, 0.0, 30.0, 5.0);
        let single = Element::label(rect, "aaaaa bbbbb ccccc").expand().no_wrap();
        let rich = Element::label(rect, "<b>aa</b> <i>bb</i>").expand().rich_text();
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        let font = Font::new("Helvetica", 10.0);
        for el in [&single, &rich] {
            let height = render_height(el, &json!(null), &font, &mut env).unwrap();
            assert!((height - font.line_height()).abs() < 1e-3, "{}: {height}", el.describe());
            render(el, Point::default(), &json!(null), &font, &mut env).unwrap();
        }
        for (_, text) in rec.layout().pages[0].texts() {
            assert_eq!(text.lines().count(), 1, "{text:?}");
        }
    }

    #[test]
    fn no_repeat_skips_identical_values() {
        let el = Element::field(Rect::new(0.0, 0.0, 40.0, 10.0), "type")
            .unwrap()
            .no_repeat();
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        for record in [json!({"type": "bakery"}), json!({"type": "bakery"}), json!({"type": "fruit"})] {
            env.state.begin_pass();
            render(&el, Point::default(), &record, &Font::default(), &mut env).unwrap();
        }
        let texts: Vec<String> = rec.layout().pages[0].texts().into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["bakery", "fruit"]);
    }

    #[test]
    fn box_uses_pen_for_border() {
        let el = Element::rect(Rect::new(0.0, 0.0, 10.0, 10.0)).with_background(Color::WHITE);
        let mut rec = recorder();
        let mut state = ElementState::new();
        let policy = ErrorPolicy::Abort;
        let mut env = DrawEnv {
            backend: &mut rec,
            state: &mut state,
            policy: &policy,
            page: PageContext::default(),
        };
        render(&el, Point::default(), &json!(null), &Font::default(), &mut env).unwrap();
        match &ops(&rec)[0] {
            DrawOp::Rect { border, fill, .. } => {
                assert_eq!(*border, Some(Border::all(Pen::default())));
                assert_eq!(*fill, Some(Color::WHITE));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}
