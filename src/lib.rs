//! # franq – banded report layout and pagination
//!
//! A report is a tree of horizontal bands (header, detail, group header and
//! footer, summary...) holding positioned elements. The engine walks that tree
//! against named record streams, decides where every band lands on every page,
//! and paints the result through a backend. The stages are:
//!
//! 1. **Model** – reports built in code ([`model`]) or loaded from JSON
//!    documents ([`schema`])
//! 2. **Data** – forward-only cursors over named record streams ([`datasource`])
//! 3. **Paginate** – a single pass placing bands, columns, groups and
//!    subdetails ([`pagination`], [`band`], [`element`])
//! 4. **Record** – draw calls frozen into a [`layout_config::LayoutConfig`]
//!    by the [`backend::LayoutRecorder`]
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! [`pipeline`] runs all stages in one call.

pub mod backend;
pub mod band;
pub mod datasource;
pub mod element;
pub mod error;
pub mod fonts;
pub mod layout_config;
pub mod markup;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod schema;
pub mod templates;

// Re-exports for convenience
pub use datasource::DataSets;
pub use error::{Error, Result};
pub use model::Report;
pub use pagination::{RenderOptions, RenderSummary, ReportRenderer};
pub use pipeline::{generate_pdf, PipelineConfig};
pub use schema::Registry;
