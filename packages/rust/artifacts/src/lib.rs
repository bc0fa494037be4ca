//! Report artifacts: readable rendering and on-disk persistence.

pub mod render;
pub mod sink;

pub use render::render_readable;
pub use sink::{FileReportSink, PersistedReport, ReportSink};
