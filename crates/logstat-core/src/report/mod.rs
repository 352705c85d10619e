mod renderer;

pub use renderer::{ReportRenderer, TABLE_PLACEHOLDER};
