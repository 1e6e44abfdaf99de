pub mod dataset;
pub mod renderer;

pub use dataset::{ChartDataset, ChartLabels, ChartRow, Column};
pub use renderer::{ChartRenderer, PngChartRenderer, RenderError};
