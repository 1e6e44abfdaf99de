// =============================================================================
// Chart rendering: the sink end of the pipeline
// =============================================================================
//
// `PngChartRenderer` draws close, 20-day mean, upper and lower band as four
// line series with a legend. Undefined rolling values leave gaps: the mean
// and band lines only start once a full window is available.
// =============================================================================

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use plotters::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use super::dataset::{ChartDataset, ChartLabels, Column};
use crate::runtime_config::RuntimeConfig;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to draw: dataset is empty")]
    NoData,

    #[error("failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to draw chart: {0}")]
    Draw(String),
}

/// Consumes a dataset and produces a visual artifact, returning where it went.
pub trait ChartRenderer {
    fn render(&self, dataset: &ChartDataset, labels: &ChartLabels) -> Result<PathBuf, RenderError>;
}

// Same palette as the usual plotting defaults: blue, orange, green, red.
const SERIES_STYLE: [(Column, RGBColor); 4] = [
    (Column::Close, RGBColor(31, 119, 180)),
    (Column::MovingAverage, RGBColor(255, 127, 14)),
    (Column::UpperBand, RGBColor(44, 160, 44)),
    (Column::LowerBand, RGBColor(214, 39, 40)),
];

/// Writes PNG files via plotters' bitmap backend.
#[derive(Debug, Clone)]
pub struct PngChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
}

impl PngChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            width,
            height,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(&config.output_dir, config.chart_width, config.chart_height)
    }

    /// `{output_dir}/{TITLE}_{first}_{last}.png`, or `None` for an empty dataset.
    pub fn output_path(&self, dataset: &ChartDataset, labels: &ChartLabels) -> Option<PathBuf> {
        let first = dataset.first_date()?;
        let last = dataset.last_date()?;
        let stem: String = labels
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Some(self.output_dir.join(format!(
            "{stem}_{}_{}.png",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        )))
    }

    fn draw(
        &self,
        path: &Path,
        dataset: &ChartDataset,
        labels: &ChartLabels,
    ) -> Result<(), RenderError> {
        let (min_value, max_value) = dataset.value_bounds().ok_or(RenderError::NoData)?;
        let (first, last) = match (dataset.first_date(), dataset.last_date()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(RenderError::NoData),
        };

        // Pad the value range; a flat series still needs a non-zero span.
        let span = (max_value - min_value).max(1e-8);
        let padding = span * 0.1;
        let y_min = min_value - padding;
        let y_max = max_value + padding;

        let x_min = chart_time(first);
        let mut x_max = chart_time(last);
        if x_max <= x_min {
            x_max = x_min + Duration::days(1);
        }

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&labels.title, ("sans-serif", 40.0).into_font())
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .y_desc(labels.y_axis)
            .x_desc("date")
            .x_label_formatter(&|t: &DateTime<Utc>| t.format("%Y-%m-%d").to_string())
            .draw()
            .map_err(draw_error)?;

        for (column, color) in SERIES_STYLE {
            for (i, segment) in dataset.segments(column).into_iter().enumerate() {
                let points = segment.into_iter().map(|(d, v)| (chart_time(d), v));
                let series = chart
                    .draw_series(LineSeries::new(points, color.stroke_width(2)))
                    .map_err(draw_error)?;
                // One legend entry per column, however many segments it has.
                if i == 0 {
                    series.label(column.label()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                    });
                }
            }
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_error)?;

        root.present().map_err(draw_error)?;
        Ok(())
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, dataset: &ChartDataset, labels: &ChartLabels) -> Result<PathBuf, RenderError> {
        let path = self.output_path(dataset, labels).ok_or(RenderError::NoData)?;

        std::fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        debug!(path = %path.display(), rows = dataset.len(), "rendering chart");
        self.draw(&path, dataset, labels)?;
        info!(path = %path.display(), title = %labels.title, "chart written");
        Ok(path)
    }
}

fn chart_time(date: NaiveDate) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc)
}

fn draw_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Draw(e.to_string())
}
