//! Daily closing-price charts with a 20-day moving average and Bollinger
//! bands.
//!
//! [`pipeline::build_chart`] runs the whole derivation: a validated
//! [`pipeline::ChartRequest`] is fetched through a
//! [`market_data::PriceSeriesSource`], reduced to rolling bands by
//! [`indicators::bollinger`], and aligned into a [`chart::ChartDataset`] for a
//! [`chart::ChartRenderer`].

pub mod chart;
pub mod cli;
pub mod date_range;
pub mod indicators;
pub mod market_data;
pub mod pipeline;
pub mod runtime_config;
pub mod types;
