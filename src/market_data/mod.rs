pub mod data_link;
pub mod source;

pub use data_link::{ApiKey, DataLinkClient};
pub use source::{FetchError, PriceSeriesSource, SourceFailure};
