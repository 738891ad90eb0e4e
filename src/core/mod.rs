pub mod affordability;
pub mod aggregator;
pub mod cluster;
pub mod kd_index;
pub mod summary;

pub use crate::domain::model::{BuyerState, MarkerDescriptor, Record, ViewState};
pub use crate::domain::ports::{RecordSource, SelectionSink, Storage};
pub use crate::utils::error::Result;
