pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use app::presentation::Palette;
pub use app::sources::CsvRecordSource;
pub use config::toml_config::TomlConfig;
pub use core::affordability::AffordabilityModel;
pub use core::aggregator::{Selection, SpatialAggregator, ZoomBands};
pub use core::cluster::{ClusterOptions, SpatialIndex};
pub use domain::model::{
    BoundingBox, BuyerState, CustomLoan, FinancingConfig, MarkerDescriptor, PolicyLoan, Record,
    Tier, ViewState,
};
pub use utils::error::{MapError, Result};
