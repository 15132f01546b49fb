//! feedscale-core — shared types and configuration for feedscale.
//!
//! Defines the `MetricsSample` that flows from the metrics provider into
//! the scalers, the two decision types (`ScaleVote`, `TargetScaleResult`),
//! the `ScalerDescriptor` identity string, and the `feedscale.toml`
//! configuration model.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    FeedScaleConfig, FunctionConfig, LeaseStoreConfig, ScalingConfig, ScalingMode,
    parse_duration,
};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
