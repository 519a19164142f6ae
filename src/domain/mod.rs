//! Core domain types and logic.

pub mod ohlcv;
pub mod bar_series;
pub mod target;
pub mod portfolio;
pub mod allocation;
pub mod execution;
pub mod indicator;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
