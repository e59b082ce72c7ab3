//! Triangular arbitrage: path enumeration and cache-driven detection.
//!
//! This module handles:
//! - Triangular path enumeration and the path file
//! - Compounded ask/bid rate calculations
//! - The polling detector over the price cache

pub mod calculator;
pub mod detector;
pub mod paths;

pub use calculator::{evaluate, ArbitrageOpportunity, PathPrices};
pub use detector::{fetch_path_prices, ArbitrageDetector, ScanReport};
pub use paths::{enumerate_paths, load_paths, read_paths, save_paths, write_paths, SharedPaths, TriangularPath};
