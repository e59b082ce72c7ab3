//! Market module: currencies, pair symbols and exchange metadata.
//!
//! This module handles:
//! - Currency / pair symbol / tick types
//! - Symbol universe discovery and stream-symbol selection
//! - Inverse pair resolution

pub mod inverse;
pub mod types;
pub mod universe;

pub use inverse::{invert, invert_quote, InverseResolver};
pub use types::{Currency, PairSymbol, Side, Tick};
pub use universe::{select_stream_symbols, ExchangeClient, SymbolUniverse};
