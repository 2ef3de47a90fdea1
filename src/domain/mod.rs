//! Core domain types and logic.

pub mod table;
pub mod interval;
pub mod series;
pub mod condition;
pub mod combinator;
pub mod registry;
pub mod condition_parser;
pub mod aliases;
pub mod signal_set;
pub mod error;
