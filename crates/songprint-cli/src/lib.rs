//! Songprint command line tools

pub mod output;
