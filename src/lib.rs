pub mod aggregate;
pub mod charts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod focus;
pub mod pages;
pub mod serve;
pub mod theme;
pub mod utils;
