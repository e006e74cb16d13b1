pub mod export;
pub mod metric;
