pub mod aligned_series;
pub mod aligner;
pub mod catalog;
pub mod entity;
pub mod filter;
pub mod time_window;
