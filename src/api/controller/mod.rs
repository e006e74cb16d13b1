pub mod export;
pub mod system;
