pub mod task;

pub use task::{resolve_projects, run};
