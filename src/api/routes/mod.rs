//! API route declarations (e.g., /api/v1/*)

pub mod export_routes;
pub mod system_routes;
