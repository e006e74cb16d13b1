// Google Cloud REST clients
pub mod auth;
pub mod monitoring;
pub mod projects;
