pub mod export_service;
