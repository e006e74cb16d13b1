pub mod gateway;
pub mod mappers;
pub mod monitoring_client;
pub mod retry;
pub mod time_series_api_trait;
pub mod time_series_dto;
