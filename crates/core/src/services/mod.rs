pub mod analytics_service;
pub mod baseline;
pub mod chart_service;
pub mod currency_service;
pub mod export_service;
pub mod price_model;
pub mod simulation_service;
pub mod stock_to_flow;
pub mod validation_service;
