pub mod auth;
pub mod contract_service;
pub mod notification_service;
pub mod pricing;
pub mod signing;
