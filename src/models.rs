pub mod auth;
pub mod contract;
