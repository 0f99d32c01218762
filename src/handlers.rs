pub mod auth;
pub mod contracts;
pub mod notifications;
pub mod public;
