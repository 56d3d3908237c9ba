pub mod bootstrap;
pub mod context;
pub mod error;
pub mod health;
pub mod routes;
pub mod services;
