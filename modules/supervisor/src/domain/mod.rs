pub mod credentials;
pub mod error;
pub mod service;
