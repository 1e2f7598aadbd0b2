pub mod auth;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod mail;
pub mod normalize;
pub mod pipeline;
pub mod store;
