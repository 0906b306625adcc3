pub mod adapters;
pub mod analysis;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod gate;
pub mod pipeline;
pub mod web;
