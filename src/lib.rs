pub mod adapters;
pub mod api;
pub mod app;
pub mod assoc;
pub mod assoc_local;
pub mod assoc_remote;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod output;
pub mod reference;
pub mod resolver;
pub mod share;
pub mod status;
