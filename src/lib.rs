pub mod analysis;
pub mod config;
pub mod dynamics;
pub mod ensemble;
pub mod error;
pub mod output;
pub mod plotting;
pub mod state;
