pub mod embedded;
pub mod installer;
pub mod manager;
pub mod manifest;
pub mod metadata;
pub mod runtime;

pub use manager::PluginManager;
