pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod message;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod table;
pub mod widget;
