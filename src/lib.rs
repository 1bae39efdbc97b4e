pub mod app;
pub mod config;
pub mod links;
pub mod model;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod ui;
