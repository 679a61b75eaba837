pub mod config;
pub mod detector;
pub mod heuristic;
pub mod inspector;
pub mod overlay;
pub mod paths;
pub mod replay;
pub mod service;
pub mod settings;
pub mod targets;
pub mod timer;
pub mod ui_tree;
