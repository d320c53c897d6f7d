pub mod backend;
pub mod graph_utils;
pub mod gui;
pub mod persistence;
pub mod session;
