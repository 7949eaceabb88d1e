// Miko - Live2D companion chat backend
// Library exports

pub mod config;
pub mod mcp;
pub mod server;
pub mod tools;
