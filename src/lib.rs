#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod diagram;
pub mod dialogue;
pub mod document;
pub mod export;
pub mod gemini;
pub mod hub;
pub mod logging;
pub mod model;
pub mod prompt;
pub mod quiz;
pub mod render;
pub mod runner;
pub mod session;
pub mod speech;
pub mod story;
