//! Capture two web pages, crop them to a shared size, and measure how many
//! pixels differ.

pub mod capture;
pub mod cdp;
pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod store;
