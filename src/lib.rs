// src/lib.rs

//! UNDC goods and services notifier library

pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod telegram;
pub mod utils;

#[cfg(test)]
mod testing;
