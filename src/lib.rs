//! Shiptrack CLI Library
//!
//! This module exposes the API client, cache, and tracker modules for use
//! in integration tests.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod delays;
pub mod logging;
pub mod resolve;
pub mod tracker;
