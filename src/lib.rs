//! Cleaning-inspection document service.
//!
//! Uploaded inspection PDFs are stored, their text extracted in the
//! background, and checkbox-style results recovered per inspected element.

pub mod analysis;
pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod repository;
pub mod routes;
pub mod services;
pub mod storage;
