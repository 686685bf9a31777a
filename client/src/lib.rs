//! Terminal client for the deepfake detection service.
//!
//! Uploads a file or a text snippet, renders the JSON answer and draws the
//! per-frame confidence chart.

pub mod api;
pub mod chart;
pub mod config;
pub mod form;
pub mod logging;
pub mod models;
pub mod session;
pub mod view;
