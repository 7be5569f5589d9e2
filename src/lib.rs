//! Exercise practice engine and the LMS API adapter used by the
//! `exercise-runner` terminal client.

pub mod api_client;
pub mod config;
pub mod log_util;
pub mod practice;
