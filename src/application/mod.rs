//! Application Layer
//!
//! Contains the services and data transfer objects (DTOs) that orchestrate
//! the flow of data between the presentation and domain layers.

pub mod dto;
pub mod services;
