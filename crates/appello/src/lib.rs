//! Appello - attendance sheets for the school portal.
//!
//! Talks to the portal's REST API as the logged-in teacher: lists classes,
//! shows the attendance sheet for a class, subject and day, and records
//! changes one student at a time.

pub mod api;
pub mod calendar;
pub mod config;
pub mod controller;
pub mod error;
pub mod html;
pub mod reconcile;
pub mod render;
#[cfg(test)]
mod testutil;
pub mod types;
