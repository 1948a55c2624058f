//! Stratus Core
//!
//! Core library for declarative infrastructure providers: resources and their
//! states, attribute schemas, the Provider trait, planning as Effects, and an
//! acceptance test harness that drives a Provider end to end.

pub mod acctest;
pub mod config;
pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
