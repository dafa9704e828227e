//! Domain layer - chain-agnostic token event models and logic
//!
//! Nothing here talks to a node directly; chain access goes through the
//! [`event::ChainReader`] trait implemented in the infrastructure layer.

pub mod event;
