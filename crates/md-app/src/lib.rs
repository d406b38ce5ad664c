//! monodither application layer: command line, variant dispatch, and the
//! ordered frame processor that drives sources into sinks.

pub mod cli;
pub mod dispatch;
pub mod pipeline;
