//! Command implementations

pub mod info;

pub mod plan;
