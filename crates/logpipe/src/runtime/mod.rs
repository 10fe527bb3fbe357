//! Runtime module: logging setup and pipeline boot.

pub mod boot;
