//! Support code for the `specgrid` command-line binary.

pub mod config;
