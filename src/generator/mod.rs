//! Generators: synthetic buses and GPX documents

pub mod gpx;
pub mod simulator;
