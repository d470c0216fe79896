// Module declarations
pub mod assemble;
pub mod centromeres;
pub mod classify;
pub mod config;
pub mod cutoff;
pub mod error;
pub mod gmm;
pub mod kde;
pub mod lod;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod winsize;
pub mod work;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod tests;
