// Library exports for testing
// The binary (main.rs) imports these as well

pub mod cli;
pub mod commands;
pub mod error;

#[cfg(test)]
mod tests;
