pub mod commands;
pub mod view;

pub use commands::run;
