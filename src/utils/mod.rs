pub mod environment;
pub mod paths;

pub use environment::default_export_dir;
pub use paths::{export_basename, slugify_title, write_export};
