mod engine;
mod format;
mod types;

pub use engine::project;
pub use format::{format_compact, format_currency};
pub use types::{Inputs, Projection, TrajectoryPoint};
