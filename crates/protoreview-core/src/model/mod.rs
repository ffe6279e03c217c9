pub mod change;
pub mod step;
pub mod types;
