pub mod check;
pub mod render;

pub use check::CheckOptions;
