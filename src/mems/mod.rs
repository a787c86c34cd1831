pub mod space;

pub use space::*;
