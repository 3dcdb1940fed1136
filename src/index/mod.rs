pub mod substore;
pub mod posting;
pub mod inverted;
