pub mod graph;
pub mod lifecycle;
