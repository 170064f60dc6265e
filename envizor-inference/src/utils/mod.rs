pub mod contour;
pub mod graph;
pub mod masks;
pub mod tensor;
