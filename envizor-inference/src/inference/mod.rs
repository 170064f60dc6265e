pub mod classify;
pub mod yolo;
