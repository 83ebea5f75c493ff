pub mod broadcasts;
pub mod health;
