pub mod game;
pub mod health;
pub mod payment;
pub mod season;
pub mod sse;
