pub mod message;
pub mod sample;
pub mod trip;
