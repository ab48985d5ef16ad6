pub mod turn;
pub mod event;
pub mod request;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod tests;

pub use error::{ChatError, SendRejected};
pub type Result<T> = std::result::Result<T, ChatError>;
