pub mod chat;
pub mod error;
pub mod identity;
pub mod ports;
pub mod realtime;
pub mod unread;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub type DomainResult<T> = Result<T, error::DomainError>;
