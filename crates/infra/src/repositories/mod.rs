mod impls;

pub use impls::{InMemoryChatRepository, InMemoryUserDirectory};
