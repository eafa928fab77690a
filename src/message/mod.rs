// src/message/mod.rs

pub mod repository;

pub use repository::{Message, MessageRepository, NewMessage};
