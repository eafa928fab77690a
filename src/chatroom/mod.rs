// src/chatroom/mod.rs

pub mod repository;

pub use repository::{Chatroom, ChatroomRepository};
