// src/session/mod.rs

pub mod repository;

pub use repository::{Session, SessionRepository};
