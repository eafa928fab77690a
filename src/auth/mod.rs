// src/auth/mod.rs

pub mod models;
pub mod password;
pub mod service;

pub use models::{AuthResponse, LoginRequest, RegisterRequest};
pub use password::{hash_password, verify_password};
pub use service::AuthService;
