// src/utils/mod.rs

pub mod jwt;
pub mod password;
pub mod sanitize;
pub mod signature;
