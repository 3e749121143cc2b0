#![forbid(unsafe_code)]

pub mod json_dir;
pub mod repository;
pub mod sqlite;
