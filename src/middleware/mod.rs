// Middleware shared by every service router

pub mod cors;

pub use cors::*;
