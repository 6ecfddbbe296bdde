pub mod models;
pub mod connection;

pub use models::*;
pub use connection::*;
