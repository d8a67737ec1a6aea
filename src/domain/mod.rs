pub mod pulls;
pub mod schema;
pub mod teams;
