pub mod dbclient;
pub mod memory;
pub mod model;
pub mod schema;
pub mod store;
