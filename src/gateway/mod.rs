pub mod proxy;
pub mod routes;
