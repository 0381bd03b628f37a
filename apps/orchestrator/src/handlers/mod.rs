pub mod admin;
pub mod health;
pub mod ingress;
pub mod worker_protocol;
