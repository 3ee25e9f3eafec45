pub mod client;
mod record;
mod store;
