pub mod feed;
pub mod model;
pub mod policy;
pub mod snowflake;
pub mod social;
pub mod store;
pub mod util;
