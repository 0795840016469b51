pub mod caching;
pub mod kv;
pub mod relational;
