mod gateway;
mod ops;
mod timestamper;


pub use gateway::{CacheGateway, SoftLockGuard};
pub use ops::{cache_collection, get_cached_collection, softlock};
pub use timestamper::{Timestamp, Timestamper};
