//! 시세 캐시.

pub mod price;

pub use price::PriceCache;
