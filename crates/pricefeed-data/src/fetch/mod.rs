//! 시세 조회 조정 및 속도 제한.

pub mod coordinator;
pub mod rate_limit;

pub use coordinator::FetchCoordinator;
pub use rate_limit::RateLimiter;
