//! 시세 피드 전반에서 사용되는 공통 타입.

mod holding;
mod quote;
mod ticker;

pub use holding::*;
pub use quote::*;
pub use ticker::*;
