//! Shared response bodies and list pagination.

pub mod pagination;
pub mod response;

pub use pagination::{PaginationMeta, PaginationParams};
pub use response::{Accepted, Deleted};
