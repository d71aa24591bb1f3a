//! Types shared by every crate of the commerce backend.

pub mod error;
pub mod ids;
pub mod money;

pub use error::ErrorKind;
pub use ids::{CartId, CouponId, OrderId, ProductId, SessionId, ShipmentId, UserId};
pub use money::Money;
