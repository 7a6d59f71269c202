//! Business logic services.

pub mod mailer;
pub mod orders;

pub use mailer::Mailer;
pub use orders::OrderService;
