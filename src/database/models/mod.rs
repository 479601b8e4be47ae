pub mod macros;
pub mod member;
pub mod notification;
pub mod rsvp;
pub mod session;

// Re-export all models for easy importing
pub use member::*;
pub use notification::*;
pub use rsvp::*;
pub use session::*;
