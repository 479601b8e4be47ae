pub mod auth;
pub mod channels;
pub mod clock;
pub mod members;
pub mod notifications;
pub mod recurrence;
pub mod rsvp;
pub mod scheduler;
pub mod sessions;
pub mod user_context;

pub use auth::Claims;
pub use channels::Channels;
pub use clock::{Clock, ClubTime, ManualClock, SystemClock};
pub use members::MemberService;
pub use notifications::NotificationDispatcher;
pub use recurrence::RecurrenceGenerator;
pub use rsvp::RsvpService;
pub use scheduler::{ReminderScheduler, SchedulerHandle, WaitlistNotifier};
pub use sessions::SessionService;
pub use user_context::MemberContext;
