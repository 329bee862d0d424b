pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notify;
pub mod reassign;
pub mod slot_key;

pub use booking::BookingService;
pub use conflict::{ConflictChecker, SlotAvailability};
pub use lifecycle::AppointmentLifecycleService;
pub use reassign::{SlotMove, SlotReassigner};
pub use slot_key::{encode_slot_key, normalize_time, SlotClaim, SlotOwner, PENDING_OWNER};
