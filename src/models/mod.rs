pub mod bill;
pub mod booking;
pub mod payment;
pub mod review;
pub mod room;
pub mod user;

pub use bill::{Bill, BillSummary};
pub use booking::{Booking, BookingStatus};
pub use payment::{Payment, PaymentStatus};
pub use review::Review;
pub use room::{Room, RoomFilter, RoomInput};
pub use user::{Role, User};
