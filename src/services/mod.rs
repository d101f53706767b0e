pub mod accounts;
pub mod admin;
pub mod availability;
pub mod booking;
pub mod i18n;
pub mod payment;
pub mod pricing;
pub mod reviews;
pub mod rooms;

#[cfg(test)]
pub(crate) mod testing;
