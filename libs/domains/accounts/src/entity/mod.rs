//! SeaORM entities for the `users` and `email_addresses` tables.

pub mod email_address;
pub mod user;
