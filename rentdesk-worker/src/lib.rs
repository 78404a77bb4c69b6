//! # Rentdesk Worker Library
//!
//! Background jobs for rent collection: monthly rent generation and
//! late-payment reminders.
//!
//! ## Modules
//!
//! - `notifiers`: Reminder delivery channels (email, push, mock)
//! - `reminders`: Reminder dispatcher with atomic claim
//! - `rentals`: Monthly rent record generation
//! - `scheduler`: Periodic worker loop
//!
//! ## Example
//!
//! ```no_run
//! use rentdesk_worker::notifiers::{MockNotifier, Notifier};
//!
//! # async fn example() {
//! let notifier = MockNotifier::new();
//! println!("Channel: {}", notifier.channel());
//! # }
//! ```

pub mod config;
pub mod notifiers;
pub mod reminders;
pub mod rentals;
pub mod scheduler;
