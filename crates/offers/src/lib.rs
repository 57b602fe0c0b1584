//! # Offer normalization
//!
//! Pure building blocks used by the collector to turn upstream provider
//! offers into canonical, priced records.
//!
//! Raw offers are first flattened into dotted-key [`Properties`] with
//! [`flatten`], then priced against the current month and exchange rate
//! with [`pricing::price_offer`] and finally compared against the closest
//! reference instance with [`pricing::compare`].
//!
//! [`flatten`]: flatten::flatten

pub mod flatten;
pub mod pricing;
pub mod properties;
pub mod runtime;

pub use properties::Properties;
pub use runtime::Runtime;
