//! Consumption pipeline for the Antel customer portal.
//!
//! Logs in through the portal's identity provider with a real browser, walks
//! to the internet consumption page and extracts a typed
//! [`ConsumptionSnapshot`] from whatever layout the portal served.

pub mod auth;
pub mod baseline;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod navigate;
pub mod normalize;
pub mod snapshot;

pub use antel_browser;

pub use auth::{Authenticator, LoginState};
pub use baseline::{BaselineError, BaselineStore};
pub use config::{Credentials, FetchSettings, PortalUrls, RetryPolicy, Timeouts};
pub use error::{ErrorKind, FetchError};
pub use extract::{extract_consumption, extract_field, Extracted, FieldSpec, Probe, Strategy};
pub use fetcher::ConsumptionFetcher;
pub use navigate::Navigator;
pub use normalize::{normalize_date, normalize_quantity, DateSpan, DateValue};
pub use snapshot::{CapturedFields, ConsumptionSnapshot, QuantitySource};
