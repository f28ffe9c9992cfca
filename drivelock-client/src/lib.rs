//! HTTP client for the rental marketplace account API.
//!
//! [`ApiClient`] wraps the `/api/users` endpoints the account-security flows need (login,
//! password status, password change and the OTP based lifecycle calls). Every failure is
//! mapped to a [`ClientError`] whose `Display` is safe to show to the user: the server's
//! `{message}` for API errors and a fixed message for transport failures.
//!
//! [`PasswordStatusQuery`] keeps the current user's password status up to date and never
//! applies a response that arrived after the consumer went away.
//!
//! ```rust,ignore
//! use drivelock_client::{ApiClient, ApiConfig};
//!
//! let client = ApiClient::new(ApiConfig::new("https://api.rentals.example"))?;
//! let response = client.login("renter@example.com", "Rental#2024x").await?;
//! let status = client.password_status(&response.token).await?;
//! ```
pub mod api;
pub mod error;
pub mod query;
pub mod types;

pub use api::{ApiClient, ApiConfig};
pub use error::{ClientError, NETWORK_ERROR_MESSAGE};
pub use query::PasswordStatusQuery;
pub use types::{LoginResponse, MessageResponse, RegisterRequest, UserSummary};
