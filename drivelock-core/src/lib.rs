//! Core functionality for the drivelock project
//!
//! This crate contains the client-side account-security bookkeeping used by the rental
//! marketplace front end: the password policy and strength assessment, the security state
//! store (login attempts, lockouts, password history, session activity, security events),
//! password status derivation, the route guard and the presentation records consumed by
//! banners and toasts.
//!
//! The core is designed to be used by the [`drivelock`](https://docs.rs/drivelock) facade,
//! which wires it to a durable storage backend and the remote REST API. Every piece here can
//! also be used on its own, e.g. with [`storage::MemoryStorage`] in tests.
//!
//! See [`PasswordPolicy`] for the policy, [`SecurityStore`] for the state store and
//! [`RouteGuard`] for navigation gating.
//!
pub mod clock;
pub mod context;
pub mod crypto;
pub mod error;
pub mod events;
pub mod guard;
pub mod policy;
pub mod presentation;
pub mod services;
pub mod session;
pub mod status;
pub mod storage;
pub mod ticker;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::SecurityContext;
pub use error::Error;
pub use events::{SecurityEvent, SecurityEventKind, SecurityEventLog};
pub use guard::{GuardDecision, GuardState, NavigationState, RouteConfig, RouteGuard};
pub use policy::{PasswordPolicy, StrengthAssessment, StrengthChecks, StrengthLevel};
pub use services::{AccountSecurity, LockStatus, SecurityConfig, SecurityStore};
pub use session::{AuthState, SessionActivity, SessionStatus};
pub use status::{PasswordStatus, PasswordStatusSnapshot};
pub use storage::{KeyValueStore, MemoryStorage};
pub use ticker::CountdownTicker;
