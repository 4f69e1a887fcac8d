//! # lib_network
//!
//! Secure transport and remote-content plumbing shared by the workspace binaries.
//! Each folder is gated behind a feature of the same name; `full` enables all.
//!
//! - **`retrieve`**: endpoint building, the certificate-pinned HTTP transport,
//!   fixture and failing transports, and the typed response pipeline.
//! - **`imaging`**: the image cache actor that deduplicates concurrent fetches.
//! - **`configs`**: layered runtime configuration and the certificate store.
//! - **`loggers`**: the leveled, category-tagged logging collaborator.
//! - **`users`**: the users-listing endpoint and models.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "imaging")]
pub mod imaging;
#[cfg(feature = "loggers")]
pub mod loggers;
#[cfg(feature = "retrieve")]
pub mod retrieve;
#[cfg(feature = "users")]
pub mod users;
