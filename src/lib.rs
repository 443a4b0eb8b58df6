//! # nexus-voi-proxy
//!
//! Server-side proxy between a verification-of-identity portal and its
//! vendors. The browser never holds vendor credentials; it calls this
//! service, which validates the request, signs the outbound call and
//! normalises whatever the vendor sends back.
//!
//! ## Routes
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /start` | open a hosted verification session (`mode: aml_only` runs a PEP check instead) |
//! | `POST /pep` | AML/PEP watch-list screening |
//! | `POST /aml` | pass-through to the AML vendor under a fixed base URL |
//! | `POST /webhook` | vendor callback, kept in a 50-entry in-memory buffer |
//! | `GET /webhook` | buffered callbacks, newest first |
//! | `GET /diag` | non-secret runtime settings |
//! | `GET /health_check` | liveness |
//!
//! `/start` and `/pep` accept `?fake=1` (or `?fake=0`) to override the
//! process-wide demo default set by `APLYID_FAKE_START`.
//!
//! Every failure is answered with `{ok: false, error, status, hint?, data?, url?}`.
//! See [`config::Config`] for the environment variables.

pub mod config;
pub mod env;
pub mod error;
pub mod forward;
pub mod http_server;
pub mod normalize;
pub mod payload;
pub mod redirect;
pub mod signing;
pub mod store;
pub mod types;
pub mod vendor;

pub use config::Config;
pub use error::{ProxyError, Result};
pub use http_server::{router, serve, AppState};
