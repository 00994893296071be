//! Courier Core - a normalizing request pipeline over reqwest
//!
//! Wraps an HTTP transport so that every request either resolves with a
//! successful response or rejects with exactly one normalized error.
//!
//! # Main Components
//!
//! - **Codec**: encodes request bodies according to the declared content type
//! - **Pipeline**: encode, apply the caller's request hook, send, classify
//! - **Classification**: a three-tier taxonomy (`transport`, `http`,
//!   `backend`) with the raw failure kept for diagnostics
//! - **Configuration**: serde-loadable client and pipeline options
//!
//! # Connectivity
//!
//! Transport failures are told apart using a [`NetworkProbe`]. The default
//! [`SystemProbe`](http::probe::SystemProbe) reads interface state from
//! `/sys/class/net` and reports offline when it cannot tell. Interfaces whose
//! `operstate` is `unknown`, which includes tun and ppp links, count as
//! offline too. On other platforms, on VPN-only or point-to-point hosts, or
//! when the application already tracks connectivity, inject
//! [`AssumeOnline`](http::probe::AssumeOnline) or
//! [`StaticProbe`](http::probe::StaticProbe) through
//! [`RequestOptions::probe`].
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{create_request, ClientOptions, RequestOptions};
//!
//! async fn example() -> courier_core::Result<()> {
//!     let api = create_request(
//!         ClientOptions::new().base_url("https://api.example.com"),
//!         RequestOptions::new().msg_key("msg").success_code("0000"),
//!     )?;
//!
//!     match api.get("/users/1").await {
//!         Ok(response) => println!("{:?}", api.config().extract_data(&response.body)),
//!         Err(err) => eprintln!("{} ({})", err, err.raw_error.message),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod proptest_strategies;

// Re-export main types for convenience
pub use config::{
    BackendFailHook, ClientOptions, RequestConfig, RequestHook, RequestOptions, RequestPatch,
    SuccessPredicate,
};
pub use error::{Error, Result};
pub use http::{
    create_request, CustomError, ErrorKind, NetworkProbe, RequestError, RequestPipeline,
    ReqwestTransport, StatusTable, Transport, TransportError,
};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use types::{
    Code, FilePart, FormFields, FormValue, MultipartForm, PartContent, Payload,
    RequestDescriptor, SentRequest, TransportResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
