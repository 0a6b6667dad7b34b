//! Kubernetes credential plugin that runs OpenID Connect grant flows against an identity
//! provider and caches the resulting token set so repeated `kubectl` calls stay offline until
//! the ID token expires.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod app;
pub mod authentication;
pub mod clean;
pub mod clock;
pub mod cmd;
pub mod credential_plugin;
pub mod error;
pub mod flows;
pub mod http;
pub mod interaction;
pub mod obs;
pub mod oidc;
pub mod pkce;
pub mod scope;
pub mod setup;
pub mod store;
pub mod tls;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
