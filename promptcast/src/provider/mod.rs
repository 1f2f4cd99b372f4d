//! Remote image service adapters.
//!
//! This module provides the HTTP client abstraction and the adapters for the
//! generation and upscaling services.
//!
//! # Usage
//!
//! ```ignore
//! use promptcast::provider::{AsyncReqwestClient, DalleMiniGenerator, ZyroUpscaler};
//!
//! let http_client = AsyncReqwestClient::new()?;
//! let generator = DalleMiniGenerator::new(http_client.clone());
//! let upscaler = ZyroUpscaler::new(http_client);
//! ```

mod dallemini;
mod http;
mod types;
mod zyro;

pub use dallemini::{DalleMiniGenerator, DALLEMINI_DEFAULT_URL};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT};
pub use types::ProviderError;
pub use zyro::{strip_data_url, ZyroUpscaler, ZYRO_DEFAULT_URL};

#[cfg(test)]
pub use http::tests;
