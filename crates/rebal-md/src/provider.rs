//! Provider boundary for monthly series ingestion.
//!
//! Defines the error type and the provider trait, plus a router that sends
//! rate requests and price requests to different upstreams.

use std::fmt;

use crate::{Observation, SeriesRequest};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that a [`SeriesProvider`] implementation may return.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network, filesystem or transport failure.
    Transport(String),
    /// The upstream API returned an application-level error.
    Api { code: Option<i64>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The provider cannot serve this kind of request, or is misconfigured.
    Config(String),
    /// The provider has no data at all for this series.
    NotFound { series: String },
    /// The provider answered but the window holds no observation.
    Empty { series: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Api {
                code: Some(c),
                message,
            } => write!(f, "provider api error code={c}: {message}"),
            ProviderError::Api {
                code: None,
                message,
            } => write!(f, "provider api error: {message}"),
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
            ProviderError::NotFound { series } => write!(f, "series not found: {series}"),
            ProviderError::Empty { series } => write!(f, "series has no observations: {series}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Upstream series provider contract.
///
/// Object safe so callers can hold a `Box<dyn SeriesProvider>`.
pub trait SeriesProvider: Send + Sync {
    /// Human-readable name identifying this provider (e.g. `"sgs"`).
    fn name(&self) -> &'static str;

    /// Fetch raw observations for `req`, in any order. Observations outside
    /// the request window are allowed; callers filter.
    fn fetch(&self, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError>;
}

impl<P: SeriesProvider + ?Sized> SeriesProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fetch(&self, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError> {
        (**self).fetch(req)
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Routes rate series to one provider and price series to another.
pub struct CompositeProvider {
    rates: Box<dyn SeriesProvider>,
    prices: Box<dyn SeriesProvider>,
}

impl CompositeProvider {
    pub fn new(rates: Box<dyn SeriesProvider>, prices: Box<dyn SeriesProvider>) -> Self {
        Self { rates, prices }
    }
}

impl SeriesProvider for CompositeProvider {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn fetch(&self, req: &SeriesRequest) -> Result<Vec<Observation>, ProviderError> {
        if req.kind.is_rate() {
            self.rates.fetch(req)
        } else {
            self.prices.fetch(req)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
