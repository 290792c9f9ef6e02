//! Deferred invocation returned by request building

use log::{debug, error};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, Result};
use crate::request::RawResponse;

pub type RawFuture
  = Pin<Box<dyn Future<Output = Result<RawResponse>> + Send>>;

/// A zero-argument operation producing a raw response.
///
/// Nothing runs until `invoke` is awaited. The caller owns the value and
/// decides whether to run it at all (on a cache hit it is simply dropped).
pub struct DeferredResult
{   expected_choices: usize
  , thunk: Box<dyn FnOnce() -> RawFuture + Send>
}

impl DeferredResult
{   pub fn new<F, Fut>(
      expected_choices: usize
    , f: F
    ) -> Self
    where F: FnOnce() -> Fut + Send + 'static
        , Fut: Future<Output = Result<RawResponse>> + Send + 'static
    {   DeferredResult
        {   expected_choices
          , thunk: Box::new(move || Box::pin(f()) as RawFuture)
        }
    }

    /// Number of choices the response must carry
    pub fn expected_choices(&self) -> usize
    {   self.expected_choices
    }

    /// Run the operation. A response whose choice count differs from
    /// `expected_choices` is a backend error, never a short result.
    pub async fn invoke(self) -> Result<RawResponse>
    {   let DeferredResult { expected_choices, thunk } = self;
        debug!("Invoking deferred request ({} choices)", expected_choices);
        let response = thunk().await?;

        if response.choices.len() != expected_choices
        {   error!(
              "Expected {} choices, backend returned {}",
              expected_choices,
              response.choices.len()
            );
            return Err(Error::BackendError(format!(
              "expected {} choices, got {}",
              expected_choices,
              response.choices.len()
            )));
        }
        Ok(response)
    }
}

impl fmt::Debug for DeferredResult
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.debug_struct("DeferredResult")
          .field("expected_choices", &self.expected_choices)
          .finish_non_exhaustive()
    }
}
