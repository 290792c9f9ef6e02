//! Cache-aware caller flow over a connected client

use log::{debug, info};
use std::collections::HashMap;

use crate::client::Client;
use crate::error::Result;
use crate::params::RequestParams;
use crate::request::{RawResponse, Request};
use crate::deferred::DeferredResult;

/// Storage for raw responses keyed by canonical cache key
pub trait ResponseCache: Send
{   fn get(&self, key: &str) -> Option<RawResponse>;
    fn set(&mut self, key: String, response: RawResponse);
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache
{   entries: HashMap<String, RawResponse>
}

impl MemoryCache
{   pub fn new() -> Self
    {   MemoryCache::default()
    }

    pub fn len(&self) -> usize
    {   self.entries.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.entries.is_empty()
    }
}

impl ResponseCache for MemoryCache
{   fn get(&self, key: &str) -> Option<RawResponse>
    {   self.entries.get(key).cloned()
    }

    fn set(&mut self, key: String, response: RawResponse)
    {   self.entries.insert(key, response);
    }
}

/// A connected client plus a response cache.
///
/// Builds each request, looks its params up in the cache, and only runs
/// the deferred call on a miss.
pub struct Session<C: ResponseCache = MemoryCache>
{   client: Box<dyn Client>
  , cache: C
}

impl Session<MemoryCache>
{   pub fn new(client: Box<dyn Client>) -> Self
    {   Session::with_cache(client, MemoryCache::new())
    }
}

impl<C: ResponseCache> Session<C>
{   pub fn with_cache(client: Box<dyn Client>, cache: C) -> Self
    {   debug!("Creating session for {}", client.get_generation_url());
        Session
        {   client
          , cache
        }
    }

    pub fn client(&self) -> &dyn Client
    {   self.client.as_ref()
    }

    pub fn cache(&self) -> &C
    {   &self.cache
    }

    /// Free-form generation. Batch prompts are split per prompt when
    /// the client cannot serve them in one call.
    pub async fn run(&mut self, request: &Request) -> Result<RawResponse>
    {   if request.prompt.is_batch()
          && !self.client.supports_batch_inference()
        {   request.num_results()?;
            debug!("Client lacks batch inference, splitting batch");
            let mut merged = RawResponse::default();
            for single in request.split_batch()
            {   let built = self.client.get_request(&single)?;
                merged.extend(self.resolve(built).await?);
            }
            return Ok(merged);
        }
        let built = self.client.get_request(request)?;
        self.resolve(built).await
    }

    /// Choose among `gold_choices`, one choice per prompt
    pub async fn run_choice(
      &mut self
    , gold_choices: &[String]
    , request: &Request
    ) -> Result<RawResponse>
    {   let built = self.client
          .get_choice_logit_request(gold_choices, request)?;
        self.resolve(built).await
    }

    async fn resolve(
      &mut self
    , (deferred, params): (DeferredResult, RequestParams)
    ) -> Result<RawResponse>
    {   let key = params.cache_key(
          &self.client.get_generation_url(),
          &self.client.get_model_params()
        )?;
        if let Some(hit) = self.cache.get(&key)
        {   debug!("Cache hit");
            return Ok(hit);
        }

        debug!("Cache miss, invoking backend");
        let response = deferred.invoke().await?;
        self.cache.set(key, response.clone());
        Ok(response)
    }

    /// Close the client and hand back the cache
    pub fn close(mut self) -> C
    {   info!("Closing session for {}", self.client.get_generation_url());
        self.client.close();
        self.cache
    }
}
