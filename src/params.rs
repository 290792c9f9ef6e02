//! Parameter tables and the normalized request parameters used as cache keys

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::request::Request;

/// Client arguments handed to `connect`; recognized keys are popped
pub type ClientArgs = Map<String, Value>;

/// Values popped at connect time, keyed by user-facing name
pub type GenerationDefaults = BTreeMap<String, Value>;

/// Identifying parameters folded into every cache key
pub type ModelParams = BTreeMap<String, Value>;

/// Upper bound on choices one request may ask for
pub const MAX_TOTAL_CHOICES: usize = 4096;

/// Default value for a parameter; its variant also fixes the value type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault
{   Int(i64)
  , Float(f64)
  , Str(&'static str)
  , Bool(bool)
}

impl ParamDefault
{   pub fn to_value(&self) -> Value
    {   match *self
        {   ParamDefault::Int(i) => Value::from(i)
          , ParamDefault::Float(f) => Value::from(f)
          , ParamDefault::Str(s) => Value::from(s)
          , ParamDefault::Bool(b) => Value::from(b)
        }
    }

    /// Coerce a user value to this default's type, so that 2 and 2.0
    /// normalize to the same cache key
    pub fn coerce(
      &self
    , key: &str
    , value: &Value
    ) -> Result<Value>
    {   let mismatch = || Error::InvalidArgument(
          format!("parameter '{}' has wrong type: {}", key, value)
        );
        match self
        {   ParamDefault::Int(_) => {
              if let Some(i) = value.as_i64()
              {   return Ok(Value::from(i));
              }
              match value.as_f64()
              {   Some(f) if f.fract() == 0.0
                    && f >= i64::MIN as f64
                    && f <= i64::MAX as f64 => Ok(Value::from(f as i64))
                , _ => Err(mismatch())
              }
            }
          , ParamDefault::Float(_) => {
              value.as_f64()
                .filter(|f| f.is_finite())
                .map(Value::from)
                .ok_or_else(mismatch)
            }
          , ParamDefault::Str(_) => {
              value.as_str()
                .map(Value::from)
                .ok_or_else(mismatch)
            }
          , ParamDefault::Bool(_) => {
              value.as_bool()
                .map(Value::from)
                .ok_or_else(mismatch)
            }
        }
    }
}

/// One row of a parameter table: user key -> (backend key, default)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec
{   pub user_key: &'static str
  , pub backend_key: &'static str
  , pub default: ParamDefault
}

impl ParamSpec
{   pub const fn new(
      user_key: &'static str
    , backend_key: &'static str
    , default: ParamDefault
    ) -> Self
    {   ParamSpec
        {   user_key
          , backend_key
          , default
        }
    }
}

/// Declarative table translating user parameters to backend parameters
#[derive(Debug, Clone, Copy)]
pub struct ParameterMap(pub &'static [ParamSpec]);

impl ParameterMap
{   pub fn get(&self, user_key: &str) -> Option<&ParamSpec>
    {   self.0.iter().find(|s| s.user_key == user_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec>
    {   self.0.iter()
    }

    /// True when no user key or backend key appears twice
    pub fn has_unique_keys(&self) -> bool
    {   self.0.iter().enumerate().all(|(i, a)| {
          self.0[i + 1..].iter().all(|b| {
            a.user_key != b.user_key
              && a.backend_key != b.backend_key
          })
        })
    }

    /// Pop every key this table knows from `args`, falling back to
    /// the table default for keys not supplied
    pub fn take_client_args(
      &self
    , args: &mut ClientArgs
    ) -> Result<GenerationDefaults>
    {   let mut defaults = GenerationDefaults::new();
        for spec in self.iter()
        {   let value = match args.remove(spec.user_key)
            {   Some(Value::Null) | None => spec.default.to_value()
              , Some(v) => spec.default.coerce(spec.user_key, &v)?
            };
            trace!("client arg {} = {}", spec.user_key, value);
            defaults.insert(spec.user_key.to_string(), value);
        }
        Ok(defaults)
    }

    /// Normalize a request into backend parameters.
    ///
    /// Precedence: request value, then connect-time value, then the
    /// table default. Request keys the table does not know are dropped.
    pub fn normalize(
      &self
    , request: &Request
    , defaults: &GenerationDefaults
    ) -> Result<RequestParams>
    {   request.num_results()?;
        let mut params = RequestParams::new();
        params.insert("prompt", request.prompt.to_value());

        for spec in self.iter()
        {   let value = match request.params.get(spec.user_key)
            {   Some(v) if !v.is_null() => {
                  spec.default.coerce(spec.user_key, v)?
                }
              , _ => match defaults.get(spec.user_key)
                {   Some(v) => v.clone()
                  , None => spec.default.to_value()
                }
            };
            params.insert(spec.backend_key, value);
        }

        for key in request.params.keys()
        {   if self.get(key).is_none()
            {   debug!("Dropping unmapped parameter: {}", key);
            }
        }
        Ok(params)
    }
}

/// Flat backend-key -> value mapping; the literal cache key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, Value>);

impl RequestParams
{   pub fn new() -> Self
    {   RequestParams(BTreeMap::new())
    }

    pub fn insert(
      &mut self
    , key: impl Into<String>
    , value: impl Into<Value>
    )
    {   self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value>
    {   self.0.get(key)
    }

    pub fn len(&self) -> usize
    {   self.0.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)>
    {   self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value>
    {   self.0
    }

    /// A positive count such as `n`
    pub fn count(&self, key: &str) -> Result<usize>
    {   match self.0.get(key)
          .and_then(Value::as_u64)
          .and_then(|n| usize::try_from(n).ok())
        {   Some(n) if n >= 1 => Ok(n)
          , _ => Err(Error::InvalidArgument(
              format!("'{}' must be a positive integer", key)
            ))
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str>
    {   self.0.get(key)
          .and_then(Value::as_str)
          .ok_or_else(|| Error::InvalidArgument(
            format!("'{}' must be a string", key)
          ))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64>
    {   self.0.get(key)
          .and_then(Value::as_f64)
          .ok_or_else(|| Error::InvalidArgument(
            format!("'{}' must be a number", key)
          ))
    }

    /// Total choices a deferred must produce: the per-prompt count
    /// under `key` times the number of prompts, capped at
    /// `MAX_TOTAL_CHOICES`
    pub fn total_choices(
      &self
    , key: &str
    , num_results: usize
    ) -> Result<usize>
    {   let per_prompt = self.count(key)?;
        per_prompt
          .checked_mul(num_results)
          .filter(|total| *total <= MAX_TOTAL_CHOICES)
          .ok_or_else(|| Error::InvalidArgument(format!(
            "'{}' = {} over {} prompts exceeds {} choices",
            key, per_prompt, num_results, MAX_TOTAL_CHOICES
          )))
    }

    /// Canonical cache key, serialized with sorted keys. Request params,
    /// model params and the client URL each live under their own field
    /// so a request param never shadows a model param.
    pub fn cache_key(
      &self
    , client_url: &str
    , model_params: &ModelParams
    ) -> Result<String>
    {   let key = serde_json::json!({
          "client_url": client_url
        , "model_params": model_params
        , "request": &self.0
        });
        serde_json::to_string(&key).map_err(|e| {
          Error::InvalidArgument(format!("unserializable params: {}", e))
        })
    }
}
