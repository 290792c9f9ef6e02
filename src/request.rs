//! Unified request and raw response types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A single prompt or an ordered batch of prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt
{   Single(String)
  , Batch(Vec<String>)
}

impl Prompt
{   pub fn is_batch(&self) -> bool
    {   matches!(self, Prompt::Batch(_))
    }

    /// How many independent completions the prompt itself demands
    pub fn num_results(&self) -> Result<usize>
    {   match self
        {   Prompt::Single(_) => Ok(1)
          , Prompt::Batch(prompts) if prompts.is_empty() => {
              Err(Error::invalid("batch prompt is empty"))
            }
          , Prompt::Batch(prompts) => Ok(prompts.len())
        }
    }

    pub fn to_value(&self) -> Value
    {   match self
        {   Prompt::Single(p) => Value::String(p.clone())
          , Prompt::Batch(ps) => Value::from(ps.clone())
        }
    }
}

impl From<&str> for Prompt
{   fn from(s: &str) -> Self
    {   Prompt::Single(s.to_string())
    }
}

impl From<String> for Prompt
{   fn from(s: String) -> Self
    {   Prompt::Single(s)
    }
}

impl From<Vec<String>> for Prompt
{   fn from(v: Vec<String>) -> Self
    {   Prompt::Batch(v)
    }
}

impl From<Vec<&str>> for Prompt
{   fn from(v: Vec<&str>) -> Self
    {   Prompt::Batch(v.into_iter().map(String::from).collect())
    }
}

/// Generic generation request: prompt plus user parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request
{   /// Prompt text, or a batch of prompts
    pub prompt: Prompt
  , /// User-facing generation parameters (n, temperature, ...)
    #[serde(default)]
    pub params: BTreeMap<String, Value>
}

impl Request
{   pub fn new(prompt: impl Into<Prompt>) -> Self
    {   Request
        {   prompt: prompt.into()
          , params: BTreeMap::new()
        }
    }

    pub fn with_param(
      mut self
    , key: impl Into<String>
    , value: impl Into<Value>
    ) -> Self
    {   self.params.insert(key.into(), value.into());
        self
    }

    pub fn num_results(&self) -> Result<usize>
    {   self.prompt.num_results()
    }

    /// Split a batch into one request per prompt, sharing parameters
    pub fn split_batch(&self) -> Vec<Request>
    {   match &self.prompt
        {   Prompt::Single(_) => vec![self.clone()]
          , Prompt::Batch(prompts) => prompts
              .iter()
              .map(|p| Request
              {   prompt: Prompt::Single(p.clone())
                , params: self.params.clone()
              })
              .collect()
        }
    }
}

/// One generated or selected completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChoice
{   pub text: String
}

/// Raw result every deferred produces: {"choices": [{"text": ...}]}
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawResponse
{   pub choices: Vec<RawChoice>
}

impl RawResponse
{   /// `count` copies of the same text
    pub fn repeat(text: &str, count: usize) -> Self
    {   RawResponse
        {   choices: vec![
              RawChoice { text: text.to_string() };
              count
            ]
        }
    }

    pub fn texts(&self) -> Vec<&str>
    {   self.choices.iter().map(|c| c.text.as_str()).collect()
    }

    pub fn extend(&mut self, other: RawResponse)
    {   self.choices.extend(other.choices);
    }
}
