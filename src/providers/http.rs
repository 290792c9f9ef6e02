//! JSON-over-HTTP helper shared by the networked backends

use log::{error, trace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Error;

/// POST `body` as JSON and decode the JSON reply
pub async fn post_json<B, T>(
  http_client: &reqwest::Client
, url: &str
, headers: &BTreeMap<String, String>
, body: &B
) -> Result<T, Error>
where B: Serialize + ?Sized
    , T: DeserializeOwned
{   let mut builder = http_client
      .post(url)
      .header("Content-Type", "application/json");
    for (name, value) in headers
    {   builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder
      .json(body)
      .send()
      .await
      .map_err(|e| {
        error!("HTTP error: {}", e);
        Error::HttpError(e.to_string())
      })?;

    let status = response.status();
    trace!("Response status from {}: {}", url, status);

    if !status.is_success()
    {   let error_text = response.text().await
          .unwrap_or_else(|_|
            "Unknown error".to_string()
          );
        error!("API error from {}: {} {}", url, status, error_text);
        return Err(Error::ApiError(
          format!("{}: {}", status, error_text)
        ));
    }

    response.json().await.map_err(|e| {
      error!("Parse error: {}", e);
      Error::ParseError(e.to_string())
    })
}

/// Trim a base URL so endpoint paths can be appended
pub fn endpoint(base: &str, path: &str) -> String
{   format!("{}/{}", base.trim_end_matches('/'), path)
}
