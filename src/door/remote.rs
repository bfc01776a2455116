use std::{fmt::Debug, future::Future, time::Duration};

use reqwest::{Client, RequestBuilder, Response};

use super::config::{Credentials, DoorConfig};
use crate::error::{GarageError, GarageResult};

/// Upper bound on any single request to the door controller
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The two operations a door controller offers.
///
/// Neither retries; that's left to the next scheduled poll.
pub trait DoorRemote: Debug + Send + Sync + 'static {
  /// Fetch the raw status page
  fn fetch_status(&self) -> impl Future<Output = GarageResult<String>> + Send;

  /// Press the door button. Resolves once the controller has accepted the request, not when the
  /// door has moved.
  fn send_toggle(&self) -> impl Future<Output = GarageResult<()>> + Send;
}

/// A door controller reachable over plain HTTP GETs
#[derive(Debug)]
pub struct HttpRemote {
  client: Client,
  status_url: String,
  toggle_url: String,
  credentials: Option<Credentials>,
}

impl HttpRemote {
  pub fn new(config: &DoorConfig) -> GarageResult<Self> {
    let client = Client::builder()
      .timeout(REQUEST_TIMEOUT)
      // door controllers live on the local network
      .no_proxy()
      .build()
      .map_err(|err| GarageError::HttpClient(err.to_string()))?;

    Ok(HttpRemote {
      client,
      status_url: config.status_url(),
      toggle_url: config.toggle_url(),
      credentials: config.credentials(),
    })
  }

  fn get(&self, url: &str) -> RequestBuilder {
    let request = self.client.get(url);
    match &self.credentials {
      Some(credentials) => request.basic_auth(&credentials.username, Some(&credentials.password.0)),
      None => request,
    }
  }

  async fn send(&self, url: &str) -> GarageResult<Response> {
    self
      .get(url)
      .send()
      .await
      .and_then(Response::error_for_status)
      .map_err(|err| GarageError::network(url, &err))
  }
}

impl DoorRemote for HttpRemote {
  async fn fetch_status(&self) -> GarageResult<String> {
    let response = self.send(&self.status_url).await?;
    let body = response
      .bytes()
      .await
      .map_err(|err| GarageError::network(&self.status_url, &err))?;

    String::from_utf8(body.to_vec()).map_err(|err| GarageError::Network {
      url: self.status_url.clone(),
      reason: format!("response body is not valid UTF-8: {err}"),
    })
  }

  async fn send_toggle(&self) -> GarageResult<()> {
    log::debug!("Sending toggle to {}", self.toggle_url);
    self.send(&self.toggle_url).await?;
    Ok(())
  }
}
