use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::errors::ProviderError;

pub(crate) fn client(user_agent: Option<&str>) -> Result<Client, ProviderError> {
    let mut builder = Client::builder();
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent.to_string());
    }
    builder.build().map_err(request_failed)
}

/// Sends the request and decodes a JSON body, treating non-2xx statuses as
/// failures.
pub(crate) async fn get_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ProviderError> {
    let res = req.send().await.map_err(request_failed)?;
    let res = res.error_for_status().map_err(request_failed)?;
    res.json::<T>().await.map_err(request_failed)
}

fn request_failed(e: reqwest::Error) -> ProviderError {
    ProviderError::RequestFailed(e.to_string())
}
