use maxvapor_client_rs::{DiscoveryEndpoint, MaxVaporClient, MaxVaporClientError, MaxVaporOptions};

use crate::Params;

pub fn create_client(params: &Params) -> Result<MaxVaporClient, MaxVaporClientError> {
    let mut builder = MaxVaporOptions::builder();
    builder.token(params.token.clone());
    if let Some(host) = &params.host {
        builder.host(host.clone());
    }
    if params.legacy {
        builder.discovery(DiscoveryEndpoint::Legacy);
    }
    let options = builder
        .build()
        .map_err(|e| MaxVaporClientError::Options(e.to_string()))?;
    MaxVaporClient::new(options)
}
