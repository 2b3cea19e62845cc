use std::env;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use delta_core::proto::coordination_client::CoordinationClient;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:17777";

pub async fn admin_channel() -> Result<Channel, Box<dyn std::error::Error>> {
    let endpoint_url =
        env::var("DELTA_ADMIN_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
    let mut endpoint = Endpoint::from_shared(endpoint_url.clone())?.tcp_nodelay(true);

    if endpoint_url.starts_with("https://") {
        // Domain name for TLS verification
        let domain = env::var("DELTA_ADMIN_DOMAIN").unwrap_or_else(|_| "localhost".to_string());
        let mut tls = ClientTlsConfig::new().domain_name(domain);

        // Root CA (optional)
        if let Ok(ca_path) = env::var("DELTA_ADMIN_CA") {
            let ca_pem = tokio::fs::read(ca_path).await?;
            tls = tls.ca_certificate(Certificate::from_pem(ca_pem));
        }

        endpoint = endpoint.tls_config(tls)?;
    }

    Ok(endpoint.connect().await?)
}

pub async fn coordination_client() -> Result<CoordinationClient<Channel>, Box<dyn std::error::Error>> {
    let ch = admin_channel().await?;
    Ok(CoordinationClient::new(ch))
}
