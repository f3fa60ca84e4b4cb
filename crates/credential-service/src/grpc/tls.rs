use crate::config::{ConfigError, TlsConfig};
use std::path::Path;
use tonic::transport::{Certificate, Identity, ServerTlsConfig};
use tracing::info;

/// Build the listener's TLS settings, or `None` when TLS is disabled.
///
/// With `ca_file` set, clients must present a certificate chained to that CA.
pub fn server_tls_config(tls: &TlsConfig) -> Result<Option<ServerTlsConfig>, ConfigError> {
    if !tls.enabled {
        return Ok(None);
    }

    let cert_path = tls
        .cert_file
        .as_deref()
        .ok_or_else(|| ConfigError::MissingEnvVar("CS_TLS_CERT_FILE".to_string()))?;
    let key_path = tls
        .key_file
        .as_deref()
        .ok_or_else(|| ConfigError::MissingEnvVar("CS_TLS_KEY_FILE".to_string()))?;

    let cert = read_pem("CS_TLS_CERT_FILE", cert_path)?;
    let key = read_pem("CS_TLS_KEY_FILE", key_path)?;

    let mut config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));

    if let Some(ca_path) = tls.ca_file.as_deref() {
        let ca = read_pem("CS_TLS_CA_FILE", ca_path)?;
        config = config.client_ca_root(Certificate::from_pem(ca));
        info!(target: "cs.grpc.tls", "Client certificates required");
    }

    Ok(Some(config))
}

fn read_pem(var: &str, path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| ConfigError::InvalidValue {
        var: var.to_string(),
        reason: format!("cannot read {}: {e}", path.display()),
    })
}
