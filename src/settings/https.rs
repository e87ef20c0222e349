//! HTTPS key/certificate loading

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::config::HttpsConfig;
use crate::error::DevError;

/// Key and certificate contents with the files they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpsSettings {
    pub key: String,
    pub cert: String,
    pub key_file_path: PathBuf,
    pub cert_file_path: PathBuf,
}

/// Read the key and cert files named in `[dev.https]`
///
/// Both files are read concurrently. Every problem found is reported in one
/// error so the user does not have to fix them one run at a time.
pub async fn read_https_settings(config: &HttpsConfig, root: &Path) -> Result<HttpsSettings, DevError> {
    let key_file_path = root.join(&config.key_file);
    let cert_file_path = root.join(&config.cert_file);

    let (key, cert) = tokio::join!(
        fs::read_to_string(&key_file_path),
        fs::read_to_string(&cert_file_path)
    );

    let mut problems = Vec::new();

    let key = match key {
        Ok(key) if key.contains("PRIVATE KEY-----") => Some(key),
        Ok(_) => {
            problems.push(format!(
                "Private key file {} does not contain a PEM encoded private key",
                key_file_path.display()
            ));
            None
        }
        Err(e) => {
            problems.push(format!(
                "Error reading private key file {}: {}",
                key_file_path.display(),
                e
            ));
            None
        }
    };

    let cert = match cert {
        Ok(cert) if cert.contains("-----BEGIN CERTIFICATE-----") => Some(cert),
        Ok(_) => {
            problems.push(format!(
                "Certificate file {} does not contain a PEM encoded certificate",
                cert_file_path.display()
            ));
            None
        }
        Err(e) => {
            problems.push(format!(
                "Error reading certificate file {}: {}",
                cert_file_path.display(),
                e
            ));
            None
        }
    };

    match (key, cert) {
        (Some(key), Some(cert)) => Ok(HttpsSettings {
            key,
            cert,
            key_file_path,
            cert_file_path,
        }),
        _ => Err(DevError::Https(problems.join("\n"))),
    }
}
