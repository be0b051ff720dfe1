//! Certificate Authority management for the MITM proxy.
//!
//! The browser has to trust this root before HTTPS game traffic can be
//! intercepted; per-host leaf certificates are minted from it by hudsucker.

use std::fs;
use std::path::{Path, PathBuf};

use hudsucker::certificate_authority::RcgenAuthority;
use hudsucker::rcgen::{
    BasicConstraints, CertificateParams, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use hudsucker::rustls::crypto::aws_lc_rs::default_provider;

pub use crate::error::CaManagerError;

/// CA certificate and key file names.
const CA_CERT_FILENAME: &str = "neoproxy-ca.crt";
const CA_KEY_FILENAME: &str = "neoproxy-ca.key";

/// Common name of the generated root.
const CA_COMMON_NAME: &str = "Neoproxy Root CA";

/// Leaf certificates kept in hudsucker's cache.
const LEAF_CACHE_SIZE: u64 = 1000;

/// Manages the root CA certificate for the MITM proxy.
#[derive(Debug, Clone)]
pub struct CaManager {
    ca_dir: PathBuf,
}

impl CaManager {
    /// Creates a new CA manager with the given directory.
    pub fn new(ca_dir: impl AsRef<Path>) -> Self {
        Self {
            ca_dir: ca_dir.as_ref().to_path_buf(),
        }
    }

    /// Creates a CA manager using the default Neoproxy data directory.
    pub fn with_default_dir() -> Result<Self, CaManagerError> {
        let project_dirs = crate::project_dirs()
            .ok_or_else(|| CaManagerError::Generation("Failed to get project dirs".into()))?;

        Ok(Self::new(project_dirs.data_dir().join("ca")))
    }

    /// Returns the CA directory.
    pub fn ca_dir(&self) -> &Path {
        &self.ca_dir
    }

    /// Returns the path to the CA certificate file.
    pub fn cert_path(&self) -> PathBuf {
        self.ca_dir.join(CA_CERT_FILENAME)
    }

    /// Returns the path to the CA private key file.
    pub fn key_path(&self) -> PathBuf {
        self.ca_dir.join(CA_KEY_FILENAME)
    }

    /// Checks if the CA certificate exists.
    pub fn ca_exists(&self) -> bool {
        self.cert_path().exists() && self.key_path().exists()
    }

    /// Ensures the CA certificate exists, generating it if necessary.
    pub fn ensure_ca(&self) -> Result<RcgenAuthority, CaManagerError> {
        if !self.ca_exists() {
            self.generate_ca()?;
        }
        self.load_authority()
    }

    /// Generates a new root CA certificate and key.
    pub fn generate_ca(&self) -> Result<(), CaManagerError> {
        fs::create_dir_all(&self.ca_dir)?;

        let key_pair =
            KeyPair::generate().map_err(|e| CaManagerError::Generation(e.to_string()))?;

        let cert = root_params()
            .map_err(CaManagerError::Generation)?
            .self_signed(&key_pair)
            .map_err(|e| CaManagerError::Generation(e.to_string()))?;

        fs::write(self.cert_path(), cert.pem())
            .map_err(|e| CaManagerError::Write(e.to_string()))?;
        fs::write(self.key_path(), key_pair.serialize_pem())
            .map_err(|e| CaManagerError::Write(e.to_string()))?;

        tracing::info!("Generated new CA certificate at {:?}", self.cert_path());

        Ok(())
    }

    /// Loads the CA certificate and creates a hudsucker authority.
    pub fn load_authority(&self) -> Result<RcgenAuthority, CaManagerError> {
        let cert_pem = fs::read_to_string(self.cert_path())?;
        let key_pem = fs::read_to_string(self.key_path())?;

        let key_pair =
            KeyPair::from_pem(&key_pem).map_err(|e| CaManagerError::Parse(e.to_string()))?;

        let issuer = Issuer::from_ca_cert_pem(&cert_pem, key_pair)
            .map_err(|e| CaManagerError::Parse(e.to_string()))?;

        Ok(RcgenAuthority::new(issuer, LEAF_CACHE_SIZE, default_provider()))
    }
}

fn root_params() -> Result<CertificateParams, String> {
    let mut params =
        CertificateParams::new(vec![CA_COMMON_NAME.to_string()]).map_err(|e| e.to_string())?;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    Ok(params)
}
