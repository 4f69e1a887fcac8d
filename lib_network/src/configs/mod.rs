pub mod cert_store;
pub mod config_sys;

pub use cert_store::{CertStoreError, CertificateSource, FileCertificateStore, StaticCertificates};
pub use config_sys::{NetworkConfig, RuntimeConfigError};
