//! # Trust Evaluator
//!
//! A rustls `ServerCertVerifier` that optionally pins server certificates to a
//! fixed set of trust anchors.
//!
//! - No pinned set (or an empty one): standard validation against the
//!   webpki root store.
//! - Pinned set: the chain is validated against a root store holding only the
//!   pinned certificates. On success the connection proceeds. On failure the
//!   error is classified; if its class is listed in `TrustPolicy::fallback_on`
//!   (by default expiry, hostname mismatch and unknown issuer) standard
//!   validation decides instead, otherwise the handshake is aborted.
//!
//! Evaluation is synchronous and local: it runs inside the handshake and does
//! no network I/O.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::{CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use serde::Deserialize;
use thiserror::Error;

/// Pinned-validation failures that may defer to standard validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustFailureClass {
    /// The certificate is outside its validity period.
    Expired,
    /// The certificate is not valid for the requested server name.
    HostnameMismatch,
    /// The chain does not lead to a pinned anchor.
    NotTrusted,
}

impl TrustFailureClass {
    /// Classifies a rustls verification error. `None` means the failure is
    /// structural and never eligible for fallback.
    pub fn classify(error: &TlsError) -> Option<Self> {
        match error {
            TlsError::InvalidCertificate(cert_error) => match cert_error {
                CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
                    Some(TrustFailureClass::Expired)
                }
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
                    Some(TrustFailureClass::HostnameMismatch)
                }
                CertificateError::UnknownIssuer => Some(TrustFailureClass::NotTrusted),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parses `expired`, `hostname_mismatch` or `not_trusted`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "expired" => Some(TrustFailureClass::Expired),
            "hostname_mismatch" => Some(TrustFailureClass::HostnameMismatch),
            "not_trusted" => Some(TrustFailureClass::NotTrusted),
            _ => None,
        }
    }
}

/// Which pinned-validation failures fall back to standard validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustPolicy {
    pub fallback_on: BTreeSet<TrustFailureClass>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            fallback_on: BTreeSet::from([
                TrustFailureClass::Expired,
                TrustFailureClass::HostnameMismatch,
                TrustFailureClass::NotTrusted,
            ]),
        }
    }
}

impl TrustPolicy {
    /// Any pinned-validation failure aborts the handshake.
    pub fn strict() -> Self {
        Self {
            fallback_on: BTreeSet::new(),
        }
    }
}

/// What to do after pinned validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// Pinned validation succeeded.
    Accept,
    /// Pinned validation failed with a tolerated class; run standard validation.
    FallBackToDefault(TrustFailureClass),
    /// Pinned validation failed structurally; cancel the connection.
    Reject,
}

/// Maps the outcome of pinned validation to a decision under `policy`.
pub fn decide(policy: &TrustPolicy, outcome: &Result<ServerCertVerified, TlsError>) -> TrustDecision {
    match outcome {
        Ok(_) => TrustDecision::Accept,
        Err(error) => match TrustFailureClass::classify(error) {
            Some(class) if policy.fallback_on.contains(&class) => TrustDecision::FallBackToDefault(class),
            _ => TrustDecision::Reject,
        },
    }
}

/// Failures while assembling the verifier.
#[derive(Debug, Error)]
pub enum TrustSetupError {
    #[error("none of the {0} pinned certificates could be used as a trust anchor")]
    NoUsablePinnedCertificates(usize),

    #[error("verifier could not be built: {0}")]
    Verifier(#[from] rustls::client::VerifierBuilderError),
}

/// Server certificate verifier with optional pinning.
#[derive(Debug)]
pub struct PinnedTrustVerifier {
    /// Standard validation against the webpki roots.
    default: Arc<WebPkiServerVerifier>,
    /// Validation anchored only to the pinned certificates.
    pinned: Option<Arc<WebPkiServerVerifier>>,
    policy: TrustPolicy,
}

impl PinnedTrustVerifier {
    /// Builds the verifier over the webpki roots. `None` or an empty list
    /// disables pinning.
    pub fn new(
        provider: Arc<CryptoProvider>,
        certificates: Option<&[CertificateDer<'static>]>,
        policy: TrustPolicy,
    ) -> Result<Self, TrustSetupError> {
        let default_roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        Self::with_default_roots(provider, default_roots, certificates, policy)
    }

    /// Like [`PinnedTrustVerifier::new`], with `default_roots` standing in for
    /// the webpki roots during standard validation.
    pub fn with_default_roots(
        provider: Arc<CryptoProvider>,
        default_roots: RootCertStore,
        certificates: Option<&[CertificateDer<'static>]>,
        policy: TrustPolicy,
    ) -> Result<Self, TrustSetupError> {
        let default =
            WebPkiServerVerifier::builder_with_provider(Arc::new(default_roots), Arc::clone(&provider)).build()?;

        let pinned = match certificates {
            Some(certs) if !certs.is_empty() => {
                let mut pinned_roots = RootCertStore::empty();
                let (added, ignored) = pinned_roots.add_parsable_certificates(certs.iter().cloned());
                if added == 0 {
                    return Err(TrustSetupError::NoUsablePinnedCertificates(certs.len()));
                }
                if ignored > 0 {
                    tracing::warn!("Ignored {} unparsable pinned certificates", ignored);
                }
                Some(WebPkiServerVerifier::builder_with_provider(Arc::new(pinned_roots), provider).build()?)
            }
            _ => None,
        };

        Ok(Self { default, pinned, policy })
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }
}

impl ServerCertVerifier for PinnedTrustVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let Some(pinned) = &self.pinned else {
            return self
                .default
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);
        };

        let outcome = pinned.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);
        match decide(&self.policy, &outcome) {
            TrustDecision::Accept => outcome,
            TrustDecision::FallBackToDefault(class) => {
                tracing::debug!("Pinned validation failed ({:?}); using default validation", class);
                self.default
                    .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            }
            TrustDecision::Reject => {
                tracing::warn!("Pinned validation rejected the server chain for {:?}", server_name);
                outcome
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.default.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.default.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.default.supported_verify_schemes()
    }
}
