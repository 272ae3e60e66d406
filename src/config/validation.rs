//! Semantic configuration validation.
//!
//! Serde handles the syntactic side; this module checks the rules that
//! span fields. Validation runs before the pipeline is built and returns
//! every violation, not just the first.

use thiserror::Error;

use crate::config::schema::{BucketConfig, MirrorConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listen address '{0}' is not host:port")]
    BadListenAddress(String),
    #[error("backend '{name}' address '{address}' is not host:port")]
    BadBackendAddress { name: String, address: String },
    #[error("workers must be at least 1")]
    NoWorkers,
    #[error("queue capacity must be at least 1")]
    NoQueueCapacity,
    #[error("bucket offsets start={start} end={end} are reversed")]
    ReversedBucketRange { start: usize, end: usize },
    #[error("cannot specify both require-bucket and exclude-bucket")]
    ConflictingBucketFilters,
}

/// Validate a fully-assembled configuration.
pub fn validate(config: &MirrorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !looks_like_host_port(&config.listen) {
        errors.push(ValidationError::BadListenAddress(config.listen.clone()));
    }
    for backend in [&config.backend_a, &config.backend_b] {
        if !looks_like_host_port(&backend.address) {
            errors.push(ValidationError::BadBackendAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
            });
        }
    }

    if config.workers == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.queue_capacity == 0 {
        errors.push(ValidationError::NoQueueCapacity);
    }

    match config.bucket {
        Some(BucketConfig::BodySlice { start, end }) | Some(BucketConfig::PathParts { start, end })
            if start > end =>
        {
            errors.push(ValidationError::ReversedBucketRange { start, end });
        }
        _ => {}
    }

    if config.require_bucket.is_some() && config.exclude_bucket.is_some() {
        errors.push(ValidationError::ConflictingBucketFilters);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn looks_like_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    fn valid() -> MirrorConfig {
        MirrorConfig {
            listen: "0.0.0.0:8080".into(),
            backend_a: BackendConfig {
                name: "a".into(),
                address: "127.0.0.1:3000".into(),
            },
            backend_b: BackendConfig {
                name: "b".into(),
                address: "127.0.0.1:3001".into(),
            },
            ..MirrorConfig::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn require_and_exclude_together_are_rejected() {
        let mut config = valid();
        config.require_bucket = Some("x".into());
        config.exclude_bucket = Some("y".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ConflictingBucketFilters));
    }

    #[test]
    fn reversed_slice_offsets_are_rejected() {
        let mut config = valid();
        config.bucket = Some(BucketConfig::BodySlice { start: 4, end: 2 });
        let errors = validate(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ReversedBucketRange { start: 4, end: 2 }));
    }

    #[test]
    fn all_violations_are_reported() {
        let mut config = valid();
        config.workers = 0;
        config.queue_capacity = 0;
        config.backend_b.address = "not-an-address".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn host_port_shapes() {
        assert!(looks_like_host_port("127.0.0.1:80"));
        assert!(looks_like_host_port("svc.internal:9999"));
        assert!(!looks_like_host_port("9999"));
        assert!(!looks_like_host_port(":8080"));
        assert!(!looks_like_host_port("host:port"));
    }
}
