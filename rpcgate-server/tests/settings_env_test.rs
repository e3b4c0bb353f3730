//! Environment layer of settings loading

use rpcgate_core::Error;
use rpcgate_server::Settings;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

// Tests in this binary share the process environment.
static ENV: Mutex<()> = Mutex::new(());

/// Sets variables for one test and restores them on drop
struct EnvOverride {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvOverride {
    fn new(vars: &[(&'static str, &str)]) -> Self {
        let lock = ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let saved = vars
            .iter()
            .map(|(name, value)| {
                let previous = std::env::var(name).ok();
                std::env::set_var(name, value);
                (*name, previous)
            })
            .collect();
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        for (name, previous) in &self.saved {
            match previous {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

fn settings_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_env_overrides_file_scalars() {
    let file = settings_file(
        r#"
access_header_name = "X-File-Key"
auth_validate = true
max_batch_size = 10

[[keys]]
service = "BillingService"
key = "k1"

[[acl]]
method = "Api.refund"
services = ["BillingService"]
"#,
    );
    let _env = EnvOverride::new(&[
        ("RPCGATE__AUTH_VALIDATE", "false"),
        ("RPCGATE__MAX_BATCH_SIZE", "5"),
        ("RPCGATE__DESCRIPTION", "Billing Gateway"),
    ]);

    let settings = Settings::load(Some(file.path())).unwrap();

    assert!(!settings.auth_validate);
    assert_eq!(settings.max_batch_size, Some(5));
    assert_eq!(settings.description, "Billing Gateway");
    assert_eq!(settings.access_header_name, "X-File-Key");
    assert_eq!(settings.keys.get("BillingService").map(String::as_str), Some("k1"));
    assert_eq!(
        settings.acl.get("Api.refund").cloned(),
        Some(vec!["BillingService".to_string()])
    );
}

#[test]
fn test_env_without_file() {
    let _env = EnvOverride::new(&[("RPCGATE__CONTROLLER_NAMESPACE", "billing")]);

    let settings = Settings::load(None).unwrap();

    assert_eq!(settings.controller_namespace, "billing");
    assert_eq!(settings.default_controller, "Api");
}

#[test]
fn test_env_keys_are_rejected() {
    let _env = EnvOverride::new(&[("RPCGATE__KEYS__BILLING", "secret")]);

    let err = Settings::load(None).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
