//! Logging setup shared by the server binary and the tests.

/// Name reported by the health check and attached to startup logs.
pub const SERVICE_NAME: &str = "user-microservice";

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Subscriber configuration (filter, format).
pub mod tracing;
