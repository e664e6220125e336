/// Which storage backend to use: "remote" for the hosted backend, "local" (default) for
/// on-device JSON files
pub const BACKEND: &str = "TASKFLOW_BACKEND";
/// Base URL of the hosted backend's API. Required when [BACKEND] is "remote"
pub const API_URL: &str = "TASKFLOW_API_URL";
/// Application identifier the hosted backend scopes requests to. Required when [BACKEND] is
/// "remote"
pub const APP_ID: &str = "TASKFLOW_APP_ID";
/// Bearer token sent to the hosted backend, if the session has one
pub const API_TOKEN: &str = "TASKFLOW_API_TOKEN";
/// Directory holding the local backend's JSON files. Defaults to "taskflow" under the platform's
/// data directory
pub const DATA_DIR: &str = "TASKFLOW_DATA_DIR";
/// Log level configuration for the application. For formatting info, see [tracing-subscriber's documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
pub const LOG_LEVEL: &str = "LOG_LEVEL";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the collector
/// is expected to run alongside the application
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the collector
/// is expected to run alongside the application
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";
