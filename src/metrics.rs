//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Once;
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Provider Metrics
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("creator_growth_provider_requests_total", "Total number of provider API requests"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "creator_growth_provider_request_duration_seconds",
            "Provider API request duration in seconds"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Token refresh Metrics
    pub static ref TOKEN_REFRESH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("creator_growth_token_refresh_total", "Token refresh attempts by outcome"),
        &["status"]
    ).expect("metric can be created");
    pub static ref TOKEN_REFRESH_SCANS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("creator_growth_token_refresh_scans_total", "Token refresh scans by outcome"),
        &["outcome"]
    ).expect("metric can be created");

    // Ingestion Metrics
    pub static ref MEDIA_ITEMS_INGESTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("creator_growth_media_items_ingested_total", "Media items processed during ingestion"),
        &["status"]
    ).expect("metric can be created");
    pub static ref INGESTION_JOBS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("creator_growth_ingestion_jobs_total", "Background ingestion jobs by outcome"),
        &["status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("creator_growth_errors_total", "Total number of errors"),
        &["error_type", "source"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(PROVIDER_REQUESTS_TOTAL.clone()))
            .expect("PROVIDER_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
            .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(TOKEN_REFRESH_TOTAL.clone()))
            .expect("TOKEN_REFRESH_TOTAL can be registered");
        REGISTRY
            .register(Box::new(TOKEN_REFRESH_SCANS_TOTAL.clone()))
            .expect("TOKEN_REFRESH_SCANS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_ITEMS_INGESTED_TOTAL.clone()))
            .expect("MEDIA_ITEMS_INGESTED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(INGESTION_JOBS_TOTAL.clone()))
            .expect("INGESTION_JOBS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one provider call
pub fn observe_provider_request(endpoint: &str, status: &str, elapsed: Duration) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}
