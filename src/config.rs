// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment (Cloud Run
//! secret bindings in production, `.env` locally) and cached in memory.

use std::env;
use std::str::FromStr;

/// Which `ScheduleStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Storage implementation
    pub storage_backend: StorageBackend,

    // --- Scheduling ---
    /// Length of an occurrence when no class template overrides it
    pub default_session_minutes: u32,
    /// Materialization lookahead for rules without an explicit end
    pub default_horizon_months: u32,
    /// Period of the in-process completion sweep; 0 leaves it to the external trigger
    pub sweep_interval_secs: u64,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Bearer secret expected on `/tasks/*` requests from the scheduler
    pub tasks_shared_secret: String,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            default_session_minutes: 60,
            default_horizon_months: 3,
            sweep_interval_secs: 0,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            tasks_shared_secret: "test_tasks_secret".to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,
            default_session_minutes: positive_or("DEFAULT_SESSION_MINUTES", 60)?,
            default_horizon_months: parse_or("DEFAULT_HORIZON_MONTHS", 3)?,
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", 0)?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            tasks_shared_secret: env::var("TASKS_SHARED_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TASKS_SHARED_SECRET"))?,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Like `parse_or`, but zero is rejected.
fn positive_or(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match parse_or(name, default)? {
        0 => Err(ConfigError::Invalid(name, "0".to_string())),
        value => Ok(value),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
