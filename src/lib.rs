//! Client Records API Library
//!
//! Insurance client records with their scanned documents: structured fields
//! stored in Postgres, documents in Azure Blob Storage behind time-limited
//! read URLs, plus batch import and a manager-only bulk delete.
//!
//! # Modules
//!
//! - `api`: API-layer components.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `access`: Bulk-delete access gate.
//! - `auth`: Bearer-token verification and the request principal.
//! - `azure_blob`: Azure Blob Storage client with SAS signing.
//! - `circuit_breaker`: Circuit breaker for object-store writes.
//! - `client_store`: Client record persistence.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `importer`: Batch import of client rows.
//! - `models`: Core data models.
//! - `object_store`: Object-store capability.
//! - `records`: Client record writer.
//! - `routes`: HTTP router assembly.
//! - `schema`: Client field registry.
//! - `uploads`: Upload intake and the document upload adapter.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod access;
pub mod auth;
pub mod azure_blob;
pub mod circuit_breaker;
pub mod client_store;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod importer;
pub mod models;
pub mod object_store;
pub mod records;
pub mod routes;
pub mod schema;
pub mod uploads;
