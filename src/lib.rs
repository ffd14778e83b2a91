//! Advisory Back-Office API Library
//!
//! Service behind the advisory dashboard: classifies client subscriptions
//! into active, upcoming and past plans, computes renewal dates, moves leads
//! through the onboarding pipeline and validates bulk lead uploads. All
//! persistence lives in a remote REST backend.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Domain logic.
//! - `integrations`: External service integrations.
//! - `app`: Router construction.
//! - `auth`: Bearer token extraction.
//! - `backend_client`: REST backend client.
//! - `clock`: Injectable "today".
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `lead_import`: Bulk lead upload validation.
//! - `lead_stage`: Lead onboarding pipeline.
//! - `models`: Records and request/response models.
//! - `notifier`: User-facing notices.
//! - `subscription_timeline`: Subscription classification and renewal dates.

pub mod api;
pub mod core;
pub mod integrations;

pub mod app;
pub mod auth;
pub mod backend_client;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod lead_import;
pub mod lead_stage;
pub mod models;
pub mod notifier;
pub mod subscription_timeline;
