//! # pagesmith
//!
//! A task service that turns a written brief into a published single-page app.
//!
//! This library provides:
//! - An HTTP API for task submission and status
//! - An LLM-backed generator for self-contained HTML applications
//! - A GitHub publisher that creates or updates a repository and enables Pages
//! - Callback delivery with exponential backoff
//!
//! ## Architecture
//!
//! ```text
//!   POST /api/deploy
//!          │
//!          ▼
//!   ┌──────────────────┐     ┌──────────────┐
//!   │ TaskCoordinator  │────►│ TaskRegistry │  (dedup, state)
//!   └────────┬─────────┘     └──────────────┘
//!            │ spawn (TaskTracker)
//!            ▼
//!   CodeGenerator ──► Publisher ──► DeliveryClient
//!     (llm)            (GitHub)      (evaluation_url)
//! ```
//!
//! ## Task Flow
//! 1. Verify the shared secret and validate the submission
//! 2. Claim the task id in the registry (duplicates are answered from it)
//! 3. Generate, publish, and notify in the background
//! 4. Record `completed` or `failed`
//!
//! ## Modules
//! - `api`: axum routes and response types
//! - `task`: task types, registry, coordinator
//! - `generator` / `llm`: code generation
//! - `publish`: GitHub repository + Pages publishing
//! - `delivery`: callback delivery with retries

pub mod api;
pub mod config;
pub mod delivery;
pub mod generator;
pub mod llm;
pub mod publish;
pub mod task;

pub use config::Config;
