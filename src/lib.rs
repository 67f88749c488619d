//! Lesson content-block authoring engine.
//!
//! - `domain`, `editor`: the lesson draft and the pure operations over it
//! - `upload`, `assets`: per-address upload tasks and the upload collaborator
//! - `wizard`: step validation and navigation
//! - `session`: one author's draft + uploads + wizard, and submission
//! - `wire`, `lesson_api`: the lesson API's shapes and client
//! - `state`, `protocol`, `routes`: the HTTP authoring service

pub mod assets;
pub mod config;
pub mod domain;
pub mod editor;
pub mod error;
pub mod lesson_api;
pub mod protocol;
pub mod routes;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod upload;
pub mod util;
pub mod wire;
pub mod wizard;
