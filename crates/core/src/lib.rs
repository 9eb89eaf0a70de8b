#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

//! Core library for the guav translator.
//!
//! `guav_core` provides:
//! - the shorthand vocabulary via [`rules`]
//! - line classification via [`classify`]
//! - `func` signature translation via [`signature`]
//! - generic statement translation via [`statement`]
//! - `###` function generation via [`bridge`] and [`providers`]
//! - whole-file assembly via [`engine`]
//! - compiling and running the result via [`runner`]
//! - shared data and configuration types via [`types`]
//!
//! # Quick Start
//!
//! ```no_run
//! use guav_core::engine::Engine;
//! use guav_core::providers::MockProvider;
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(MockProvider).with_output_dir("output");
//! let report = engine.translate_file(Path::new("hello.guav")).await?;
//! assert!(report.output_path.ends_with("Hello.java"));
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod classify;
pub mod engine;
pub mod providers;
pub mod rules;
pub mod runner;
pub mod signature;
pub mod statement;
pub mod types;
