//! # dassort-renderer
//!
//! `${name}` template substitution, nested descriptor key search, and the
//! per-group [`PathContext`] the two meet in.
//!
//! ## Usage
//!
//! ```rust
//! use dassort_renderer::{search, PathContext};
//! use serde_json::json;
//!
//! let descriptor = json!({"session": {"subject": "S01"}});
//! let mut ctx = PathContext::new();
//! ctx.set("root", json!("/out"));
//! ctx.set("subj", search::first_or("subject", &descriptor, &json!("unknown")).clone());
//! assert_eq!(ctx.render("${root}/${subj}").unwrap(), "/out/S01");
//! ```

pub mod context;
pub mod error;
pub mod search;
pub mod template;

pub use context::PathContext;
pub use error::RenderError;
pub use search::KeySearch;
pub use template::{referenced_names, render, Variables};
