//! # Workflow: Resumable Expression Evaluation
//!
//! Evaluates small expression programs whose calls may complete asynchronously,
//! on a worker that reports back later. Evaluation never blocks on such a call:
//! it parks the calling node, keeps going wherever it can, and suspends once no
//! further progress is possible. Each arriving result resumes the evaluation by
//! re-walking the tree from the root.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source → Parser → Preprocessor → Evaluator ⇄ Dispatcher / Worker Pool
//! ```
//!
//! - [`parser`] turns source text into a node arena ([`ast::Tree`]).
//! - [`preprocessor`] rewrites `any(...)` and `all(...)` calls into parallel nodes.
//! - [`eval`] drives passes over the tree and tracks pending calls.
//! - [`path`] addresses nodes so a pending call can be located again.
//! - [`dispatch`] and [`worker`] carry asynchronous calls out and results back.
//! - [`session`] serialises results into one evaluator; [`system`] wires it all up.
//!
//! ## Example
//!
//! ```rust,no_run
//! use workflow::{config::SystemConfig, system::System};
//!
//! # async fn example() -> workflow::WorkflowResult<()> {
//! let system = System::new(SystemConfig::default()).await?;
//! let value = system.evaluate("all(add(1, 2), mul(3, 4))").await?;
//! assert_eq!(value.to_string(), "[3, 12]");
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod parser;
pub mod path;
pub mod preprocessor;
pub mod session;
pub mod system;
pub mod worker;

// Re-exports
pub use error::*;
pub use eval::{Evaluator, RunStatus, Value};
pub use path::NodePath;
