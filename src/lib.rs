//! ```text
//! incoming/ ──► extract ──► chunker ──► embeddings ──┐
//!                                                    ▼
//!                  pipeline ────────────► index (remote vector service)
//!                     │                        ▲
//!                     └─► archive to indexed/  │ top-k search
//!                                              │
//! query ──► embeddings ──► qa ──► completion ──► answer + sources
//! ```
//!
//! Uploaded documents are split into overlapping chunks, embedded, and
//! upserted into a named remote vector index; questions are answered by
//! retrieving the most similar chunks and asking a completion model to
//! ground its reply in them. The HTTP layer in [`server`] is a thin
//! wrapper around [`pipeline`] and [`qa`].

pub mod chunker;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod index;
pub mod pipeline;
pub mod qa;
mod retry;
pub mod server;
pub mod types;
mod util;

pub use retry::RetryPolicy;
