//! # moqt: a Media over QUIC Transport (draft-01) client
//!
//! Negotiates a session over a QUIC-like transport, announces or subscribes to named tracks,
//! and exchanges chunks as objects: one unidirectional stream per object, each with a send
//! order the transport uses to schedule it.
//!
//! ## API
//!
//! - [Engine]: the session state machine, owned by a single task.
//! - [Client]: a cloneable handle that runs an [Engine] on its own task.
//! - [Events]: everything that happens in the background, such as received chunks and errors.
//! - [transport]: the traits a transport implements; see `moqt-native` for QUIC.
//!
//! To publish, [Engine::connect] then [Engine::publish] tracks that have an in-flight limit,
//! and [Engine::send] chunks once a peer subscribed. Admission never blocks: when a track has
//! too many objects in flight the chunk is dropped.
//!
//! To subscribe, [Engine::connect] then [Engine::subscribe]; raw tracks produce
//! [Event::Data] and loc tracks [Event::MediaChunk], which can be fed to a [jitter::Playout].

mod client;
mod config;
mod error;
mod event;
mod session;
mod stats;

pub mod coding;
pub mod jitter;
pub mod message;
pub mod model;
pub mod packager;
pub mod priority;
pub mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use session::*;
pub use stats::*;

pub use model::{Chunk, ChunkKind, MediaType, PackagerKind, Track};
