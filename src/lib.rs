//! # salvo-session-store
//!
//! Server-side session storage for the Salvo web framework.
//!
//! A [`Manager`] owns a pluggable [`SessionStore`] and hands out one
//! [`Session`] per request. The session loads lazily, tracks whether it was
//! modified, and on close either writes itself back or just extends its TTL.
//!
//! ## Features
//!
//! - **Pluggable storage backends**: memory, local files (optionally AES
//!   encrypted), a key-value store holding one JSON blob per session, or one
//!   hash per session with per-field reads and writes
//! - **Coalesced TTL refresh**: read-only requests don't hit the backend; ids
//!   are batched and refreshed by a background task
//! - **Safe id regeneration** to prevent session fixation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_session_store::{FileStore, Manager, SessionConfig, SessionDepotExt, SessionHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = FileStore::new("/var/lib/myapp/sessions").unwrap();
//!     let manager = Manager::new(store, std::time::Duration::from_secs(86400));
//!     let session_handler = SessionHandler::new(manager, SessionConfig::new());
//!
//!     let router = Router::new()
//!         .hoop(session_handler)
//!         .get(index);
//!
//!     Server::new(TcpListener::bind("127.0.0.1:5800").await)
//!         .serve(router)
//!         .await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let session = depot.session_mut().unwrap();
//!     let views: i64 = session.get("views").await.unwrap().unwrap_or(0);
//!     session.set("views", views + 1).await.unwrap();
//!     format!("views: {}", views + 1)
//! }
//! ```

pub mod coalescer;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod id;
pub mod kv;
pub mod manager;
pub mod scheduler;
pub mod session;
pub mod store;

pub use config::{FileStoreOptions, KvStoreOptions, SessionConfig};
pub use error::{Result, SessionError};
pub use handler::SessionHandler;
pub use id::new_id;
pub use kv::KvClient;
pub use manager::Manager;
pub use session::{Session, SessionData};
pub use store::{FileStore, KvBlobStore, KvHashStore, MemoryStore, SessionStore};

/// Extension trait for Depot to easily access session
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
