//! Core library for shelf.
//!
//! This crate holds every rule about how versioned code libraries move
//! between drafts and releases. The `shelf` CLI is a thin shell around it.
//!
//! # Modules
//!
//! - [`access`] - Who may edit or release a library
//! - [`audit`] - Audit trail of state transitions
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types and result aliases
//! - [`library`] - Library and library-set records
//! - [`lifecycle`] - The draft/release lifecycle service
//! - [`store`] - Persistence of libraries and sets
//! - [`translator`] - Source validation against an external compiler
//! - [`version`] - Version numbers and their text codec
//!
//! # Quick Start
//!
//! ```
//! use shelf_core::audit::MemoryAuditLog;
//! use shelf_core::lifecycle::LifecycleService;
//! use shelf_core::library::UserId;
//! use shelf_core::store::MemoryStore;
//! use shelf_core::translator::ScriptedTranslator;
//! use shelf_core::version::ReleaseKind;
//!
//! let service = LifecycleService::new(
//!     MemoryStore::new(),
//!     ScriptedTranslator::new(),
//!     MemoryAuditLog::new(),
//! );
//! let alice = UserId::new("alice");
//!
//! let draft = service
//!     .create_library("Common", "fhir-4.0.1", "define X: 1", &alice)
//!     .unwrap();
//! let released = service
//!     .create_version(&draft.id, ReleaseKind::Major, &alice, None)
//!     .unwrap();
//! assert_eq!(released.version.to_string(), "1.0.000");
//! ```
#![deny(unsafe_code)]

pub mod access;

pub mod audit;

pub mod config;

pub mod error;

pub mod library;

pub mod lifecycle;

pub mod store;

pub mod translator;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use lifecycle::{LibraryEdit, LifecycleError, LifecycleResult, LifecycleService};
