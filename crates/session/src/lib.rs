// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-account session cache.
//!
//! Holds every account the user has logged into, tracks which one is
//! active, and keeps the list and its profiles persisted in a key-value
//! store. Hosts talk to it through a [`CacheHandle`].

pub mod book;
pub mod cache;
pub mod error;
pub mod events;
pub mod handle;
pub mod model;
pub mod store;
pub mod subscription;
pub mod writer;

pub use cache::{CacheOptions, CacheSnapshot, CacheStatus, SessionCache};
pub use error::{CacheError, ErrorKind};
pub use events::PushEvent;
pub use handle::CacheHandle;
pub use model::{AccountView, AvatarScheme, Profile, SessionEvent};
pub use store::{JsonFileStore, KvStore, MemoryStore};
pub use subscription::Subscription;
pub use writer::PersistTicket;
