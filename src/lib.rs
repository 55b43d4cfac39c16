//! # storefront-chat
//!
//! Client-side core of a storefront live-support chat.
//!
//! Customers open conversations with store staff; support staff (admins and
//! agents) see every conversation. Request/response operations go over the
//! storefront REST API, new messages arrive over a single WebSocket per
//! session.
//!
//! ## Architecture
//!
//! ```text
//! Console / UI
//!     │
//!     ├── ChatClient (service/)
//!     │     ├── ConversationDirectory   role-scoped list, search, filter
//!     │     ├── MessageStream           history + live, ordered, deduplicated
//!     │     ├── LifecycleController     start / end / read receipts
//!     │     └── ChatViewBinder          active conversation binding
//!     │
//!     ├── ChatBackend (api/)            HTTP (reqwest) or in-memory
//!     └── ConnectionManager (ws/)       tokio-tungstenite + EventBus
//! ```

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
