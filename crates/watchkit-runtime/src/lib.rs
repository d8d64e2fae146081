#![forbid(unsafe_code)]

//! Runtime: watches, the registry that runs dirty-checking passes, collection
//! tracking, computed properties and per-target watch sets.
//!
//! # Architecture
//!
//! ```text
//! WatchSet ──attach──▶ Computed ──▶ Watch(es) ──bind──▶ Registry live set
//!                                                       │
//!                                    Scheduler ◀─schedule┘  run_now ─▶ pass
//! ```
//!
//! - [`Watch`]: one expression bound to a scope, with a baseline and a
//!   callback.
//! - [`Registry`]: the live set, pass loop with feedback-loop detection,
//!   one-shot callbacks and listeners.
//! - [`track_members`]: per-member add/remove events over a collection.
//! - [`Computed`]: `Expr`, `If`, `Map`, `When`, `Value` and user-defined
//!   [`ComputedProperty`] strategies.
//! - [`WatchSet`]: bulk enable/disable of everything attached to one object.
//!
//! Everything is single-threaded (`Rc`-based); a registry and its watches
//! live on one thread.

pub mod computed;
pub mod config;
pub mod error;
pub mod registry;
pub mod schedule;
pub mod target;
pub mod tracker;
pub mod watch;

pub use computed::{Computed, ComputedProperty, IfProperty, MapProperty, WhenProperty};
pub use config::RegistryConfig;
pub use error::{ConfigError, ObserveError, Result};
pub use registry::{Listener, Registry, RegistryBuilder, WeakRegistry};
pub use schedule::{ManualScheduler, Scheduler, Task, TaskHandle, TimerScheduler};
pub use target::WatchSet;
pub use tracker::{MemberCallback, MemberKey, ignore_members, track_members};
pub use watch::{Watch, WatchCallback, WeakWatch};
