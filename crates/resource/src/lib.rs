//! # Scopekit Resource Management
//!
//! Scoped acquisition and guaranteed release of resources.
//!
//! - [`Guard`] owns one open handle and releases it exactly once, on every
//!   exit path including panics.
//! - [`Scope`] / [`scoped`] run a body against one guarded resource and apply
//!   a [`Policy`] to the way the body exits.
//! - [`ResourceStack`] composes guards and releases them in reverse
//!   acquisition order, threading the body error through each member's
//!   policy as nested scopes would.
//! - [`Journal`] records every lifecycle event with a timestamp and mirrors
//!   it to `tracing`.
//!
//! ```no_run
//! use scopekit_resource::resources::{FileConfig, FileResource};
//! use scopekit_resource::{Journal, Policy, scoped};
//!
//! let journal = Journal::new();
//! let outcome = scoped(
//!     "temp",
//!     &FileConfig::temporary("temp.txt"),
//!     Policy::Propagate,
//!     &journal,
//!     |file: &mut FileResource| {
//!         file.write_line("Ligne 1")?;
//!         file.read_to_string()
//!     },
//! )?;
//! assert!(outcome.is_completed());
//! # Ok::<(), scopekit_resource::Error>(())
//! ```

pub mod error;
pub mod events;
pub mod guard;
pub mod policy;
pub mod resource;
pub mod resources;
pub mod scope;
pub mod stack;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, ErrorKind, Result};
pub use events::{Entry, Journal, Level, ResourceEvent};
pub use guard::{Finish, Guard, State, Verdict};
pub use policy::{ExitKind, Policy};
pub use resource::{Acquire, Config, Resource, ResourceKind};
pub use scope::{Outcome, Phase, Scope, scoped};
pub use stack::{ResourceStack, Slot};

/// Common imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::events::{Journal, Level, ResourceEvent};
    pub use crate::guard::Guard;
    pub use crate::policy::Policy;
    pub use crate::resource::{Acquire, Config, Resource, ResourceKind};
    pub use crate::scope::{Outcome, Scope, scoped};
    pub use crate::stack::{ResourceStack, Slot};
}
