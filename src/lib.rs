#![doc(html_root_url = "https://docs.rs/pseudoroot/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! pseudoroot: an NFSv4 pseudo root built from bind mounts
//!
//! NFSv4 clients see a single namespace. This crate builds one on disk: a
//! tmpfs anchored at a root directory with every export bind-mounted at its
//! own path underneath, and keeps the synthetic root export the protocol
//! layer needs to recognise requests for it.
//!
//! ## Features
//!
//! - Shortest-path-first mount ordering so parents never hide children
//! - Per-export outcome reports; one bad export doesn't stop the rest
//! - One lazy detach tears the whole tree down
//! - `chkroot`, `maproot` and `export` lookups on the published root
//! - Pluggable [`Mounter`] for running without privileges
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pseudoroot::{Config, ExportEntry, ExportRegistry, FsidType, PseudoRootManager};
//!
//! let registry = ExportRegistry::from_entries([
//!     ExportEntry::new("*", "/srv/nfs"),
//!     ExportEntry::new("*", "/srv/nfs/home"),
//! ]);
//!
//! let manager = PseudoRootManager::system(&Config::default());
//! manager.create(&registry);
//!
//! let pseudo = manager.pseudo();
//! assert!(pseudo.chkroot(FsidType::Num, 0, None).is_some());
//! assert_eq!(
//!     pseudo.maproot("/var/lib/nfs/v4root/srv/nfs").as_deref(),
//!     Some("/srv/nfs")
//! );
//!
//! manager.destroy();
//! ```

pub mod modules;

pub use modules::config::Config;
pub use modules::export::{ClientClass, ExportEntry, ExportFlags, ExportRegistry, FsidType};
pub use modules::mounts::{Mounter, SyscallMounter};
pub use modules::pseudo::PseudoRoot;
pub use modules::v4root::{CreateStatus, PseudoRootManager, TeardownReport};
