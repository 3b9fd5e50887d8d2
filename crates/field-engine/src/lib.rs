//! Derived-Field and Multi-Source Routing Engine
//!
//! This crate answers read requests against archives of 3-D gridded fields.
//! It enables:
//!
//! - **Derived fields**: wind speed/direction, differences between fields,
//!   sources or times, composites and linear rescalings, computed at request
//!   time from fetched base fields
//! - **Multi-source routing**: nested domains or explicit failover lists,
//!   tried strictly in order
//! - **Measured RHI**: vertical sections answered from radar RHI scans when
//!   one lines up with the request
//! - **Time-height profiles**: per-time point profiles stitched into a grid
//!
//! # Architecture
//!
//! ```text
//! RequestContext
//!      │
//!      ▼
//! resolve(requested, specs) ──► base field set
//!      │
//!      ▼
//! DomainRouter::candidates ──► try_each(url → GridStore read)
//!      │                              │
//!      │                              └─► first source that answers
//!      ▼
//! FieldDeriver::derive (per derived field)
//!      │
//!      ▼
//! convert_encoding ──► response
//! ```
//!
//! # Example
//!
//! ```ignore
//! use field_engine::{FieldServer, FileGridStore, ServerConfig};
//!
//! let store = Arc::new(FileGridStore::new("/data/archives"));
//! let server = FieldServer::new(store, ServerConfig::from_file("server.yaml")?)?;
//! let fields = server.handle_read_volume(&request).await?;
//! ```

pub mod config;
pub mod derive;
pub mod derived;
pub mod geo;
pub mod geometry;
pub mod resolver;
pub mod rhi;
pub mod router;
pub mod service;
pub mod store;
pub mod time_height;
pub mod vsection;

// Re-export commonly used types at crate root
pub use config::{ClimoConfig, FailoverConfig, RhiConfig, ServerConfig, VsectionConfig};
pub use derive::{FieldDeriver, ReadAction};
pub use derived::{DerivedFieldConfig, DerivedFieldSpec, DerivedFunction, FunctionKind};
pub use geometry::same_geometry;
pub use resolver::{resolve, ResolvedFields};
pub use rhi::{FallbackReason, RhiAzimuthSample, RhiSelection, RhiSelector};
pub use router::{build_candidates, try_each, within_domain, DomainDescriptor, DomainRouter, SourcePlan};
pub use service::{FieldServer, VsectionResult};
pub use store::{ClimoFileFinder, FileGridStore, GridStore, MonthlyClimoFinder};
pub use time_height::{assemble, ProfileRead, TIME_HEIGHT_MISSING};
