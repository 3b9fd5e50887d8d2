//! Common types shared across the field server crates: headers, volumes,
//! requests, time search, output encoding and errors.

pub mod bbox;
pub mod encoding;
pub mod error;
pub mod header;
pub mod request;
pub mod time;
pub mod volume;

pub use bbox::LatLonBox;
pub use encoding::{convert_encoding, OutputFormat};
pub use error::{FieldError, FieldResult};
pub use header::{
    Compression, Encoding, FieldHeader, ProjectionParams, ProjectionType, Scaling, VlevelType,
};
pub use request::{ReadKind, RequestContext, SamplePoint, VerticalLimits, Waypoint};
pub use time::{TimeSelector, TimeSpan};
pub use volume::FieldVolume;
