pub mod coordinates;
pub mod error;
pub mod kmz;
pub mod map_type;
pub mod model;
pub mod parser;
pub mod projection;
pub mod transform;
pub mod writer;

pub use coordinates::convert_coordinates;
pub use error::{CoordinateError, Error, Result};
pub use kmz::KmzHandler;
pub use map_type::MapType;
pub use projection::{EtrsTm35FinConverter, GeodeticPoint, ProjectedPoint, ProjectionConverter};
pub use transform::{convert_kml, ConvertOptions, KmlTransformer, TransformReport};
pub use writer::KmlWriter;
