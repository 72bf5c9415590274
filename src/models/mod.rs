mod domain;
mod record;
mod row;

pub use domain::Domain;
pub use record::{DestinationRecord, NaturalKey};
pub use row::{SourceRow, Value};
