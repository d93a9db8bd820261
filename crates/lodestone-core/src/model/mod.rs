mod descriptor;
mod validate;


pub use descriptor::{
    CachePolicy, CollectionDescriptor, CollectionKind, ColumnKind, ColumnModel, RowSelect,
};
pub use validate::validate_descriptor;
