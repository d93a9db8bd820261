use crate::{
    error::InternalError,
    model::{CollectionDescriptor, CollectionKind},
};
use std::collections::BTreeSet;

/// Validate a descriptor before any handle is ever created.
///
/// All failures here are configuration faults, fatal at startup; the runtime
/// assumes every descriptor it sees has passed this check.
pub fn validate_descriptor(descriptor: &CollectionDescriptor) -> Result<(), InternalError> {
    let role = &descriptor.role;

    if role.is_empty() {
        return Err(InternalError::config("collection role must be non-empty"));
    }
    if descriptor.table.is_empty() {
        return Err(InternalError::config(format!(
            "missing table name for collection: {role}"
        )));
    }
    if descriptor.key_columns.is_empty() {
        return Err(InternalError::config(format!(
            "missing key column(s) for collection: {role}"
        )));
    }
    if descriptor.element_columns.is_empty() {
        return Err(InternalError::config(format!(
            "missing element column(s) for collection: {role}"
        )));
    }

    if descriptor.kind.is_indexed() && !descriptor.has_index() {
        return Err(InternalError::config(format!(
            "indexed collection has no index column(s): {role}"
        )));
    }
    if !descriptor.kind.is_indexed() && descriptor.has_index() {
        return Err(InternalError::config(format!(
            "index column(s) declared for unindexed collection: {role}"
        )));
    }

    if descriptor.kind == CollectionKind::IdentifierBag && !descriptor.has_identifier() {
        return Err(InternalError::config(format!(
            "identifier bag has no identifier column: {role}"
        )));
    }
    if descriptor.kind != CollectionKind::IdentifierBag && descriptor.has_identifier() {
        return Err(InternalError::config(format!(
            "identifier column declared for {} collection: {role}",
            descriptor.kind
        )));
    }

    // One-to-many rows live in the child's own table; a surrogate collection
    // row id has nothing to identify there.
    if descriptor.is_one_to_many && descriptor.has_identifier() {
        return Err(InternalError::config(format!(
            "one-to-many collections with identifiers are not supported: {role}"
        )));
    }

    check_column_duplication(descriptor)?;

    Ok(())
}

// A column may appear in at most one of key/index/identifier/element.
fn check_column_duplication(descriptor: &CollectionDescriptor) -> Result<(), InternalError> {
    let mut distinct: BTreeSet<&str> = BTreeSet::new();

    let all = descriptor
        .key_columns
        .iter()
        .chain(&descriptor.index_columns)
        .chain(&descriptor.identifier_column)
        .chain(&descriptor.element_columns);

    for column in all {
        if !distinct.insert(column.name.as_str()) {
            return Err(InternalError::config(format!(
                "repeated column in mapping for collection: {} column: {}",
                descriptor.role, column.name
            )));
        }
    }

    Ok(())
}
