use crate::{
    model::{CollectionDescriptor, ColumnModel, RowSelect},
    sync::sql::{DeleteBuilder, InsertBuilder, UpdateBuilder},
};

///
/// StatementSet
///
/// The four parametrized statement shapes for one association, rendered once
/// per descriptor. For a one-to-many association the child table itself
/// carries the foreign key, so row inserts degrade to UPDATEs that set the
/// key (and index) columns and row deletes degrade to UPDATEs that null them;
/// a one-to-many row update splits into a removal and an addition UPDATE.
///

#[derive(Debug)]
pub struct StatementSet {
    /// Delete every row for one owner, used for full recreate or owner
    /// deletion. Binds key column(s) only.
    pub remove_all: String,
    /// Insert one row. Binds key, then index if indexed, then surrogate id
    /// if identified, then element.
    pub insert_row: String,
    /// Update one row in place. Binds element first, then the row-select
    /// predicate. Absent for shapes with no addressable row (sets, bags).
    pub update_row: Option<UpdateRow>,
    /// Delete one row. Binds the row-select predicate only.
    pub delete_row: String,
}

///
/// UpdateRow
///

#[derive(Debug)]
pub enum UpdateRow {
    /// Single in-place UPDATE of the element columns.
    InPlace(String),
    /// One-to-many: null the old row's foreign key, then claim the new one.
    /// All removals in a flush run before any addition.
    Split { remove: String, add: String },
}

impl StatementSet {
    #[must_use]
    pub fn generate(d: &CollectionDescriptor) -> Self {
        if d.is_one_to_many {
            Self::generate_one_to_many(d)
        } else {
            Self::generate_joined(d)
        }
    }

    /// Statement family for an owned join table (element or many-to-many).
    fn generate_joined(d: &CollectionDescriptor) -> Self {
        let remove_all = DeleteBuilder::new(&d.table)
            .where_columns(&d.key_columns)
            .build();

        let mut insert = InsertBuilder::new(&d.table).columns(&d.key_columns);
        if d.has_index() {
            insert = insert.columns(&d.index_columns);
        }
        if let Some(identifier) = &d.identifier_column {
            insert = insert.column(identifier);
        }
        let insert_row = insert.columns(&d.element_columns).build();

        let update_row = match d.row_select() {
            // sets and bags have no row address; changed elements flush as
            // delete plus insert instead
            RowSelect::KeyAndElement => None,
            select => Some(UpdateRow::InPlace(
                UpdateBuilder::new(&d.table)
                    .set_columns(&d.element_columns)
                    .where_columns(&row_select_columns(d, select))
                    .build(),
            )),
        };

        let delete_row = DeleteBuilder::new(&d.table)
            .where_columns(&row_select_columns(d, d.row_select()))
            .build();

        Self {
            remove_all,
            insert_row,
            update_row,
            delete_row,
        }
    }

    fn generate_one_to_many(d: &CollectionDescriptor) -> Self {
        let remove_all = UpdateBuilder::new(&d.table)
            .set_null(&d.key_columns)
            .set_null(&d.index_columns)
            .where_columns(&d.key_columns)
            .build();

        // claim the child row: element columns are the child's own key
        let mut insert = UpdateBuilder::new(&d.table).set_columns(&d.key_columns);
        if d.has_index() {
            insert = insert.set_columns(&d.index_columns);
        }
        let insert_row = insert.where_columns(&d.element_columns).build();

        let delete_row = UpdateBuilder::new(&d.table)
            .set_null(&d.key_columns)
            .set_null(&d.index_columns)
            .where_columns(&row_select_columns(d, d.row_select()))
            .build();

        let update_row = d.has_index().then(|| UpdateRow::Split {
            remove: delete_row.clone(),
            add: insert_row.clone(),
        });

        Self {
            remove_all,
            insert_row,
            update_row,
            delete_row,
        }
    }
}

/// Columns selecting one row for update/delete.
fn row_select_columns(d: &CollectionDescriptor, select: RowSelect) -> Vec<ColumnModel> {
    match select {
        RowSelect::Identifier => d.identifier_column.iter().cloned().collect(),
        RowSelect::KeyAndIndex => d
            .key_columns
            .iter()
            .chain(&d.index_columns)
            .cloned()
            .collect(),
        RowSelect::KeyAndElement => d
            .key_columns
            .iter()
            .chain(&d.element_columns)
            .cloned()
            .collect(),
    }
}
