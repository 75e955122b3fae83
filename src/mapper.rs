/// Object Mapper
///
/// Maps structured values to table rows and back through bindings declared
/// once per type at registration time. The write side is an ordered list of
/// field bindings (column name plus accessor); the read side is a single
/// designated row constructor (ordered column names plus a build closure
/// invoked with values pulled from the matching row).
///
/// Field harvesting is total: every registered field is read on every write,
/// and an accessor returning `None` is an error, never a silent omission.
/// Harvesting across composed ("parent") structures is explicit: `embed`
/// merges another binding's fields through a projection and chains to any
/// depth the registrant wants.
use crate::driver::RowSet;
use crate::error::{DbError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// One persistable field: a column name and how to read its value.
pub struct FieldBinding<T> {
    column: String,
    get: Arc<dyn Fn(&T) -> Option<String> + Send + Sync>,
}

/// The designated row constructor for a type: the columns its parameters
/// bind to, in declaration order, and the closure that builds the value.
pub struct RowConstructor<T> {
    columns: Vec<String>,
    build: Arc<dyn Fn(&ConstructorArgs) -> Result<T> + Send + Sync>,
}

/// Values pulled from a result row, ordered to match the constructor's
/// declared columns. Accessors fail with `Construction` so a coercion or
/// arity mistake surfaces as exactly that.
pub struct ConstructorArgs {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl ConstructorArgs {
    /// The raw cell for parameter `index`; NULL becomes `None`.
    pub fn opt(&self, index: usize) -> Result<Option<&str>> {
        self.values
            .get(index)
            .map(|v| v.as_deref())
            .ok_or_else(|| {
                DbError::Construction(format!(
                    "constructor parameter {index} out of range ({} declared)",
                    self.columns.len()
                ))
            })
    }

    /// The cell for parameter `index`, required non-NULL.
    pub fn get(&self, index: usize) -> Result<&str> {
        self.opt(index)?.ok_or_else(|| {
            DbError::Construction(format!(
                "column `{}` was NULL but the constructor requires a value",
                self.columns[index]
            ))
        })
    }

    /// Parses the cell for parameter `index` into `V`.
    pub fn parse<V>(&self, index: usize) -> Result<V>
    where
        V: FromStr,
        V::Err: Display,
    {
        let raw = self.get(index)?;
        raw.parse().map_err(|e| {
            DbError::Construction(format!(
                "column `{}`: cannot coerce {raw:?}: {e}",
                self.columns[index]
            ))
        })
    }
}

/// The full binding for one type: write-side fields plus an optional read
/// constructor.
pub struct EntityBinding<T> {
    fields: Vec<FieldBinding<T>>,
    constructor: Option<RowConstructor<T>>,
}

impl<T> EntityBinding<T> {
    pub fn builder() -> EntityBindingBuilder<T> {
        EntityBindingBuilder {
            fields: Vec::new(),
            constructor: None,
            constructor_count: 0,
        }
    }

    /// Harvests every bound field in declaration order.
    ///
    /// An accessor returning `None` (an absent/unset value) is a
    /// serialization error rather than a silently skipped column.
    pub fn harvest(&self, value: &T) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match (field.get)(value) {
                Some(cell) => pairs.push((field.column.clone(), cell)),
                None => {
                    return Err(DbError::Serialization(format!(
                        "field bound to column `{}` of {} has no value",
                        field.column,
                        std::any::type_name::<T>()
                    )))
                }
            }
        }
        Ok(pairs)
    }

    /// Rebuilds a value from one row of a result set.
    ///
    /// Pulls each constructor column from the row (a missing column is a
    /// construction error) and invokes the build closure with the values in
    /// declaration order.
    pub fn construct(&self, rows: &RowSet, row: usize) -> Result<T> {
        let constructor = self.constructor.as_ref().ok_or_else(|| {
            DbError::NoConstructor(format!(
                "no row constructor registered for {}",
                std::any::type_name::<T>()
            ))
        })?;

        let cells = rows.rows.get(row).ok_or_else(|| {
            DbError::Construction(format!(
                "row index {row} out of range ({} rows)",
                rows.rows.len()
            ))
        })?;

        let mut values = Vec::with_capacity(constructor.columns.len());
        for column in &constructor.columns {
            let index = rows.columns.iter().position(|c| c == column).ok_or_else(|| {
                DbError::Construction(format!("result row has no column `{column}`"))
            })?;
            values.push(cells[index].clone());
        }

        let args = ConstructorArgs {
            columns: constructor.columns.clone(),
            values,
        };
        (constructor.build)(&args)
    }

    /// Whether a row constructor was registered.
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }
}

/// Builder for `EntityBinding`, the registration-time replacement for
/// metadata-tag introspection. Excluded fields are simply never registered;
/// renamed fields register under the column name instead of the field name.
pub struct EntityBindingBuilder<T> {
    fields: Vec<FieldBinding<T>>,
    constructor: Option<RowConstructor<T>>,
    constructor_count: usize,
}

impl<T> EntityBindingBuilder<T> {
    /// Binds one field to a column.
    pub fn field<F>(mut self, column: impl Into<String>, get: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.fields.push(FieldBinding {
            column: column.into(),
            get: Arc::new(get),
        });
        self
    }

    /// Merges the fields of another binding through a projection, for
    /// composed ("parent") structures. Chain as many levels as the type
    /// actually nests; depth is whatever the registrant declares.
    pub fn embed<P>(mut self, project: fn(&T) -> &P, parent: &EntityBinding<P>) -> Self
    where
        P: 'static,
        T: 'static,
    {
        for field in &parent.fields {
            let get = Arc::clone(&field.get);
            self.fields.push(FieldBinding {
                column: field.column.clone(),
                get: Arc::new(move |value: &T| get(project(value))),
            });
        }
        self
    }

    /// Designates the row constructor: the columns its parameters bind to,
    /// in declaration order, and the closure that builds the value.
    pub fn constructor<F>(mut self, columns: &[&str], build: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> Result<T> + Send + Sync + 'static,
    {
        self.constructor_count += 1;
        self.constructor = Some(RowConstructor {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            build: Arc::new(build),
        });
        self
    }

    /// Finalizes the binding. Marking more than one constructor is
    /// ambiguous and fails; marking none leaves a write-only binding whose
    /// reads fail with `NoConstructor`.
    pub fn build(self) -> Result<EntityBinding<T>> {
        if self.constructor_count > 1 {
            return Err(DbError::NoConstructor(format!(
                "{} constructors registered for {}; exactly one may be marked",
                self.constructor_count,
                std::any::type_name::<T>()
            )));
        }
        Ok(EntityBinding {
            fields: self.fields,
            constructor: self.constructor,
        })
    }
}

/// Per-type binding storage, keyed by `TypeId`. Built once at registration;
/// looked up on every `write_object`/`read_object`.
#[derive(Default)]
pub struct BindingRegistry {
    bindings: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, binding: EntityBinding<T>)
    where
        EntityBinding<T>: Send + Sync,
    {
        self.bindings.insert(TypeId::of::<T>(), Box::new(binding));
    }

    pub fn get<T: 'static>(&self) -> Option<&EntityBinding<T>> {
        self.bindings
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<EntityBinding<T>>())
    }
}
