//! Entity codecs: converting records to flat rows and back.

use core::marker::PhantomData;

use crate::error::Result;
use crate::row::Row;
use crate::schema::Field;

/// A record type with a statically declared field list.
///
/// Usually implemented with the [`entity!`](crate::entity) macro.
pub trait Entity: Sized + Send + Sync {
    /// Name of the identity field.
    const KEY: &'static str = "id";

    fn fields() -> &'static [Field];

    /// Dumps every declared field, keyed by field name.
    fn dump(&self) -> Row;

    fn load(row: Row) -> Result<Self>;
}

/// Per-repository conversion between records and field-keyed rows.
///
/// `load(dump(e))` must reproduce `e` for every record the application can build.
pub trait Codec<E>: Send + Sync {
    fn fields(&self) -> &'static [Field];

    fn key(&self) -> &'static str;

    fn dump(&self, entity: &E) -> Result<Row>;

    fn load(&self, row: Row) -> Result<E>;
}

/// The default codec, delegating to the entity's own [`Entity`] impl.
pub struct EntityCodec<E>(PhantomData<fn() -> E>);

impl<E> EntityCodec<E> {
    #[inline]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for EntityCodec<E> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EntityCodec<E> {
    #[inline]
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> core::fmt::Debug for EntityCodec<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("EntityCodec")
    }
}

impl<E: Entity> Codec<E> for EntityCodec<E> {
    #[inline]
    fn fields(&self) -> &'static [Field] {
        E::fields()
    }

    #[inline]
    fn key(&self) -> &'static str {
        E::KEY
    }

    #[inline]
    fn dump(&self, entity: &E) -> Result<Row> {
        Ok(entity.dump())
    }

    #[inline]
    fn load(&self, row: Row) -> Result<E> {
        E::load(row)
    }
}

/// Implements [`Entity`] for a struct whose fields all convert to and from
/// [`Value`](crate::Value).
///
/// ```
/// #[derive(Debug, Clone, PartialEq)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
///
/// quarry_core::entity!(User { id, name, email as "email_address" });
///
/// use quarry_core::Entity;
/// assert_eq!(User::fields()[2].column, "email_address");
/// ```
///
/// The identity field defaults to `id`; override it with `key = field`:
///
/// ```ignore
/// quarry_core::entity!(Session { token, user_id } key = token);
/// ```
#[macro_export]
macro_rules! entity {
    ($ty:ident { $($field:ident $(as $column:literal)?),+ $(,)? }) => {
        $crate::entity!($ty { $($field $(as $column)?),+ } key = id);
    };
    ($ty:ident { $($field:ident $(as $column:literal)?),+ $(,)? } key = $key:ident) => {
        impl $crate::Entity for $ty {
            const KEY: &'static str = stringify!($key);

            fn fields() -> &'static [$crate::Field] {
                const FIELDS: &[$crate::Field] = &[
                    $($crate::Field::new(stringify!($field)) $(.column($column))?),+
                ];
                FIELDS
            }

            fn dump(&self) -> $crate::Row {
                let mut row = $crate::Row::with_capacity(Self::fields().len());
                $(
                    row.insert(
                        stringify!($field),
                        $crate::Value::from(::core::clone::Clone::clone(&self.$field)),
                    );
                )+
                row
            }

            fn load(mut row: $crate::Row) -> $crate::Result<Self> {
                Ok(Self {
                    $($field: row.take(stringify!($field))?,)+
                })
            }
        }
    };
}
