use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::HydrateError;

/// Default-then-override merge for records read from storage.
///
/// The stored object is laid over the serialized default shape one key deep, so
/// records saved before a field existed pick up that field's default. `null`
/// values are treated as absent.
pub trait Hydrate: Default + Serialize + DeserializeOwned {
    /// Record name used in error messages
    const KIND: &'static str;

    fn hydrate(stored: Value) -> Result<Self, HydrateError> {
        merge_over(Self::default(), stored, Self::KIND)
    }

    /// Hydrate every element of a stored array, failing on the first bad element
    fn hydrate_list(stored: Value) -> Result<Vec<Self>, HydrateError> {
        match stored {
            Value::Array(items) => items.into_iter().map(Self::hydrate).collect(),
            _ => Err(HydrateError::NotAnObject(Self::KIND)),
        }
    }
}

/// Lay `stored` over the serialized `default` and deserialize the result
pub fn merge_over<T>(default: T, stored: Value, kind: &'static str) -> Result<T, HydrateError>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(stored) = stored else {
        return Err(HydrateError::NotAnObject(kind));
    };

    let mut base = match serde_json::to_value(default)? {
        Value::Object(map) => map,
        _ => return Err(HydrateError::NotAnObject(kind)),
    };

    for (key, value) in stored {
        if !value.is_null() {
            base.insert(key, value);
        }
    }

    Ok(serde_json::from_value(Value::Object(base))?)
}

/// Pull a nested list out of `stored` and hydrate its elements separately
pub fn take_list<T: Hydrate>(stored: &mut Value, key: &str) -> Result<Option<Vec<T>>, HydrateError> {
    match stored.as_object_mut().and_then(|o| o.remove(key)) {
        Some(Value::Null) | None => Ok(None),
        Some(list) => T::hydrate_list(list).map(Some),
    }
}
