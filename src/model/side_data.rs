//! Write-once, type-keyed auxiliary storage attached to a declaration.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// One payload per Rust type. Inserting a type twice is refused.
#[derive(Default)]
pub struct SideData {
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl SideData {
    /// Store `value`. Returns the payload type name when a value of that type is already present.
    pub fn insert<T: Any>(&mut self, value: T) -> Result<(), &'static str> {
        let key = TypeId::of::<T>();
        if self.slots.contains_key(&key) {
            return Err(type_name::<T>());
        }
        self.slots.insert(key, Box::new(value));
        Ok(())
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<T>())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for SideData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideData").field("slots", &self.slots.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn test_missing_kind_is_none() {
        let data = SideData::default();
        assert!(data.get::<Marker>().is_none());
        assert!(data.is_empty());
    }

    #[test]
    fn test_second_insert_is_refused() {
        let mut data = SideData::default();
        data.insert(Marker(1)).unwrap();
        let err = data.insert(Marker(2)).unwrap_err();
        assert!(err.ends_with("Marker"), "error should name the payload type: {err}");
        assert_eq!(data.get::<Marker>(), Some(&Marker(1)), "first value must survive");
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut data = SideData::default();
        data.insert(Marker(7)).unwrap();
        data.insert(String::from("binding")).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.get::<String>().map(String::as_str), Some("binding"));
        assert!(data.contains::<Marker>());
    }
}
