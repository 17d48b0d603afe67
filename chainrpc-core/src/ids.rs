use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Handle of a descriptor owned by a [`crate::types::TypeRegistry`].
///
/// Two handles are equal iff they denote the same descriptor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub fn new(value: u32) -> Self {
        TypeId(value)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId::new(value)
    }
}

pub struct TypeIdAllocator {
    next: AtomicU32,
}

impl TypeIdAllocator {
    pub fn new() -> Self {
        TypeIdAllocator {
            next: AtomicU32::new(0),
        }
    }

    pub fn allocate(&self) -> TypeId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        TypeId::new(id)
    }

    pub fn peek_next(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for TypeIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeIdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeIdAllocator")
            .field("next", &self.peek_next())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_id_creation_and_conversion() {
        let id = TypeId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(format!("{}", id), "TypeId(42)");

        let id: TypeId = 7u32.into();
        assert_eq!(id.as_u32(), 7);
    }

    #[test]
    fn test_allocator_monotonic() {
        let allocator = TypeIdAllocator::new();

        assert_eq!(allocator.allocate().as_u32(), 0);
        assert_eq!(allocator.allocate().as_u32(), 1);
        assert_eq!(allocator.allocate().as_u32(), 2);
        assert_eq!(allocator.peek_next(), 3);
    }

    #[test]
    fn test_allocator_thread_safety() {
        let allocator = Arc::new(TypeIdAllocator::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let alloc = Arc::clone(&allocator);
            handles.push(thread::spawn(move || {
                (0..100).map(|_| alloc.allocate().as_u32()).collect::<Vec<_>>()
            }));
        }

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all_ids.insert(id), "Duplicate ID found: {}", id);
            }
        }

        assert_eq!(all_ids.len(), 800);
    }

    #[test]
    fn test_serialization() {
        let id = TypeId::new(9);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "9");
        let back: TypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
