use std::ops::{Deref, DerefMut};

/// Pads `T` out to a 128-byte boundary so that two instances never share a
/// cache line. Used for the hot head/tail indices of the ring and stack
/// structures, where false sharing between a producer's tail write and a
/// consumer's head write would otherwise dominate latency.
#[repr(align(128))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        Self(value)
    }
}
