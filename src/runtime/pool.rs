use parking_lot::Mutex;
use tracing::trace;

/// State that can be returned to a [`Pool`] and handed out again.
pub trait Poolable: Default {
    /// Clears everything a previous user left behind while keeping allocations.
    fn reset(&mut self);
}

/// Bounded free-list of boxed, reusable objects.
///
/// Objects are reset when they come back, so taking one out is a pop. When the
/// list is full, released objects are dropped instead of retained.
#[derive(Debug)]
pub struct Pool<T> {
    free: Mutex<Vec<Box<T>>>,
    capacity: usize,
}

impl<T: Poolable> Pool<T> {
    /// Creates an empty pool retaining at most `capacity` objects.
    pub const fn new(capacity: usize) -> Self {
        Self {
            free: parking_lot::const_mutex(Vec::new()),
            capacity,
        }
    }

    /// Takes an object out, creating a fresh one if the pool is empty.
    pub fn acquire(&self) -> Box<T> {
        let popped = self.free.lock().pop();
        popped.unwrap_or_else(|| {
            trace!(type_name = std::any::type_name::<T>(), "pool empty, allocating");
            Box::default()
        })
    }

    /// Resets `item` and returns it to the free-list.
    pub fn release(&self, mut item: Box<T>) {
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(item);
        } else {
            trace!(type_name = std::any::type_name::<T>(), "pool full, dropping");
        }
    }

    /// Number of idle objects.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}
