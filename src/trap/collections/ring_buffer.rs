// fptrap/src/trap/collections/ring_buffer.rs

//! # Preallocated Ring Buffer
//!
//! A fixed-capacity circular buffer that overwrites the oldest element when
//! full. All storage is allocated by `with_capacity`; `push` only copies, so
//! it is usable from a signal handler once the buffer exists.

use core::fmt;

pub struct RingBuffer<T> {
    buffer: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
    overwritten: u64,
}

impl<T: Copy> RingBuffer<T> {
    /// # Panics
    /// Panics if the capacity is 0.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity cannot be zero");
        Self {
            buffer: vec![None; capacity],
            head: 0,
            tail: 0,
            count: 0,
            overwritten: 0,
        }
    }

    /// Appends an element, evicting the oldest one if the buffer is full.
    /// Returns `true` when an element was evicted.
    pub fn push(&mut self, item: T) -> bool {
        let capacity = self.capacity();
        self.buffer[self.head] = Some(item);
        self.head = (self.head + 1) % capacity;

        if self.count == capacity {
            self.tail = (self.tail + 1) % capacity;
            self.overwritten += 1;
            true
        } else {
            self.count += 1;
            false
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Total number of elements evicted since creation.
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            buffer: self,
            index: self.tail,
            remaining: self.count,
        }
    }

    /// Copies the contents out, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }
}

pub struct Iter<'a, T> {
    buffer: &'a RingBuffer<T>,
    index: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.buffer.buffer[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.buffer.len();
        self.remaining -= 1;
        item
    }
}

impl<T: fmt::Debug + Copy> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut ring = RingBuffer::with_capacity(4);
        for i in 0..3 {
            assert!(!ring.push(i));
        }
        assert_eq!(ring.to_vec(), vec![0, 1, 2]);
        assert_eq!(ring.overwritten(), 0);
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut ring = RingBuffer::with_capacity(3);
        for i in 0..3 {
            ring.push(i);
        }
        assert!(ring.push(3));
        assert!(ring.push(4));
        assert_eq!(ring.to_vec(), vec![2, 3, 4]);
        assert_eq!(ring.overwritten(), 2);
        assert_eq!(ring.iter().count(), ring.capacity());
    }

    #[test]
    fn empty_iterates_nothing() {
        let ring: RingBuffer<u8> = RingBuffer::with_capacity(1);
        assert_eq!(ring.iter().next(), None);
        assert_eq!(format!("{ring:?}"), "[]");
    }

    #[test]
    #[should_panic(expected = "capacity cannot be zero")]
    fn zero_capacity_panics() {
        let _ = RingBuffer::<u8>::with_capacity(0);
    }
}
