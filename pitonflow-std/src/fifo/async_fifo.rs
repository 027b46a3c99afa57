//! Asynchronous FIFO for clock-domain crossing.

use pitonflow::*;

use crate::*;

/// Asynchronous FIFO.
///
/// The write side and the read side belong to different clock domains. Each side keeps its pointer in binary and
/// gray code, and sees the other side's gray pointer only through a [`Synchronizer`]. Hence a written word becomes
/// visible to the reader only after the synchronizer latency, and a freed slot becomes visible to the writer likewise.
/// Both views are stale in the safe direction: the writer may see the FIFO fuller, and the reader emptier, than it is.
///
/// Pointers count modulo `2 * slots`, so that equal pointers mean empty and pointers `slots` apart mean full.
#[derive(Debug)]
pub struct AsyncFifo<T> {
    mem: Vec<Option<T>>,
    sync_stages: usize,

    wptr: usize,
    wptr_gray: usize,
    rptr_gray_sync: Synchronizer<usize>,

    rptr: usize,
    rptr_gray: usize,
    wptr_gray_sync: Synchronizer<usize>,
}

impl<T> AsyncFifo<T> {
    /// Creates a new asynchronous FIFO.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is not a power of two.
    pub fn new(slots: usize, sync_stages: usize) -> Self {
        assert!(slots.is_power_of_two(), "asynchronous FIFO depth {} is not a power of two", slots);
        Self {
            mem: (0..slots).map(|_| None).collect(),
            sync_stages,
            wptr: 0,
            wptr_gray: 0,
            rptr_gray_sync: Synchronizer::new(sync_stages, 0),
            rptr: 0,
            rptr_gray: 0,
            wptr_gray_sync: Synchronizer::new(sync_stages, 0),
        }
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize { self.mem.len() }

    /// Returns the number of synchronizer stages.
    pub fn sync_stages(&self) -> usize { self.sync_stages }

    fn ptr_mask(&self) -> usize { 2 * self.mem.len() - 1 }

    /// Returns the number of occupied slots as seen by the writer.
    pub fn write_len(&self) -> usize {
        let rptr = gray_to_bin(*self.rptr_gray_sync.output());
        self.wptr.wrapping_sub(rptr) & self.ptr_mask()
    }

    /// Returns the number of occupied slots as seen by the reader.
    pub fn read_len(&self) -> usize {
        let wptr = gray_to_bin(*self.wptr_gray_sync.output());
        wptr.wrapping_sub(self.rptr) & self.ptr_mask()
    }

    /// Returns `true` if full as seen by the writer.
    pub fn is_full(&self) -> bool { self.write_len() == self.capacity() }

    /// Returns `true` if empty as seen by the reader.
    pub fn is_empty(&self) -> bool { self.read_len() == 0 }

    /// Returns the head as seen by the reader.
    pub fn head(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.mem[self.rptr % self.capacity()].as_ref()
    }

    /// Iterates over every word written and not yet read, regardless of what either side sees.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let len = self.wptr.wrapping_sub(self.rptr) & self.ptr_mask();
        (0..len).filter_map(move |i| self.mem[(self.rptr + i) % self.capacity()].as_ref())
    }

    /// Advances the write domain by one tick, writing `data` if given.
    ///
    /// Returns `Err(data)` if the FIFO is full as seen by the writer.
    pub fn write_tick(&mut self, data: Option<T>) -> Result<(), T> {
        let full = self.is_full();
        let result = match data {
            Some(data) if full => Err(data),
            Some(data) => {
                let index = self.wptr % self.capacity();
                self.mem[index] = Some(data);
                self.wptr = (self.wptr + 1) & self.ptr_mask();
                Ok(())
            }
            None => Ok(()),
        };
        let _ = self.rptr_gray_sync.tick(self.rptr_gray);
        self.wptr_gray = bin_to_gray(self.wptr);
        result
    }

    /// Advances the read domain by one tick, reading the head if `pop`.
    pub fn read_tick(&mut self, pop: bool) -> Option<T> {
        let data = if pop && !self.is_empty() {
            let index = self.rptr % self.capacity();
            self.rptr = (self.rptr + 1) & self.ptr_mask();
            self.mem[index].take()
        } else {
            None
        };
        let _ = self.wptr_gray_sync.tick(self.wptr_gray);
        self.rptr_gray = bin_to_gray(self.rptr);
        data
    }

    /// Resets both domains, dropping every word.
    pub fn reset(&mut self) {
        let dropped = self.iter().count();
        if dropped > 0 {
            log::trace!("async fifo: reset dropped {} words", dropped);
        }
        self.mem.iter_mut().for_each(|slot| *slot = None);
        self.wptr = 0;
        self.wptr_gray = 0;
        self.rptr_gray_sync.reset(0);
        self.rptr = 0;
        self.rptr_gray = 0;
        self.wptr_gray_sync.reset(0);
    }
}
