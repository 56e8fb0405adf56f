use crate::util::constants::BITS_IN_ADDRESS;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One mark bit per element of a span, packed into words so that marking is
/// a single `fetch_or`.
///
/// Marking is the deduplication point for greying: several workers may flush
/// buffers that name the same object at the same time, and exactly one of
/// them observes the bit flipping from 0 to 1.
pub struct MarkBitmap {
    words: Box<[AtomicUsize]>,
    bits: usize,
}

impl MarkBitmap {
    pub fn new(bits: usize) -> Self {
        let nwords = bits.div_ceil(BITS_IN_ADDRESS);
        MarkBitmap {
            words: (0..nwords).map(|_| AtomicUsize::new(0)).collect(),
            bits,
        }
    }

    /// The number of mark bits.
    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[inline(always)]
    fn locate(&self, index: usize) -> (&AtomicUsize, usize) {
        // The last word has padding bits past `bits`. Setting one would report
        // an object that does not exist as newly marked.
        if index >= self.bits {
            crate::fatal_error!("mark bit {} out of range {}", index, self.bits);
        }
        (
            &self.words[index / BITS_IN_ADDRESS],
            1usize << (index % BITS_IN_ADDRESS),
        )
    }

    /// Set the mark bit for the element at `index`. Returns `true` if this call
    /// set the bit, and `false` if it was already set.
    #[inline(always)]
    pub fn test_and_set(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        // Skip the read-modify-write if the bit is already visible. Most
        // entries that reach this point name objects that are already marked.
        if word.load(Ordering::Relaxed) & mask != 0 {
            return false;
        }
        word.fetch_or(mask, Ordering::AcqRel) & mask == 0
    }

    /// Test if the mark bit for the element at `index` is set.
    #[inline(always)]
    pub fn is_marked(&self, index: usize) -> bool {
        let (word, mask) = self.locate(index);
        word.load(Ordering::Acquire) & mask != 0
    }

    /// Set the mark bit without reporting whether it was set before.
    pub fn mark(&self, index: usize) {
        let (word, mask) = self.locate(index);
        word.fetch_or(mask, Ordering::AcqRel);
    }

    /// Clear all the mark bits. Only call this when no worker is flushing,
    /// i.e. between collection cycles.
    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Count the set bits.
    pub fn count_marked(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_and_set_once() {
        let bitmap = MarkBitmap::new(100);
        assert!(!bitmap.is_marked(70));
        assert!(bitmap.test_and_set(70));
        assert!(bitmap.is_marked(70));
        assert!(!bitmap.test_and_set(70));
        assert!(!bitmap.is_marked(69));
        assert!(!bitmap.is_marked(71));
        assert_eq!(bitmap.count_marked(), 1);
    }

    #[test]
    #[should_panic(expected = "mark bit 10 out of range 3")]
    fn out_of_range_index_in_padding_is_fatal() {
        let bitmap = MarkBitmap::new(3);
        bitmap.test_and_set(10);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_past_last_word_is_fatal() {
        let bitmap = MarkBitmap::new(BITS_IN_ADDRESS);
        bitmap.is_marked(BITS_IN_ADDRESS);
    }

    #[test]
    fn clear() {
        let bitmap = MarkBitmap::new(BITS_IN_ADDRESS * 2);
        bitmap.mark(0);
        bitmap.mark(BITS_IN_ADDRESS * 2 - 1);
        assert_eq!(bitmap.count_marked(), 2);
        bitmap.clear();
        assert_eq!(bitmap.count_marked(), 0);
    }

    #[test]
    fn concurrent_test_and_set_wins_once() {
        const THREADS: usize = 8;
        const BITS: usize = 512;
        let bitmap = Arc::new(MarkBitmap::new(BITS));
        let wins = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let bitmap = bitmap.clone();
                let wins = wins.clone();
                std::thread::spawn(move || {
                    for i in 0..BITS {
                        if bitmap.test_and_set(i) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(wins.load(Ordering::Relaxed), BITS);
        assert_eq!(bitmap.count_marked(), BITS);
    }
}
