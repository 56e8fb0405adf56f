use crate::policy::span::Span;
use crate::util::Address;
use crate::vm::ObjectLookup;

/// Maps addresses to the spans that contain them.
///
/// Spans are registered while the map is being built and the map is immutable
/// once it is shared, so lookups from flushing workers need no synchronization.
#[derive(Default)]
pub struct SpanMap {
    /// Sorted by start address, non-overlapping.
    spans: Vec<Span>,
}

impl SpanMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a span. Panics if it overlaps a span already in the map.
    pub fn insert(&mut self, span: Span) {
        let pos = self.spans.partition_point(|s| s.start() < span.start());
        let overlaps_prev = pos > 0 && self.spans[pos - 1].limit() > span.start();
        let overlaps_next = pos < self.spans.len() && span.limit() > self.spans[pos].start();
        assert!(
            !overlaps_prev && !overlaps_next,
            "{:?} overlaps an existing span",
            span
        );
        trace!("SpanMap: insert {:?}", span);
        self.spans.insert(pos, span);
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Clear the mark bits of every span, for the start of a new cycle.
    pub fn reset_marks(&self) {
        for span in self.spans.iter() {
            span.reset_marks();
        }
    }
}

impl ObjectLookup for SpanMap {
    fn span_of(&self, addr: Address) -> Option<&Span> {
        // The last span that starts at or below addr.
        let pos = self.spans.partition_point(|s| s.start() <= addr);
        if pos == 0 {
            return None;
        }
        let span = &self.spans[pos - 1];
        if span.contains(addr) {
            Some(span)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: usize) -> Address {
        unsafe { Address::from_usize(raw) }
    }

    fn map() -> SpanMap {
        let mut map = SpanMap::new();
        map.insert(Span::new(addr(0x20000), 64, 16, false));
        map.insert(Span::new(addr(0x10000), 32, 8, true));
        map
    }

    #[test]
    fn resolves_interior_pointers() {
        let map = map();
        let found = map.find_object(addr(0x20000 + 64 * 5 + 8)).unwrap();
        assert_eq!(found.index, 5);
        assert_eq!(found.object.to_raw_address(), addr(0x20000 + 64 * 5));
        assert!(!found.span.is_noscan());

        let found = map.find_object(addr(0x10000)).unwrap();
        assert_eq!(found.index, 0);
        assert!(found.span.is_noscan());
    }

    #[test]
    fn misses() {
        let map = map();
        assert!(map.find_object(addr(0x8000)).is_none());
        // Between the two spans.
        assert!(map.find_object(addr(0x10000 + 32 * 8)).is_none());
        // Just past the last span.
        assert!(map.find_object(addr(0x20000 + 64 * 16)).is_none());
    }

    #[test]
    #[should_panic(expected = "overlaps an existing span")]
    fn overlapping_insert() {
        let mut map = map();
        map.insert(Span::new(addr(0x10000 + 32), 32, 2, false));
    }
}
