use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The collector's barrier-related flags, as seen by one barrier call.
///
/// The barrier never changes these. The collector controller owns a
/// [`GlobalBarrierState`] and every barrier call works from a snapshot of it,
/// so the barrier's decisions are a function of the write and this value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBarrierState {
    /// The collector is marking concurrently and needs to see pointer writes.
    pub needed: bool,
    /// Foreign pointer checks are enabled. These need the barrier even when
    /// the collector does not.
    pub cgo: bool,
    /// The collector is in checkmark verification mode. Flushes shade every
    /// buffered address directly.
    pub checkmark: bool,
    /// When set, a buffer whose debug generation equals this value flushes on
    /// every barrier. Used to chase lost-barrier bugs.
    pub debug_pause_gen: Option<u32>,
}

impl WriteBarrierState {
    /// Whether pointer writes must go through the barrier at all.
    #[inline(always)]
    pub fn enabled(&self) -> bool {
        self.needed || self.cgo
    }

    /// Whether a buffer with the given debug generation must flush after
    /// every barrier.
    pub fn force_eager_flush(&self, buffer_debug_gen: u32) -> bool {
        self.cgo || self.debug_pause_gen == Some(buffer_debug_gen)
    }
}

/// The process-wide barrier flags. Written by the collector controller when it
/// changes phase, read by every barrier call.
#[derive(Default)]
pub struct GlobalBarrierState {
    needed: AtomicBool,
    cgo: AtomicBool,
    checkmark: AtomicBool,
    debug_pause_gen: AtomicU32,
    debug_pause_gen_set: AtomicBool,
}

impl GlobalBarrierState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn snapshot(&self) -> WriteBarrierState {
        WriteBarrierState {
            needed: self.needed.load(Ordering::Acquire),
            cgo: self.cgo.load(Ordering::Relaxed),
            checkmark: self.checkmark.load(Ordering::Relaxed),
            debug_pause_gen: if self.debug_pause_gen_set.load(Ordering::Relaxed) {
                Some(self.debug_pause_gen.load(Ordering::Relaxed))
            } else {
                None
            },
        }
    }

    pub fn set_needed(&self, needed: bool) {
        debug!("Write barrier needed: {}", needed);
        self.needed.store(needed, Ordering::Release);
    }

    pub fn set_cgo(&self, cgo: bool) {
        debug!("Foreign pointer checks: {}", cgo);
        self.cgo.store(cgo, Ordering::Release);
    }

    pub fn set_checkmark(&self, checkmark: bool) {
        debug!("Checkmark mode: {}", checkmark);
        self.checkmark.store(checkmark, Ordering::Release);
    }

    pub fn set_debug_pause_gen(&self, gen: Option<u32>) {
        match gen {
            Some(gen) => {
                self.debug_pause_gen.store(gen, Ordering::Relaxed);
                self.debug_pause_gen_set.store(true, Ordering::Release);
            }
            None => self.debug_pause_gen_set.store(false, Ordering::Release),
        }
    }
}
