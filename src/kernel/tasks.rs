// Prefetch workers and the cache collector
//
// One OS thread per non-empty partition fetches and decodes its slots in
// increasing order and reports each outcome as a SliceEvent on a shared
// channel. A collector thread drains the channel into the SliceCache, so
// nothing polls: the renderer just reads the cache.
//
//   • worker `prefetch-k`  : owns partition k, calls SliceSource::load
//                            per slot; a failure is reported and the
//                            worker moves on to its next slot.
//
//   • collector            : blocks on the channel, upserts pixels,
//                            records failures, logs progress. Exits once
//                            every worker has hung up.
//
// There is no cancellation: a queued slot is always attempted.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use gray16_png::PixelBuffer;

use super::cache::SliceCache;
use super::scheduler::{SliceHandle, partition};
use crate::error::Result;

/// Fetch + decode for one slice. Workers and the render fallback share
/// the same implementation so both produce the same pixels.
pub trait SliceSource: Send + Sync {
    fn load(&self, handle: &SliceHandle) -> Result<PixelBuffer>;
}

#[derive(Debug)]
pub enum SliceEvent {
    Loaded {
        worker: usize,
        slot: u32,
        pixels: PixelBuffer,
    },
    Failed {
        worker: usize,
        slot: u32,
        reason: String,
    },
    Finished {
        worker: usize,
    },
}

// ═════════════════════════════════════════════════════════════════════════
// Workers
// ═════════════════════════════════════════════════════════════════════════

/// Start one thread per non-empty group in `plan`; group k runs as
/// worker k. Each thread drops its sender when done, so the receiving
/// end sees the channel close after the last worker finishes.
pub fn spawn_workers(
    plan: Vec<Vec<SliceHandle>>,
    source: Arc<dyn SliceSource>,
    events: Sender<SliceEvent>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut threads = Vec::with_capacity(plan.len());
    for (worker, group) in plan.into_iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let source = Arc::clone(&source);
        let events = events.clone();
        let handle = thread::Builder::new()
            .name(format!("prefetch-{worker}"))
            .spawn(move || run_worker(worker, group, source.as_ref(), &events))?;
        threads.push(handle);
    }
    Ok(threads)
}

fn run_worker(
    worker: usize,
    group: Vec<SliceHandle>,
    source: &dyn SliceSource,
    events: &Sender<SliceEvent>,
) {
    log::debug!("prefetch: worker {} has {} slot(s)", worker, group.len());
    for handle in group {
        let event = match source.load(&handle) {
            Ok(pixels) => SliceEvent::Loaded {
                worker,
                slot: handle.slot,
                pixels,
            },
            Err(e) => {
                log::warn!("prefetch: {} failed: {}", handle, e);
                SliceEvent::Failed {
                    worker,
                    slot: handle.slot,
                    reason: e.to_string(),
                }
            }
        };
        if events.send(event).is_err() {
            // nobody is listening any more
            return;
        }
    }
    let _ = events.send(SliceEvent::Finished { worker });
}

// ═════════════════════════════════════════════════════════════════════════
// Collector
// ═════════════════════════════════════════════════════════════════════════

/// What a finished prefetch run did, per slot and per worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub loaded: Vec<u32>,
    pub failed: Vec<(u32, String)>,
    /// Slots in the order each worker reported them, indexed by worker.
    pub emitted: Vec<Vec<u32>>,
    pub finished: Vec<usize>,
}

impl PrefetchReport {
    fn record(&mut self, worker: usize, slot: u32) {
        if self.emitted.len() <= worker {
            self.emitted.resize(worker + 1, Vec::new());
        }
        self.emitted[worker].push(slot);
    }
}

fn collect(events: Receiver<SliceEvent>, cache: &SliceCache) -> PrefetchReport {
    let mut report = PrefetchReport::default();
    for event in events {
        match event {
            SliceEvent::Loaded {
                worker,
                slot,
                pixels,
            } => {
                cache.insert(slot, pixels);
                report.loaded.push(slot);
                report.record(worker, slot);
                log::info!("prefetch: slot {} ready, {}", slot, cache.progress());
            }
            SliceEvent::Failed {
                worker,
                slot,
                reason,
            } => {
                cache.mark_failed(slot, reason.clone());
                report.failed.push((slot, reason));
                report.record(worker, slot);
            }
            SliceEvent::Finished { worker } => {
                log::debug!("prefetch: worker {} finished", worker);
                report.finished.push(worker);
            }
        }
    }
    report.loaded.sort_unstable();
    report.failed.sort_by_key(|(slot, _)| *slot);
    report
}

/// A running prefetch: workers plus the collector feeding the cache.
pub struct Prefetcher {
    cache: Arc<SliceCache>,
    workers: Vec<JoinHandle<()>>,
    collector: JoinHandle<PrefetchReport>,
}

impl Prefetcher {
    pub fn start(
        handles: &[SliceHandle],
        workers: usize,
        source: Arc<dyn SliceSource>,
        cache: Arc<SliceCache>,
    ) -> Result<Self> {
        let plan = partition(handles, workers);
        log::info!(
            "prefetch: {} slice(s) across {} worker(s)",
            handles.len(),
            plan.iter().filter(|g| !g.is_empty()).count()
        );

        let (tx, rx) = mpsc::channel();
        let collector = {
            let cache = Arc::clone(&cache);
            thread::Builder::new()
                .name("prefetch-collector".into())
                .spawn(move || collect(rx, &cache))?
        };
        // our own sender goes out of scope here; only workers hold one
        let workers = spawn_workers(plan, source, tx)?;

        Ok(Self {
            cache,
            workers,
            collector,
        })
    }

    pub fn cache(&self) -> &Arc<SliceCache> {
        &self.cache
    }

    /// Wait for every worker and the collector.
    pub fn join(self) -> PrefetchReport {
        for worker in self.workers {
            if worker.join().is_err() {
                log::error!("prefetch: a worker panicked");
            }
        }
        self.collector.join().unwrap_or_else(|_| {
            log::error!("prefetch: collector panicked");
            PrefetchReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use gray16_png::ImageGeometry;
    use std::time::Duration;

    // slot value in every sample; slot 3 always fails
    struct Synthetic;

    impl SliceSource for Synthetic {
        fn load(&self, handle: &SliceHandle) -> Result<PixelBuffer> {
            // uneven latency so partitions interleave
            thread::sleep(Duration::from_millis(u64::from(handle.slot % 3) * 5));
            if handle.slot == 3 {
                return Err(Error::Fetch {
                    url: handle.instance.clone(),
                    reason: "404 Not Found".into(),
                });
            }
            Ok(PixelBuffer::new(
                ImageGeometry::new(2, 2),
                vec![handle.slot as u16; 4],
            )?)
        }
    }

    fn handles(n: u32) -> Vec<SliceHandle> {
        (1..=n).map(|s| SliceHandle::new(format!("i{s}"), s)).collect()
    }

    #[test]
    fn workers_emit_in_increasing_order() {
        let cache = Arc::new(SliceCache::new(8));
        let run = Prefetcher::start(&handles(8), 4, Arc::new(Synthetic), cache.clone()).unwrap();
        let report = run.join();

        for (worker, slots) in report.emitted.iter().enumerate() {
            assert!(slots.windows(2).all(|w| w[0] < w[1]), "worker {worker}");
            assert!(slots.iter().all(|s| *s as usize % 4 == worker));
        }
        let mut all: Vec<u32> = report.emitted.iter().flatten().copied().collect();
        all.sort();
        assert_eq!(all, (1..=8).collect::<Vec<_>>());
        assert_eq!(report.finished.len(), 4);
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let cache = Arc::new(SliceCache::new(8));
        let report = Prefetcher::start(&handles(8), 4, Arc::new(Synthetic), cache.clone())
            .unwrap()
            .join();

        assert_eq!(report.loaded, vec![1, 2, 4, 5, 6, 7, 8]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 3);
        // slot 7 shares worker 3 with slot 3 and still loads
        assert_eq!(cache.get(7).unwrap().samples(), &[7, 7, 7, 7]);
        assert!(cache.get(3).is_none());
        assert!(cache.failure(3).unwrap().contains("404"));
        assert_eq!(cache.highest_loaded(), Some(8));
    }

    #[test]
    fn empty_groups_spawn_nothing() {
        let (tx, rx) = mpsc::channel();
        let plan = partition(&[SliceHandle::new("only", 5)], 4);
        let threads = spawn_workers(plan, Arc::new(Synthetic), tx).unwrap();
        assert_eq!(threads.len(), 1);
        let events: Vec<SliceEvent> = rx.iter().collect();
        assert!(matches!(
            events[0],
            SliceEvent::Loaded {
                worker: 1,
                slot: 5,
                ..
            }
        ));
        assert!(matches!(events[1], SliceEvent::Finished { worker: 1 }));
    }
}
