//! Sample-variable registry and the asynchronous monitor that drains it
//! to a binary trace file on a fixed delay.
//!
//! The background thread never touches simulation state directly — it
//! only calls the read closures registered in the [`SampleRegistry`],
//! the same capability-record pattern used for FPU client callbacks.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    U32,
    U64,
    F32,
    F64,
}

impl TypeTag {
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U32 | Self::F32 => 4,
            Self::U64 | Self::F64 => 8,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

struct Entry {
    name: String,
    offset: usize,
    size: usize,
    tag: TypeTag,
    read: Box<dyn Fn() -> Vec<u8> + Send + Sync>,
}

/// Name to `(offset, size, type)` table, built once as every component
/// registers the variables it wants sampled.
pub struct SampleRegistry {
    entries: Vec<Entry>,
    total_size: usize,
}

impl Default for SampleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new(), total_size: 0 }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        tag: TypeTag,
        read: impl Fn() -> Vec<u8> + Send + Sync + 'static,
    ) {
        let offset = self.total_size;
        let size = tag.size();
        self.entries.push(Entry { name: name.into(), offset, size, tag, read: Box::new(read) });
        self.total_size += size;
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.total_size
    }

    pub fn sample_to_buffer(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.total_size);
        for entry in &self.entries {
            buf.extend((entry.read)());
        }
        buf
    }

    /// Writes the metadata file: one `name offset size type` line per
    /// variable, followed by a `tv_sizes:` header recording the host's
    /// timestamp layout so an offline reader can parse the trace file
    /// without knowing the writer's platform.
    pub fn write_metadata(&self, out: &mut dyn Write) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(out, "{} {} {} {}", entry.name, entry.offset, entry.size, entry.tag.label())?;
        }
        let tv_sec = std::mem::size_of::<i64>();
        let tv_usec = std::mem::size_of::<i64>();
        writeln!(out, "# tv_sizes: {tv_sec} {tv_usec} {}", tv_sec + tv_usec)?;
        Ok(())
    }
}

/// Wraps a registry for the monitor thread; a thin layer today but the
/// seam where per-sample post-processing (scaling, filtering) would go.
pub struct Sampler {
    registry: SampleRegistry,
}

impl Sampler {
    pub fn new(registry: SampleRegistry) -> Self {
        Self { registry }
    }

    pub fn buffer_size(&self) -> usize {
        self.registry.buffer_size()
    }

    pub fn sample_to_buffer(&self) -> Vec<u8> {
        self.registry.sample_to_buffer()
    }

    pub fn write_metadata(&self, out: &mut dyn Write) -> io::Result<()> {
        self.registry.write_metadata(out)
    }
}

/// Encodes a timestamp as fixed-width `(tv_sec, tv_usec)` fields, matching
/// the sizes `SampleRegistry::write_metadata` declares in its `tv_sizes:`
/// header.
fn timeval_bytes(now: SystemTime) -> [u8; 16] {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let tv_sec = since_epoch.as_secs() as i64;
    let tv_usec = i64::from(since_epoch.subsec_micros());
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&tv_sec.to_le_bytes());
    buf[8..].copy_from_slice(&tv_usec.to_le_bytes());
    buf
}

struct RunGate {
    running: Mutex<bool>,
    condvar: Condvar,
}

/// Background sample writer. Modelled after the original's run-lock
/// contract (`start()`/`stop()` gate the loop, `enabled = false` plus a
/// wake and `join()` shuts it down) but built on a `Condvar` instead of
/// manually unlocking a `Mutex` outside its owning guard, which Rust's
/// `Mutex` doesn't allow.
pub struct Monitor {
    enabled: Arc<AtomicBool>,
    gate: Arc<RunGate>,
    thread: Option<JoinHandle<()>>,
    quiet: bool,
}

impl Monitor {
    /// Spawns the writer thread if `outfile` is `Some`; with `None` only
    /// the metadata was requested and the monitor stays permanently
    /// stopped, matching the original's early return.
    pub fn spawn(
        sampler: Arc<Sampler>,
        mut outfile: Option<std::fs::File>,
        delay: Duration,
        quiet: bool,
    ) -> Self {
        let enabled = Arc::new(AtomicBool::new(true));
        let gate = Arc::new(RunGate { running: Mutex::new(false), condvar: Condvar::new() });

        let thread = outfile.take().map(|mut file| {
            let enabled = Arc::clone(&enabled);
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                while enabled.load(Ordering::SeqCst) {
                    let guard = gate.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    let _guard = gate
                        .condvar
                        .wait_while(guard, |running| !*running && enabled.load(Ordering::SeqCst))
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    if !enabled.load(Ordering::SeqCst) {
                        break;
                    }
                    std::thread::sleep(delay);
                    let tv_begin = timeval_bytes(SystemTime::now());
                    let payload = sampler.sample_to_buffer();
                    let tv_end = timeval_bytes(SystemTime::now());
                    let _ = file.write_all(&tv_begin);
                    let _ = file.write_all(&payload);
                    let _ = file.write_all(&tv_end);
                }
            })
        });

        Self { enabled, gate, thread, quiet }
    }

    pub fn start(&self) {
        if !self.quiet {
            log::info!("starting monitor");
        }
        *self.gate.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = true;
        self.gate.condvar.notify_all();
    }

    pub fn stop(&self) {
        if !self.quiet {
            log::info!("stopping monitor");
        }
        *self.gate.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = false;
    }

    pub fn is_running(&self) -> bool {
        *self.gate.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.gate.condvar.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn registry_assigns_sequential_offsets() {
        let mut reg = SampleRegistry::new();
        reg.register("kernel.cycle", TypeTag::U64, || 7u64.to_le_bytes().to_vec());
        reg.register("fpu0.queued", TypeTag::U32, || 3u32.to_le_bytes().to_vec());
        assert_eq!(reg.buffer_size(), 12);

        let mut out = Vec::new();
        reg.write_metadata(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("kernel.cycle 0 8 u64"));
        assert!(text.contains("fpu0.queued 8 4 u32"));
        assert!(text.contains("tv_sizes:"));
    }

    #[test]
    fn sample_to_buffer_reads_through_every_registered_closure() {
        let counter = Arc::new(AtomicU32::new(5));
        let mut reg = SampleRegistry::new();
        let c = Arc::clone(&counter);
        reg.register("x", TypeTag::U32, move || c.load(Ordering::SeqCst).to_le_bytes().to_vec());
        let sampler = Sampler::new(reg);
        assert_eq!(sampler.sample_to_buffer(), 5u32.to_le_bytes().to_vec());
    }

    #[test]
    fn monitor_without_outfile_never_spawns_a_thread() {
        let sampler = Arc::new(Sampler::new(SampleRegistry::new()));
        let monitor = Monitor::spawn(sampler, None, Duration::from_millis(1), true);
        assert!(monitor.thread.is_none());
        monitor.start();
        monitor.stop();
    }

    #[test]
    fn timeval_bytes_round_trips_seconds_and_microseconds() {
        let now = UNIX_EPOCH + Duration::new(1_700_000_000, 250_000_000);
        let bytes = timeval_bytes(now);
        let tv_sec = i64::from_le_bytes(bytes[..8].try_into().unwrap());
        let tv_usec = i64::from_le_bytes(bytes[8..].try_into().unwrap());
        assert_eq!(tv_sec, 1_700_000_000);
        assert_eq!(tv_usec, 250_000);
    }

    #[test]
    fn monitor_writes_timestamped_records_around_the_payload() {
        let mut path = std::env::temp_dir();
        path.push(format!("mgsim-monitor-test-{:?}.bin", std::thread::current().id()));
        let file = std::fs::File::create(&path).unwrap();

        let counter = Arc::new(AtomicU32::new(11));
        let mut reg = SampleRegistry::new();
        let c = Arc::clone(&counter);
        reg.register("x", TypeTag::U32, move || c.load(Ordering::SeqCst).to_le_bytes().to_vec());
        let sampler = Arc::new(Sampler::new(reg));
        let payload_size = sampler.buffer_size();

        let monitor = Monitor::spawn(Arc::clone(&sampler), Some(file), Duration::from_millis(5), true);
        monitor.start();
        std::thread::sleep(Duration::from_millis(50));
        monitor.stop();
        drop(monitor);

        let written = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let record_size = 16 + payload_size + 16;
        assert!(!written.is_empty(), "monitor should have written at least one record");
        assert_eq!(written.len() % record_size, 0, "each record is tv_begin + payload + tv_end");
        let payload = &written[16..16 + payload_size];
        assert_eq!(u32::from_le_bytes(payload.try_into().unwrap()), 11);
    }
}
