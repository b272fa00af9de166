use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use scanprogress::{
    Chunk, ChunkError, CommonSourceUnit, JobId, JobProgress, JobProgressHook, JobRef, LruCache,
    NoopHook, ScanError, SourceId, UnitHook, UnitHookSettings, UnitMetrics,
};

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[derive(Clone, Default)]
struct Logs(Arc<Mutex<Vec<u8>>>);

impl io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Logs {
    fn dropped_metrics(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| {
                line.contains("ERROR") && line.contains("dropping unit metric")
            })
            .map(String::from)
            .collect()
    }
}

fn capture_logs<T>(scenario: impl FnOnce() -> T) -> (T, Logs) {
    let logs = Logs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let output = tracing::subscriber::with_default(subscriber, scenario);

    (output, logs)
}

fn unit_id(metrics: &UnitMetrics) -> Option<&str> {
    metrics.unit().map(|unit| unit.source_unit_id())
}

fn progress_with(hook: &Arc<UnitHook>) -> JobProgress {
    let hooks: Vec<Arc<dyn JobProgressHook>> = vec![hook.clone(), Arc::new(NoopHook)];

    JobProgress::new(SourceId(7), JobId(42), hooks)
}

#[test]
fn unit_is_reported_once_after_it_finishes() {
    let hook = Arc::new(UnitHook::new());
    let progress = progress_with(&hook);
    let unit = CommonSourceUnit::shared("u1");

    progress.start(at(0));
    progress.report_unit(&unit);
    progress.start_unit_chunking(Some(&unit), at(0));
    progress.report_chunk(Some(&unit), &Chunk::new(progress.job_ref(), [b'a'; 100]));
    progress.report_chunk(Some(&unit), &Chunk::new(progress.job_ref(), [b'b'; 50]));
    progress.end_unit_chunking(Some(&unit), at(1));

    let metrics = hook.unit_metrics();
    assert_eq!(metrics.len(), 1);

    let record = &metrics[0];
    assert_eq!(unit_id(record), Some("u1"));
    assert_eq!(record.parent().source_id(), SourceId(7));
    assert_eq!(record.parent().job_id(), JobId(42));
    assert_eq!(record.total_chunks(), 2);
    assert_eq!(record.total_bytes(), 150);
    assert_eq!(record.start_time(), Some(at(0)));
    assert_eq!(record.end_time(), Some(at(1)));
    assert_eq!(record.elapsed_time(), Duration::from_secs(1));

    assert!(hook.unit_metrics().is_empty());
}

#[test]
fn unitless_job_matches_job_snapshot_after_finish() {
    let hook = Arc::new(UnitHook::new());
    let progress = progress_with(&hook);

    progress.start(at(10));
    progress.report_chunk(None, &Chunk::new(progress.job_ref(), vec![0; 64]));
    progress.report_error(Arc::new(io::Error::other("rate limited")));
    progress.report_chunk(None, &Chunk::new(progress.job_ref(), vec![0; 64]));
    progress.end(at(20));
    progress.finish();

    let snapshot = progress.snapshot();
    let metrics = hook.unit_metrics();
    assert_eq!(metrics.len(), 1);

    let record = &metrics[0];
    assert!(record.unit().is_none());
    assert_eq!(record.start_time(), snapshot.start_time);
    assert_eq!(record.end_time(), snapshot.end_time);
    assert_eq!(record.errors().len(), snapshot.errors.len());
    assert!(Arc::ptr_eq(&record.errors()[0], &snapshot.errors[0]));
    assert_eq!(record.total_bytes(), 128);

    assert!(hook.unit_metrics().is_empty());
}

#[test]
fn unitless_entry_starts_at_job_start() {
    let hook = Arc::new(UnitHook::new());
    let progress = progress_with(&hook);

    progress.start(at(5));
    progress.report_chunk(None, &Chunk::new(progress.job_ref(), "secret"));

    assert_eq!(hook.unit_metrics()[0].start_time(), Some(at(5)));
}

#[test]
fn unit_scoped_errors_are_recorded_twice() {
    let hook = Arc::new(UnitHook::new());
    let progress = progress_with(&hook);
    let unit = CommonSourceUnit::shared("bucket");

    progress.report_chunk(None, &Chunk::new(progress.job_ref(), "x"));
    progress.start_unit_chunking(Some(&unit), at(0));
    let denied = ChunkError::new(unit.clone(), "access denied");
    let reset: ScanError = Arc::new(io::Error::other("connection reset"));
    progress.report_error(denied.into_scan_error());
    progress.report_error(reset);

    let metrics = hook.unit_metrics();
    let job_record = metrics.iter().find(|m| m.unit().is_none()).unwrap();
    let unit_record = metrics.iter().find(|m| m.unit().is_some()).unwrap();

    assert_eq!(job_record.errors().len(), 2);
    assert_eq!(unit_record.errors().len(), 1);
    assert_eq!(
        unit_record.errors()[0].to_string(),
        "unit bucket: access denied"
    );
}

#[test]
fn chunks_of_evicted_units_are_dropped() {
    let hook = Arc::new(UnitHook::with_cache(LruCache::new(1).unwrap()));
    let progress = progress_with(&hook);
    let first = CommonSourceUnit::shared("u1");
    let second = CommonSourceUnit::shared("u2");

    progress.start_unit_chunking(Some(&first), at(0));
    progress.start_unit_chunking(Some(&second), at(0));
    progress.report_chunk(Some(&first), &Chunk::new(progress.job_ref(), "lost"));
    progress.end_unit_chunking(Some(&first), at(1));

    let metrics = hook.unit_metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(unit_id(&metrics[0]), Some("u2"));
    assert_eq!(hook.len(), 1);
}

#[test]
fn eviction_signals_only_undelivered_units() {
    let settings = UnitHookSettings::default().with_capacity(3);
    let hook = UnitHook::with_settings(settings).unwrap();
    let job = JobRef::new(SourceId(1), JobId(1));

    let (drained, logs) = capture_logs(|| {
        let finished = CommonSourceUnit::shared("finished");
        hook.start_unit_chunking(&job, Some(&finished), at(0));
        hook.end_unit_chunking(&job, Some(&finished), at(1));
        hook.unit_metrics()
    });
    assert_eq!(drained.len(), 1);
    assert!(logs.dropped_metrics().is_empty());

    let (_, logs) = capture_logs(|| {
        for id in 0..5 {
            let unit = CommonSourceUnit::shared(format!("unit-{id}"));
            hook.start_unit_chunking(&job, Some(&unit), at(0));
        }
    });

    let dropped = logs.dropped_metrics();
    assert_eq!(dropped.len(), 2);
    assert!(dropped[0].contains("id=1/1/unit-0"));
    assert!(dropped[1].contains("id=1/1/unit-1"));
    assert_eq!(hook.len(), 3);
}

#[test]
fn concurrent_connectors_do_not_lose_updates() {
    let hook = Arc::new(UnitHook::new());
    let job = JobRef::new(SourceId(1), JobId(1));
    let unit = CommonSourceUnit::shared("shared");
    hook.start_unit_chunking(&job, Some(&unit), at(0));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let (hook, job, unit) = (hook.clone(), job.clone(), unit.clone());
            thread::spawn(move || {
                let own = CommonSourceUnit::shared(format!("worker-{worker}"));
                hook.start_unit_chunking(&job, Some(&own), at(0));
                for _ in 0..1000 {
                    hook.report_chunk(&job, Some(&unit), &Chunk::new(&job, vec![0; 3]));
                    hook.report_chunk(&job, Some(&own), &Chunk::new(&job, vec![0; 1]));
                }
                hook.end_unit_chunking(&job, Some(&own), at(1));
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let metrics = hook.unit_metrics();
    let shared = metrics
        .iter()
        .find(|m| unit_id(m) == Some("shared"))
        .unwrap();

    assert_eq!(metrics.len(), 9);
    assert_eq!(shared.total_chunks(), 8000);
    assert_eq!(shared.total_bytes(), 24000);
    assert!(metrics
        .iter()
        .filter(|m| m.is_finished())
        .all(|m| m.total_chunks() == 1000 && m.total_bytes() == 1000));
    assert_eq!(hook.unit_metrics().len(), 1);
}
