use crate::command::{CommandContext, CommandTable};
use crate::resp::{RespParser, RespValue};
use crate::store::{SharedStore, Store};
use bytes::BytesMut;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct AofSettings {
    pub flush_interval: Duration,
    /// Growth over the post-rewrite base size, in percent, that triggers an
    /// automatic rewrite. Zero disables it.
    pub rewrite_percentage: u64,
    pub rewrite_min_size: u64,
    pub check_interval: Duration,
}

impl Default for AofSettings {
    fn default() -> Self {
        AofSettings {
            flush_interval: Duration::from_secs(1),
            rewrite_percentage: 100,
            rewrite_min_size: 64 * 1024 * 1024,
            check_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Default)]
struct Pending {
    queue: VecDeque<RespValue>,
    rewriting: bool,
    /// Entries queued before the running rewrite's snapshot. Dropped when the
    /// rewrite lands, put back in front of `queue` when it fails.
    stash: VecDeque<RespValue>,
}

/// Append-only command log.
///
/// Appends go to an in-memory queue and never block on disk; a writer task
/// flushes the queue on an interval. A rewrite replaces the file with a
/// snapshot of the keyspace, after which appends continue on the new file.
pub struct Aof {
    path: PathBuf,
    settings: AofSettings,
    pending: Mutex<Pending>,
    file: tokio::sync::Mutex<Option<File>>,
    /// Bumped (under the file guard) each time a rewrite lands. A flush that
    /// drained its batch under an older generation must not write it.
    generation: AtomicU64,
    size: AtomicU64,
    base_size: AtomicU64,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    rewrite_task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).await
}

fn encode(commands: impl IntoIterator<Item = impl std::borrow::Borrow<RespValue>>) -> Vec<u8> {
    let mut buf = Vec::new();
    for cmd in commands {
        cmd.borrow().write_to(&mut buf);
    }
    buf
}

impl Aof {
    pub async fn open(path: impl Into<PathBuf>, settings: AofSettings) -> io::Result<Arc<Aof>> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = rewrite_tmp_path(&path);
        if tokio::fs::try_exists(&tmp).await.unwrap_or(false) {
            warn!(path = %tmp.display(), "removing leftover AOF rewrite file");
            let _ = tokio::fs::remove_file(&tmp).await;
        }

        let file = open_append(&path).await?;
        let size = file.metadata().await?.len();
        info!(path = %path.display(), size, "AOF opened");

        Ok(Arc::new(Aof {
            path,
            settings,
            pending: Mutex::new(Pending::default()),
            file: tokio::sync::Mutex::new(Some(file)),
            generation: AtomicU64::new(0),
            size: AtomicU64::new(size),
            base_size: AtomicU64::new(size),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            rewrite_task: Mutex::new(None),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the current file so far.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    /// File size right after open or the last rewrite.
    pub fn base_size(&self) -> u64 {
        self.base_size.load(Ordering::SeqCst)
    }

    pub fn is_rewriting(&self) -> bool {
        lock(&self.pending).rewriting
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).queue.len()
    }

    /// Queue a successful write that ran at `now`. Relative expirations are
    /// pinned to absolute instants first so replay reproduces the deadline
    /// the store computed.
    pub fn append(&self, command: &RespValue, now: u64) {
        let entry = to_absolute(command, now);
        lock(&self.pending).queue.push_back(entry);
    }

    /// Write everything queued so far and fsync. Returns the number of
    /// commands written; zero while a rewrite is running.
    pub async fn flush(&self) -> io::Result<usize> {
        let (batch, generation) = {
            let mut pending = lock(&self.pending);
            if pending.rewriting || pending.queue.is_empty() {
                return Ok(0);
            }
            let batch: Vec<RespValue> = pending.queue.drain(..).collect();
            (batch, self.generation.load(Ordering::SeqCst))
        };

        match self.write_batch(&encode(&batch), generation).await {
            Ok(true) => Ok(batch.len()),
            Ok(false) => {
                debug!(count = batch.len(), "dropping batch already covered by rewrite");
                Ok(0)
            }
            Err(e) => {
                self.requeue(batch, generation);
                Err(e)
            }
        }
    }

    /// Returns false when a rewrite landed after the batch was drained.
    async fn write_batch(&self, data: &[u8], generation: u64) -> io::Result<bool> {
        let mut guard = self.file.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(false);
        }
        if guard.is_none() {
            let file = open_append(&self.path).await?;
            // drop whatever a failed write left behind
            file.set_len(self.size()).await?;
            *guard = Some(file);
        }
        let Some(file) = guard.as_mut() else {
            return Err(io::Error::other("AOF file handle unavailable"));
        };

        let written = async {
            file.write_all(data).await?;
            file.sync_data().await
        }
        .await;
        match written {
            Ok(()) => {
                self.size.fetch_add(data.len() as u64, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    fn requeue(&self, batch: Vec<RespValue>, generation: u64) {
        let mut pending = lock(&self.pending);
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let target = if pending.rewriting {
            &mut pending.stash
        } else {
            &mut pending.queue
        };
        for cmd in batch.into_iter().rev() {
            target.push_front(cmd);
        }
    }

    /// Start a background rewrite from `snapshot`. The caller must hold the
    /// store lock that produced the snapshot. Returns false if a rewrite is
    /// already running.
    pub fn begin_rewrite(self: &Arc<Self>, snapshot: Vec<RespValue>) -> bool {
        {
            let mut pending = lock(&self.pending);
            if pending.rewriting {
                return false;
            }
            pending.rewriting = true;
            pending.stash = std::mem::take(&mut pending.queue);
        }

        info!(commands = snapshot.len(), "background AOF rewrite started");
        let aof = Arc::clone(self);
        let handle = tokio::spawn(async move { aof.run_rewrite(snapshot).await });
        *lock(&self.rewrite_task) = Some(handle);
        true
    }

    async fn run_rewrite(&self, snapshot: Vec<RespValue>) {
        let data = encode(&snapshot);
        let tmp = rewrite_tmp_path(&self.path);

        let result = async {
            let mut file = File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);

            let mut guard = self.file.lock().await;
            guard.take();
            tokio::fs::rename(&tmp, &self.path).await?;
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.size.store(data.len() as u64, Ordering::SeqCst);
            self.base_size.store(data.len() as u64, Ordering::SeqCst);
            match open_append(&self.path).await {
                Ok(file) => *guard = Some(file),
                // the next flush retries the open
                Err(e) => warn!("reopening AOF after rewrite failed: {e}"),
            }
            Ok::<_, io::Error>(())
        }
        .await;

        let mut pending = lock(&self.pending);
        match result {
            Ok(()) => {
                pending.stash.clear();
                info!(bytes = data.len(), "background AOF rewrite finished");
            }
            Err(e) => {
                error!("background AOF rewrite failed: {e}");
                let _ = std::fs::remove_file(&tmp);
                let mut restored = std::mem::take(&mut pending.stash);
                restored.append(&mut pending.queue);
                pending.queue = restored;
            }
        }
        pending.rewriting = false;
    }

    /// Wait for the running rewrite, if any.
    pub async fn wait_for_rewrite(&self) {
        let handle = lock(&self.rewrite_task).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("AOF rewrite task panicked: {e}");
            }
        }
    }

    fn should_rewrite(&self) -> bool {
        let pct = self.settings.rewrite_percentage;
        let size = self.size();
        if pct == 0 || size < self.settings.rewrite_min_size {
            return false;
        }
        let base = self.base_size();
        if base == 0 {
            return true;
        }
        size.saturating_sub(base) * 100 / base >= pct
    }

    /// Periodic flush until shutdown.
    pub fn spawn_writer(self: &Arc<Self>) {
        let aof = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(aof.settings.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = aof.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = aof.flush().await {
                            error!("AOF flush failed: {e}");
                        }
                    }
                }
            }
            debug!("AOF writer stopped");
        });
        lock(&self.tasks).push(handle);
    }

    /// Periodic size check that starts a rewrite once the file has grown
    /// enough past its base size.
    pub fn spawn_auto_rewrite(self: &Arc<Self>, store: SharedStore) {
        let aof = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(aof.settings.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = aof.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if aof.is_rewriting() || !aof.should_rewrite() {
                            continue;
                        }
                        info!(size = aof.size(), base = aof.base_size(), "AOF grew past threshold, rewriting");
                        let mut store = store.lock().await;
                        let snapshot = store.snapshot_commands();
                        aof.begin_rewrite(snapshot);
                    }
                }
            }
            debug!("AOF auto-rewrite checker stopped");
        });
        lock(&self.tasks).push(handle);
    }

    /// Stop background tasks, let a running rewrite finish, and flush what is
    /// left, all within `timeout`. The file is closed afterwards.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *lock(&self.tasks));

        let drain = async {
            for task in tasks {
                let _ = task.await;
            }
            self.wait_for_rewrite().await;
            self.flush().await
        };
        match tokio::time::timeout(timeout, drain).await {
            Ok(Ok(n)) => info!(commands = n, "AOF flushed on shutdown"),
            Ok(Err(e)) => error!("final AOF flush failed: {e}"),
            Err(_) => warn!(
                pending = self.pending_len(),
                "AOF shutdown timed out, unflushed commands lost"
            ),
        }
        self.file.lock().await.take();
    }
}

fn rewrite_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".rewrite.tmp");
    PathBuf::from(name)
}

fn upper(arg: &RespValue) -> Option<String> {
    arg.to_string_lossy().map(|s| s.to_ascii_uppercase())
}

fn int(arg: &RespValue) -> Option<i64> {
    arg.to_string_lossy()?.parse().ok()
}

fn bulk_int(n: i64) -> RespValue {
    RespValue::bulk_string(n.to_string())
}

/// Rewrite relative expirations in `command` as absolute PEXPIREAT / PXAT
/// forms computed against `now`. Anything else, or anything malformed, is
/// returned unchanged.
pub fn to_absolute(command: &RespValue, now: u64) -> RespValue {
    let RespValue::Array(Some(items)) = command else {
        return command.clone();
    };
    let Some(name) = items.first().and_then(upper) else {
        return command.clone();
    };
    let now = now as i64;
    let converted = match (name.as_str(), &items[1..]) {
        ("EXPIRE", [key, secs]) => int(secs)
            .and_then(|s| s.checked_mul(1000)?.checked_add(now))
            .map(|at| pexpireat(key, at)),
        ("PEXPIRE", [key, ms]) => int(ms).and_then(|ms| ms.checked_add(now)).map(|at| pexpireat(key, at)),
        ("EXPIREAT", [key, secs]) => int(secs).and_then(|s| s.checked_mul(1000)).map(|at| pexpireat(key, at)),
        ("SETEX", [key, secs, value]) => int(secs)
            .and_then(|s| s.checked_mul(1000)?.checked_add(now))
            .map(|at| set_pxat(key, value, at)),
        ("PSETEX", [key, ms, value]) => int(ms)
            .and_then(|ms| ms.checked_add(now))
            .map(|at| set_pxat(key, value, at)),
        ("SET", [_, _, ..]) => rewrite_options(items, 3, now),
        ("GETEX", [_, ..]) => rewrite_options(items, 2, now),
        _ => None,
    };
    converted.unwrap_or_else(|| command.clone())
}

fn pexpireat(key: &RespValue, at: i64) -> RespValue {
    RespValue::array(vec![RespValue::bulk_string("PEXPIREAT"), key.clone(), bulk_int(at)])
}

fn set_pxat(key: &RespValue, value: &RespValue, at: i64) -> RespValue {
    RespValue::array(vec![
        RespValue::bulk_string("SET"),
        key.clone(),
        value.clone(),
        RespValue::bulk_string("PXAT"),
        bulk_int(at),
    ])
}

/// Replace EX/PX/EXAT options after `first_option` with PXAT.
fn rewrite_options(items: &[RespValue], first_option: usize, now: i64) -> Option<RespValue> {
    let mut out = items[..first_option].to_vec();
    let mut i = first_option;
    while i < items.len() {
        let opt = upper(&items[i])?;
        let at = match opt.as_str() {
            "EX" => int(items.get(i + 1)?)?.checked_mul(1000)?.checked_add(now),
            "PX" => int(items.get(i + 1)?)?.checked_add(now),
            "EXAT" => int(items.get(i + 1)?)?.checked_mul(1000),
            _ => {
                out.push(items[i].clone());
                i += 1;
                continue;
            }
        };
        out.push(RespValue::bulk_string("PXAT"));
        out.push(bulk_int(at?));
        i += 2;
    }
    Some(RespValue::array(out))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub failed: usize,
    /// Bytes of a partial trailing command cut from the file.
    pub truncated: u64,
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Rebuild `store` from the log at `path`. A missing file is an empty log.
///
/// In strict mode any failing command or partial trailing command is an
/// error. In lenient mode failing commands are skipped and a partial trailing
/// command (an interrupted write) is cut off the file so later appends start
/// at a frame boundary. Undecodable data is an error in both modes and the
/// file is left untouched: cutting there would discard every later command.
pub fn replay(path: &Path, commands: &CommandTable, store: &mut Store, strict: bool) -> io::Result<ReplayStats> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReplayStats::default()),
        Err(e) => return Err(e),
    };

    let mut stats = ReplayStats::default();
    let mut buf = BytesMut::from(&data[..]);
    let partial_tail = loop {
        let offset = data.len() - buf.len();
        let frame = match RespParser::parse(&mut buf) {
            Ok(Some(frame)) => frame,
            Ok(None) => break !buf.is_empty(),
            Err(e) => {
                error!(offset, "AOF is corrupt at byte {offset}: {e}");
                return Err(invalid_data(format!("AOF is corrupt at byte {offset}: {e}")));
            }
        };

        if !matches!(frame, RespValue::Array(Some(_))) {
            if strict {
                return Err(invalid_data(format!("non-command entry at byte {offset}")));
            }
            warn!(offset, "skipping non-command AOF entry");
            stats.failed += 1;
            continue;
        }

        let mut ctx = CommandContext::new(store, commands, None);
        let outcome = commands.dispatch(&mut ctx, &frame);
        if let RespValue::Error(msg) = &outcome.reply {
            if strict {
                return Err(invalid_data(format!("command at byte {offset} failed: {msg}")));
            }
            warn!(offset, "AOF command failed during replay: {msg}");
            stats.failed += 1;
        } else {
            stats.applied += 1;
        }
    };

    if partial_tail {
        let valid = (data.len() - buf.len()) as u64;
        if strict {
            return Err(invalid_data(format!("AOF ends with an incomplete command at byte {valid}")));
        }
        stats.truncated = data.len() as u64 - valid;
        warn!(
            truncated = stats.truncated,
            "AOF ends with an incomplete command at byte {valid}, truncating"
        );
        std::fs::OpenOptions::new().write(true).open(path)?.set_len(valid)?;
    }

    info!(applied = stats.applied, failed = stats.failed, "AOF replayed");
    Ok(stats)
}
