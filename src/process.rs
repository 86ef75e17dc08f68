//! Ranks as operating-system processes.
//!
//! The root process launches ranks `1..size` by re-running a program (by
//! default its own executable with its own arguments) with the rank and
//! world size in the environment (see [`crate::env`]). Every spawned rank
//! computes its share, writes exactly one frame to its stdout, and exits:
//!
//! ```text
//! | length: u64 little endian | payload: length bytes |
//! ```
//!
//! The root reads the frames in rank order and checks every exit status, so a
//! rank that dies before reporting is an error on the root rather than a
//! silently missing share.
//!
//! Spawned ranks therefore must not write anything else to stdout. Logging
//! goes to stderr, which is inherited.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::comm::{Communicator, ROOT};
use crate::env::{self, RANK_VAR, SIZE_VAR};
use crate::error::{Error, Result};

/// Largest frame a root accepts from a spawned rank.
pub const MAX_FRAME_LEN: u64 = 1 << 32;

/// Global flag tracking whether this process already joined a world
static WORLD_INITIALIZED: AtomicBool = AtomicBool::new(false);

struct Spawned {
    child: Child,
    stdout: Option<ChildStdout>,
}

enum Role {
    Root { ranks: Mutex<Vec<Spawned>> },
    Spawned,
}

/// One rank of a multi-process world.
///
/// # Example
///
/// ```no_run
/// use pidecimals::{BigValue, Communicator, Precision, ProcessComm, ReduceOp};
///
/// let comm = ProcessComm::init(4).unwrap();
/// let p = Precision::new(256).unwrap();
/// let local = BigValue::from_u64(p, comm.rank() as u64);
/// if let Some(total) = comm.reduce(&local, p, ReduceOp::Sum, 0).unwrap() {
///     println!("sum of ranks = {total}");
/// }
/// ```
pub struct ProcessComm {
    rank: usize,
    size: usize,
    role: Role,
    /// Set when created through [`ProcessComm::init`]
    owns_world: bool,
}

impl ProcessComm {
    /// Join the world this process belongs to.
    ///
    /// A process started by a launcher becomes the rank it was given, and
    /// `size` is only checked against the launcher's. Any other process
    /// becomes the root and re-runs its own executable with its own
    /// arguments for ranks `1..size`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] on a second call, bootstrap errors from
    /// [`env::topology`], and spawn failures.
    pub fn init(size: usize) -> Result<Self> {
        if WORLD_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }
        let comm = match env::topology() {
            Ok(Some((rank, world))) => {
                if world != size {
                    warn!("rank {rank}: launcher world has {world} ranks, requested {size}");
                }
                Ok(Self::spawned(rank, world))
            }
            Ok(None) => std::env::current_exe()
                .map_err(Error::from)
                .and_then(|exe| Self::launch(&exe, std::env::args_os().skip(1), size)),
            Err(e) => Err(e),
        };
        match comm {
            Ok(mut comm) => {
                comm.owns_world = true;
                Ok(comm)
            }
            Err(e) => {
                WORLD_INITIALIZED.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Become the root of a new world, running `program args...` for every
    /// other rank.
    pub fn launch<I>(program: &Path, args: I, size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = OsString>,
    {
        if size == 0 {
            return Err(Error::NoProcesses);
        }
        let args: Vec<OsString> = args.into_iter().collect();
        let mut ranks = Vec::with_capacity(size - 1);
        for rank in 1..size {
            match spawn_rank(program, &args, rank, size) {
                Ok(spawned) => ranks.push(spawned),
                Err(e) => {
                    reap(&mut ranks);
                    return Err(e);
                }
            }
        }
        debug!("launched {} ranks of {}", ranks.len(), program.display());
        Ok(ProcessComm {
            rank: ROOT,
            size,
            role: Role::Root {
                ranks: Mutex::new(ranks),
            },
            owns_world: false,
        })
    }

    /// The handle of a rank started by a launcher.
    pub fn spawned(rank: usize, size: usize) -> Self {
        ProcessComm {
            rank,
            size,
            role: Role::Spawned,
            owns_world: false,
        }
    }

    /// Wait for every spawned rank that has not been read from yet.
    ///
    /// Called by the root once it needs nothing more from the world.
    pub fn finish(&self) -> Result<()> {
        let Role::Root { ranks } = &self.role else {
            return Ok(());
        };
        let mut ranks = ranks.lock();
        for (index, spawned) in ranks.iter_mut().enumerate() {
            wait_success(spawned, index + 1)?;
        }
        Ok(())
    }
}

fn spawn_rank(program: &Path, args: &[OsString], rank: usize, size: usize) -> Result<Spawned> {
    let mut child = Command::new(program)
        .args(args)
        .env(RANK_VAR, rank.to_string())
        .env(SIZE_VAR, size.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;
    trace!("rank {rank}: pid {}", child.id());
    let stdout = child.stdout.take();
    Ok(Spawned { child, stdout })
}

fn wait_success(spawned: &mut Spawned, rank: usize) -> Result<()> {
    // Dropping the pipe first unblocks a rank still writing to it.
    spawned.stdout = None;
    let status = spawned.child.wait()?;
    trace!("rank {rank}: exited with {status}");
    if status.success() {
        Ok(())
    } else {
        Err(Error::Transport(format!("rank {rank} exited with {status}")))
    }
}

fn reap(ranks: &mut [Spawned]) {
    for spawned in ranks.iter_mut() {
        spawned.stdout = None;
        if let Err(e) = spawned.child.kill() {
            trace!("kill failed: {e}");
        }
        let _ = spawned.child.wait();
    }
}

fn read_frame(stdout: &mut ChildStdout) -> std::io::Result<Vec<u8>> {
    let mut len = [0u8; 8];
    stdout.read_exact(&mut len)?;
    let len = u64::from_le_bytes(len);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {MAX_FRAME_LEN}"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    stdout.read_exact(&mut payload)?;
    Ok(payload)
}

impl Communicator for ProcessComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_bytes(&self, data: &[u8], dest: usize) -> Result<()> {
        match self.role {
            Role::Spawned if dest == ROOT => {
                let mut out = std::io::stdout().lock();
                out.write_all(&(data.len() as u64).to_le_bytes())?;
                out.write_all(data)?;
                out.flush()?;
                Ok(())
            }
            Role::Spawned => Err(Error::Transport(format!(
                "rank {} can only send to the root, not {dest}",
                self.rank
            ))),
            Role::Root { .. } => Err(Error::Transport(
                "the root of a process world does not send".into(),
            )),
        }
    }

    fn recv_bytes(&self, source: usize) -> Result<Vec<u8>> {
        let Role::Root { ranks } = &self.role else {
            return Err(Error::Transport(format!(
                "rank {} cannot receive; only the root does",
                self.rank
            )));
        };
        if source == ROOT || source >= self.size {
            return Err(Error::InvalidRank {
                rank: source,
                size: self.size,
            });
        }
        let mut ranks = ranks.lock();
        let spawned = &mut ranks[source - 1];
        let Some(stdout) = spawned.stdout.as_mut() else {
            return Err(Error::Transport(format!("rank {source} already reported")));
        };
        match read_frame(stdout) {
            Ok(frame) => {
                wait_success(spawned, source)?;
                Ok(frame)
            }
            Err(read_err) => {
                // The exit status explains a missing frame better than EOF does.
                wait_success(spawned, source)?;
                Err(Error::Transport(format!(
                    "rank {source} exited without a complete frame: {read_err}"
                )))
            }
        }
    }
}

impl Drop for ProcessComm {
    fn drop(&mut self) {
        if let Role::Root { ranks } = &mut self.role {
            let ranks = ranks.get_mut();
            let mut running = Vec::new();
            for (index, spawned) in ranks.iter_mut().enumerate() {
                if matches!(spawned.child.try_wait(), Ok(None)) {
                    running.push(index + 1);
                }
            }
            if !running.is_empty() {
                warn!("terminating ranks {running:?} that never reported");
            }
            reap(ranks);
        }
        if self.owns_world {
            WORLD_INITIALIZED.store(false, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for ProcessComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("root", &matches!(self.role, Role::Root { .. }))
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<OsString> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn world_of_one_spawns_nothing() {
        let comm = ProcessComm::launch(Path::new("/bin/sh"), sh("exit 1"), 1).unwrap();
        assert_eq!(comm.size(), 1);
        assert!(comm.is_root());
        comm.finish().unwrap();
    }

    #[test]
    fn zero_processes_rejected() {
        assert!(matches!(
            ProcessComm::launch(Path::new("/bin/sh"), sh("true"), 0),
            Err(Error::NoProcesses)
        ));
    }

    #[test]
    fn frames_are_read_in_rank_order() {
        // Each rank writes an 8-byte length of 1 followed by its rank digit
        let script = r#"printf '\001\000\000\000\000\000\000\000'; printf "$PIDECIMALS_RANK""#;
        let comm = ProcessComm::launch(Path::new("/bin/sh"), sh(script), 3).unwrap();
        assert_eq!(comm.recv_bytes(1).unwrap(), b"1");
        assert_eq!(comm.recv_bytes(2).unwrap(), b"2");
        assert!(matches!(comm.recv_bytes(2), Err(Error::Transport(_))));
        comm.finish().unwrap();
    }

    #[test]
    fn failing_rank_is_reported() {
        let comm = ProcessComm::launch(Path::new("/bin/sh"), sh("exit 3"), 2).unwrap();
        let err = comm.recv_bytes(1).unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("rank 1")), "{err}");
    }

    #[test]
    fn spawned_rank_cannot_receive() {
        let comm = ProcessComm::spawned(1, 2);
        assert!(!comm.is_root());
        assert!(matches!(comm.recv_bytes(0), Err(Error::Transport(_))));
        assert!(matches!(comm.send_bytes(&[1], 1), Err(Error::Transport(_))));
    }

    #[test]
    fn root_rejects_bad_sources() {
        let comm = ProcessComm::launch(Path::new("/bin/sh"), sh("true"), 2).unwrap();
        assert!(matches!(comm.recv_bytes(0), Err(Error::InvalidRank { .. })));
        assert!(matches!(comm.recv_bytes(5), Err(Error::InvalidRank { .. })));
    }
}
