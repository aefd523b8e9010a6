//! Message passing between partition workers.
//!
//! Wire conventions for the higher-level protocol: all integers are
//! little-endian fixed width, records are `#[repr(C)]` and Pod-safe.
//! Receivers truncate to their provided buffer length, so protocols either
//! exchange sizes first or derive exact lengths (the face exchange does the
//! latter; the broadcast helper does the former).

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Point-to-point communication between partition workers.
pub trait Communicator: Send + Sync {
    type SendHandle: Wait;
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this worker (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of workers.
    fn size(&self) -> usize;

    /// Synchronization barrier (default: no-op for single-process comms).
    fn barrier(&self) {}
}

/// Tag newtype for safer tag arithmetic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Offset the tag by `dx`, wrapping on overflow.
    #[inline]
    pub const fn offset(self, dx: u16) -> Self {
        Self(self.0.wrapping_add(dx))
    }
}

/// Tags used by the partition refinement protocol.
pub mod tags {
    use super::CommTag;

    /// Size prefix of a broadcast payload.
    pub const BCAST_SIZE: CommTag = CommTag::new(8);
    /// Broadcast payload bytes.
    pub const BCAST_DATA: CommTag = CommTag::new(9);
    /// Refined triangle face tables.
    pub const FACE_TRIS: CommTag = CommTag::new(12);
    /// Refined quad face tables.
    pub const FACE_QUADS: CommTag = CommTag::new(13);
}

/// Compile-time no-op comm for pure serial paths.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- ThreadComm: intra-process workers over a shared mailbox ---

type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Slot {
    q: VecDeque<Vec<u8>>,
}

struct Mailbox {
    map: Mutex<HashMap<Key, Arc<(Mutex<Slot>, Condvar)>>>,
}

static MAILBOX: Lazy<Mailbox> = Lazy::new(|| Mailbox {
    map: Mutex::new(HashMap::new()),
});

fn mailbox_entry(key: Key) -> Arc<(Mutex<Slot>, Condvar)> {
    let mut g = MAILBOX.map.lock().expect("MAILBOX poisoned");
    g.entry(key)
        .or_insert_with(|| Arc::new((Mutex::new(Slot::default()), Condvar::new())))
        .clone()
}

pub struct LocalSendHandle;

impl Wait for LocalSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

pub struct LocalRecvHandle {
    cell: Arc<(Mutex<Slot>, Condvar)>,
    want_len: usize,
}

impl Wait for LocalRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let (lock, cv) = &*self.cell;
        let mut slot = lock.lock().expect("Slot poisoned");
        while slot.q.is_empty() {
            slot = cv.wait(slot).expect("Condvar poisoned");
        }
        let mut msg = slot.q.pop_front().expect("q non-empty");
        msg.truncate(self.want_len.min(msg.len()));
        Some(msg)
    }
}

/// In-process communicator: one instance per worker thread, all sharing a
/// process-global mailbox keyed by (src, dst, tag).
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// Distinguishes concurrent refinement runs sharing the process-global
    /// mailbox (tags are offset by `epoch * 64`).
    epoch: u16,
}

static EPOCH: Lazy<Mutex<u16>> = Lazy::new(|| Mutex::new(0));

impl ThreadComm {
    /// Create communicators for all `size` workers of one run.
    pub fn for_run(size: usize) -> Vec<ThreadComm> {
        let mut guard = EPOCH.lock().expect("EPOCH poisoned");
        let epoch = *guard;
        *guard = guard.wrapping_add(1);
        (0..size)
            .map(|rank| ThreadComm { rank, size, epoch })
            .collect()
    }

    #[inline]
    fn run_tag(&self, tag: u16) -> u16 {
        tag.wrapping_add(self.epoch.wrapping_mul(64))
    }
}

impl Communicator for ThreadComm {
    type SendHandle = LocalSendHandle;
    type RecvHandle = LocalRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, self.run_tag(tag));
        let entry = mailbox_entry(key);
        let (lock, cv) = &*entry;
        {
            let mut slot = lock.lock().expect("Slot poisoned");
            slot.q.push_back(buf.to_vec());
        }
        cv.notify_all();
        LocalSendHandle
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        let key = (peer, self.rank, self.run_tag(tag));
        LocalRecvHandle {
            cell: mailbox_entry(key),
            want_len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// Root ships `payload` to every other rank; everyone returns the payload.
///
/// Two-phase size-then-data exchange so receivers can size their buffers.
pub fn broadcast_bytes<C: Communicator>(comm: &C, root: usize, payload: &[u8]) -> Vec<u8> {
    if comm.size() <= 1 {
        return payload.to_vec();
    }
    if comm.rank() == root {
        let size_le = (payload.len() as u64).to_le_bytes();
        let mut handles = Vec::new();
        for peer in 0..comm.size() {
            if peer != root {
                handles.push(comm.isend(peer, tags::BCAST_SIZE.as_u16(), &size_le));
                handles.push(comm.isend(peer, tags::BCAST_DATA.as_u16(), payload));
            }
        }
        for h in handles {
            h.wait();
        }
        payload.to_vec()
    } else {
        let mut size_buf = [0u8; 8];
        let msg = comm
            .irecv(root, tags::BCAST_SIZE.as_u16(), &mut size_buf)
            .wait()
            .expect("broadcast size message");
        size_buf.copy_from_slice(&msg);
        let len = u64::from_le_bytes(size_buf) as usize;
        let mut data = vec![0u8; len];
        comm.irecv(root, tags::BCAST_DATA.as_u16(), &mut data)
            .wait()
            .expect("broadcast data message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_single_rank() {
        let c = NoComm;
        assert_eq!(c.rank(), 0);
        assert_eq!(c.size(), 1);
        assert_eq!(broadcast_bytes(&c, 0, b"xyz"), b"xyz");
    }

    #[test]
    fn thread_comm_point_to_point() {
        let comms = ThreadComm::for_run(2);
        let (c0, c1) = (comms[0].clone(), comms[1].clone());
        let sender = std::thread::spawn(move || {
            c0.isend(1, 42, b"hello").wait();
        });
        let mut buf = [0u8; 5];
        let got = c1.irecv(0, 42, &mut buf).wait().unwrap();
        sender.join().unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn thread_comm_broadcast() {
        let comms = ThreadComm::for_run(3);
        let mut joins = Vec::new();
        for comm in comms {
            joins.push(std::thread::spawn(move || {
                let payload = if comm.rank() == 0 {
                    b"assignment".to_vec()
                } else {
                    Vec::new()
                };
                broadcast_bytes(&comm, 0, &payload)
            }));
        }
        for j in joins {
            assert_eq!(j.join().unwrap(), b"assignment");
        }
    }

    #[test]
    fn receiver_truncates_to_buffer() {
        let comms = ThreadComm::for_run(2);
        let (c0, c1) = (comms[0].clone(), comms[1].clone());
        c0.isend(1, 7, b"0123456789").wait();
        let mut buf = [0u8; 4];
        let got = c1.irecv(0, 7, &mut buf).wait().unwrap();
        assert_eq!(got, b"0123");
    }
}
