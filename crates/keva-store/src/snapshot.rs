//! Export of confirmed state to a single framed file.
//!
//! On-disk format:
//! ```text
//! [8 bytes: magic "KEVASNAP"]
//! [4 bytes: format version (little-endian u32)]
//! [8 bytes: base height (little-endian u64)]
//! repeated:
//!   [4 bytes: payload length (little-endian u32)]
//!   [4 bytes: CRC32 of payload (little-endian u32)]
//!   [N bytes: payload (bincode-serialized SnapshotItem)]
//! ```
//!
//! Namespaces come first in creation order, then rows ordered by namespace
//! and key, so the same state always produces the same bytes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use keva_types::NamespaceId;

use crate::error::{SnapshotError, StoreResult};
use crate::memory::ProjectionSnapshot;
use crate::record::{KeyRecord, NamespaceInfo};
use crate::traits::ProjectionReader;

const MAGIC: &[u8; 8] = b"KEVASNAP";
const FORMAT_VERSION: u32 = 1;
/// Frame header size: 4 bytes length + 4 bytes CRC.
const FRAME_HEADER: usize = 8;

/// One framed record in a snapshot file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum SnapshotItem {
    Namespace(NamespaceInfo),
    Row {
        namespace: NamespaceId,
        key: String,
        record: KeyRecord,
    },
}

/// What a completed export wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub path: PathBuf,
    pub base_height: u64,
    pub records_written: u64,
    pub namespaces_written: u64,
    /// BLAKE3 of the complete file.
    pub digest: [u8; 32],
}

impl SnapshotSummary {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Writer that hashes every byte it passes through.
struct DigestWriter {
    inner: BufWriter<File>,
    hasher: blake3::Hasher,
}

impl DigestWriter {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.hasher.update(bytes);
        self.inner.write_all(bytes)
    }
}

/// Frame one item: length, CRC32, bincode payload.
fn encode_frame(item: &SnapshotItem) -> Result<Vec<u8>, SnapshotError> {
    let payload =
        bincode::serialize(item).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    let length = payload.len() as u32;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Path of the partial file written before the final link into place.
pub fn incomplete_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".incomplete");
    PathBuf::from(name)
}

/// Write every confirmed namespace and row to `path`.
///
/// The export reads one consistent snapshot of the store, writes it to
/// `<path>.incomplete` and links it into place once fully synced. An
/// existing destination is never overwritten.
pub fn dump_snapshot<R: ProjectionReader + ?Sized>(
    reader: &R,
    path: &Path,
) -> StoreResult<SnapshotSummary> {
    if path.exists() {
        return Err(SnapshotError::AlreadyExists(path.to_path_buf()).into());
    }
    let state = reader.snapshot()?;
    Ok(write_snapshot(&state, path)?)
}

fn write_snapshot(state: &ProjectionSnapshot, path: &Path) -> Result<SnapshotSummary, SnapshotError> {
    let partial = incomplete_path(path);
    let unwritable = |reason: io::Error| SnapshotError::Unwritable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&partial)
        .map_err(unwritable)?;
    let mut out = DigestWriter {
        inner: BufWriter::new(file),
        hasher: blake3::Hasher::new(),
    };

    let written = (|| -> Result<(u64, u64), SnapshotError> {
        out.write_all(MAGIC).map_err(unwritable)?;
        out.write_all(&FORMAT_VERSION.to_le_bytes())
            .map_err(unwritable)?;
        out.write_all(&state.tip.to_le_bytes()).map_err(unwritable)?;

        for info in &state.namespaces {
            let frame = encode_frame(&SnapshotItem::Namespace(info.clone()))?;
            out.write_all(&frame).map_err(unwritable)?;
        }
        for (namespace, key, record) in &state.rows {
            let frame = encode_frame(&SnapshotItem::Row {
                namespace: *namespace,
                key: key.clone(),
                record: record.clone(),
            })?;
            out.write_all(&frame).map_err(unwritable)?;
        }

        out.inner.flush().map_err(unwritable)?;
        out.inner.get_ref().sync_all().map_err(unwritable)?;
        Ok((state.namespaces.len() as u64, state.rows.len() as u64))
    })();

    let (namespaces_written, records_written) = match written {
        Ok(counts) => counts,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&partial) {
                warn!(path = %partial.display(), error = %cleanup, "failed to remove partial snapshot");
            }
            return Err(e);
        }
    };

    // Publish without replacing a destination that appeared meanwhile.
    let published = fs::hard_link(&partial, path);
    if let Err(cleanup) = fs::remove_file(&partial) {
        warn!(path = %partial.display(), error = %cleanup, "failed to remove partial snapshot");
    }
    match published {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(SnapshotError::AlreadyExists(path.to_path_buf()));
        }
        Err(e) => return Err(unwritable(e)),
    }

    let summary = SnapshotSummary {
        path: path.to_path_buf(),
        base_height: state.tip,
        records_written,
        namespaces_written,
        digest: *out.hasher.finalize().as_bytes(),
    };
    info!(
        path = %path.display(),
        height = summary.base_height,
        rows = records_written,
        namespaces = namespaces_written,
        digest = %summary.digest_hex(),
        "snapshot written"
    );
    Ok(summary)
}

/// Read a snapshot file back, verifying every frame.
pub fn read_snapshot(path: &Path) -> Result<ProjectionSnapshot, SnapshotError> {
    let unreadable = |reason: io::Error| SnapshotError::Unreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let handle = File::open(path).map_err(unreadable)?;
    let file_len = handle.metadata().map_err(unreadable)?.len();
    let mut file = BufReader::new(handle);

    let mut header = [0u8; 20];
    file.read_exact(&mut header).map_err(unreadable)?;
    if &header[..8] != MAGIC {
        return Err(SnapshotError::Corrupt {
            offset: 0,
            reason: "bad magic".into(),
        });
    }
    let version = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::Corrupt {
            offset: 8,
            reason: format!("unsupported format version {version}"),
        });
    }
    let mut height = [0u8; 8];
    height.copy_from_slice(&header[12..20]);
    let mut snapshot = ProjectionSnapshot {
        tip: u64::from_le_bytes(height),
        namespaces: Vec::new(),
        rows: Vec::new(),
    };

    let mut offset = header.len() as u64;
    // A complete file always ends exactly on a frame boundary.
    while offset < file_len {
        if offset + FRAME_HEADER as u64 > file_len {
            return Err(SnapshotError::Corrupt {
                offset,
                reason: "truncated frame header".into(),
            });
        }
        let mut frame = [0u8; FRAME_HEADER];
        file.read_exact(&mut frame).map_err(unreadable)?;
        let length = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let expected_crc = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

        if offset + FRAME_HEADER as u64 + length as u64 > file_len {
            return Err(SnapshotError::Corrupt {
                offset,
                reason: format!("frame length {length} runs past end of file"),
            });
        }
        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)
            .map_err(|e| SnapshotError::Corrupt {
                offset,
                reason: e.to_string(),
            })?;
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Err(SnapshotError::Corrupt {
                offset,
                reason: format!("CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
            });
        }

        match bincode::deserialize::<SnapshotItem>(&payload) {
            Ok(SnapshotItem::Namespace(info)) => snapshot.namespaces.push(info),
            Ok(SnapshotItem::Row {
                namespace,
                key,
                record,
            }) => snapshot.rows.push((namespace, key, record)),
            Err(e) => {
                return Err(SnapshotError::Corrupt {
                    offset,
                    reason: e.to_string(),
                })
            }
        }
        offset += (FRAME_HEADER + payload.len()) as u64;
    }

    debug!(
        path = %path.display(),
        namespaces = snapshot.namespaces.len(),
        rows = snapshot.rows.len(),
        "snapshot read"
    );
    Ok(snapshot)
}
