//! Read-back verification

use heapless::Vec as BoundedVec;

use super::{FailureKind, OperationKind, ProgressObserver, WorkflowError};
use crate::flash::FlashDevice;
use crate::programmer::SpiMaster;

/// Verification read size
pub const VERIFY_CHUNK_SIZE: usize = 4096;
/// Bytes of each side kept per mismatch
pub const MISMATCH_PREVIEW_LEN: usize = 16;
/// Mismatching chunks recorded before verification gives up
pub const MAX_MISMATCHES: usize = 5;

/// Recorded mismatches, capped at [`MAX_MISMATCHES`]
pub type Mismatches = BoundedVec<Mismatch, MAX_MISMATCHES>;

/// A verification chunk whose contents differ from the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Flash offset of the chunk
    pub offset: u32,
    /// First bytes of the chunk in the image
    pub expected: BoundedVec<u8, MISMATCH_PREVIEW_LEN>,
    /// First bytes of the chunk as read back
    pub actual: BoundedVec<u8, MISMATCH_PREVIEW_LEN>,
}

impl Mismatch {
    fn new(offset: u32, expected: &[u8], actual: &[u8]) -> Self {
        let n = expected.len().min(MISMATCH_PREVIEW_LEN);
        Self {
            offset,
            expected: BoundedVec::from_slice(&expected[..n]).unwrap_or_default(),
            actual: BoundedVec::from_slice(&actual[..n]).unwrap_or_default(),
        }
    }
}

/// Outcome of a verification pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerifyReport {
    /// Chunks read and compared
    pub chunks_verified: usize,
    /// Chunks the image spans
    pub total_chunks: usize,
    /// Mismatching chunks in address order
    pub mismatches: Mismatches,
}

impl VerifyReport {
    /// True if every chunk matched
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// True if verification stopped at the mismatch cap
    pub fn aborted(&self) -> bool {
        self.mismatches.is_full() && self.chunks_verified < self.total_chunks
    }
}

/// Compare flash contents from offset 0 against `image`
///
/// Reads in [`VERIFY_CHUNK_SIZE`] chunks and stops after recording
/// [`MAX_MISMATCHES`] mismatching chunks. Mismatches are returned in the
/// report, not as an error; a read failure is a
/// [`FailureKind::CommunicationError`].
pub fn verify_image<M, O>(
    device: &mut FlashDevice<M>,
    image: &[u8],
    observer: &mut O,
) -> Result<VerifyReport, WorkflowError>
where
    M: SpiMaster,
    O: ProgressObserver + ?Sized,
{
    let mut report = VerifyReport {
        total_chunks: image.len().div_ceil(VERIFY_CHUNK_SIZE),
        ..Default::default()
    };
    let mut buf = [0u8; VERIFY_CHUNK_SIZE];

    for (i, expected) in image.chunks(VERIFY_CHUNK_SIZE).enumerate() {
        let offset = (i * VERIFY_CHUNK_SIZE) as u32;
        let actual = &mut buf[..expected.len()];

        if let Err(e) = device.read_into(offset, actual) {
            return Err(WorkflowError::new(FailureKind::CommunicationError, Some(e))
                .with_mismatches(report.mismatches));
        }
        report.chunks_verified += 1;

        if expected != &actual[..] {
            let mismatch = Mismatch::new(offset, expected, actual);
            log::debug!("verify: mismatch in chunk at {:#08x}", offset);
            observer.mismatch(&mismatch);
            // Capacity is checked below before the next push
            let _ = report.mismatches.push(mismatch);
        }
        observer.progress(OperationKind::Verify, i + 1, report.total_chunks);

        if report.mismatches.is_full() {
            log::warn!(
                "verify: {} mismatching chunks, stopping at {:#08x}",
                MAX_MISMATCHES,
                offset
            );
            break;
        }
    }

    Ok(report)
}
