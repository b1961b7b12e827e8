//! Erase / program / verify workflow
//!
//! [`Workflow`] drives a [`FlashDevice`] through one complete programming
//! run as a sequential state machine:
//!
//! ```text
//! Idle -> Validating -> Identifying -> Erasing -> Programming -> Verifying
//!                                                                  |
//!                                               Succeeded <--------+
//!                        (any state) ---------> Failed
//! ```
//!
//! - **Validating** rejects images larger than the device before any
//!   transaction is issued.
//! - **Identifying** reads the JEDEC id. An unknown or absent id is only
//!   logged; a transfer failure ends the run.
//! - **Erasing** and **Programming** execute the plans from
//!   [`crate::plan`] in order and halt on the first failure. The flash is
//!   then in an unknown state and needs a full erase before the next attempt.
//! - **Verifying** reads back in [`VERIFY_CHUNK_SIZE`] chunks. Up to
//!   [`MAX_MISMATCHES`] mismatching chunks are recorded; reaching the cap
//!   aborts verification. Any recorded mismatch fails the run.
//!
//! All reporting goes through a [`ProgressObserver`].

mod image;
mod observer;
mod verify;

use core::fmt;

pub use image::BitstreamImage;
pub use observer::{NoProgress, OperationKind, ProgressObserver};
pub use verify::{
    verify_image, Mismatch, Mismatches, VerifyReport, MAX_MISMATCHES, MISMATCH_PREVIEW_LEN,
    VERIFY_CHUNK_SIZE,
};

use crate::error::Error;
use crate::flash::FlashDevice;
use crate::plan::{self, EraseGranularity, EraseStrategy};
use crate::programmer::SpiMaster;
use crate::protocol::JedecId;

/// Default number of pages between program progress reports
pub const DEFAULT_PAGE_REPORT_INTERVAL: usize = 16;

/// Workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    /// Not started
    Idle,
    /// Checking the image against the device capacity
    Validating,
    /// Reading the JEDEC id
    Identifying,
    /// Executing the erase plan
    Erasing,
    /// Executing the program plan
    Programming,
    /// Reading back and comparing
    Verifying,
    /// Image written and verified
    Succeeded,
    /// Run halted
    Failed,
}

impl WorkflowState {
    /// True for `Succeeded` and `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Identifying => "identifying",
            Self::Erasing => "erasing",
            Self::Programming => "programming",
            Self::Verifying => "verifying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Image larger than the device
    SizeExceeded {
        /// Image length in bytes
        len: usize,
        /// Device capacity in bytes
        capacity: u32,
    },
    /// The transfer channel failed
    CommunicationError,
    /// An erase did not complete in time
    EraseTimeout {
        /// Address of the failing erase
        address: u32,
    },
    /// A page program failed or did not complete in time
    ProgramError {
        /// Address of the failing page
        address: u32,
    },
    /// Read-back differed from the image
    VerificationFailed {
        /// Number of mismatching chunks recorded
        mismatches: usize,
    },
    /// The image stream could not be read
    ImageReadError,
}

impl FailureKind {
    /// True if the flash may hold partially erased or programmed content
    pub fn leaves_flash_inconsistent(&self) -> bool {
        matches!(self, Self::EraseTimeout { .. } | Self::ProgramError { .. })
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeExceeded { len, capacity } => {
                write!(f, "image too large ({} > {} bytes)", len, capacity)
            }
            Self::CommunicationError => write!(f, "cannot communicate with flash"),
            Self::EraseTimeout { address } => write!(f, "erase timed out at {:#08x}", address),
            Self::ProgramError { address } => {
                write!(f, "programming failed at {:#08x}", address)
            }
            Self::VerificationFailed { mismatches } => {
                write!(f, "verification failed with {} mismatching chunk(s)", mismatches)
            }
            Self::ImageReadError => write!(f, "failed to read image"),
        }
    }
}

/// Terminal failure of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowError {
    /// What went wrong
    pub kind: FailureKind,
    /// Driver error that caused it, if any
    pub source: Option<Error>,
    /// Mismatches recorded before the failure
    pub mismatches: Mismatches,
}

impl WorkflowError {
    /// Create an error without recorded mismatches
    pub fn new(kind: FailureKind, source: Option<Error>) -> Self {
        Self {
            kind,
            source,
            mismatches: Mismatches::new(),
        }
    }

    /// Attach recorded mismatches
    pub fn with_mismatches(mut self, mismatches: Mismatches) -> Self {
        self.mismatches = mismatches;
        self
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(source) = self.source {
            write!(f, ": {}", source)?;
        }
        if self.kind.leaves_flash_inconsistent() {
            write!(f, " (flash contents are now undefined; erase the whole chip before retrying)")?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Workflow configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// How the erase plan covers the image
    pub erase_strategy: EraseStrategy,
    /// Read back and compare after programming
    pub verify: bool,
    /// Pages between program progress reports (the last page always reports)
    pub page_report_interval: usize,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            erase_strategy: EraseStrategy::Blocks,
            verify: true,
            page_report_interval: DEFAULT_PAGE_REPORT_INTERVAL,
        }
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramReport {
    /// Id read during identification
    pub jedec_id: JedecId,
    /// Image length in bytes
    pub image_len: usize,
    /// Erase operations executed
    pub erase_ops: usize,
    /// Bytes covered by those erases
    pub bytes_erased: u64,
    /// Page programs executed
    pub pages_written: usize,
    /// Verification chunks compared (0 if verification was skipped)
    pub chunks_verified: usize,
    /// Time spent erasing
    pub erase_ms: u64,
    /// Time spent programming
    pub program_ms: u64,
    /// Time spent verifying
    pub verify_ms: u64,
}

/// One programming run against one device
pub struct Workflow<'d, M> {
    device: &'d mut FlashDevice<M>,
    options: WorkflowOptions,
    state: WorkflowState,
}

impl<'d, M: SpiMaster> Workflow<'d, M> {
    /// Prepare a run; nothing is sent until [`run`](Self::run)
    pub fn new(device: &'d mut FlashDevice<M>, options: WorkflowOptions) -> Self {
        Self {
            device,
            options,
            state: WorkflowState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Erase, program and verify `image` at offset 0
    pub fn run<O: ProgressObserver + ?Sized>(
        &mut self,
        image: &BitstreamImage,
        observer: &mut O,
    ) -> Result<ProgramReport, WorkflowError> {
        let result = self
            .validate(image.len(), observer)
            .and_then(|()| self.identify(observer))
            .and_then(|id| self.write_and_verify(id, image.as_bytes(), observer));
        self.finish(result, observer)
    }

    /// Like [`run`](Self::run), reading the image from a stream
    ///
    /// `declared_len` is validated before the device is touched; the stream
    /// is read after identification and never past one byte beyond the
    /// device capacity.
    #[cfg(feature = "std")]
    pub fn run_from_reader<R: std::io::Read, O: ProgressObserver + ?Sized>(
        &mut self,
        reader: R,
        declared_len: usize,
        observer: &mut O,
    ) -> Result<ProgramReport, WorkflowError> {
        let result = self
            .validate(declared_len, observer)
            .and_then(|()| self.identify(observer))
            .and_then(|id| {
                let capacity = self.device.geometry().total_size as usize;
                let image = BitstreamImage::from_reader(reader, declared_len, capacity)
                    .map_err(|e| {
                        log::error!("failed to read image: {}", e);
                        WorkflowError::new(FailureKind::ImageReadError, None)
                    })?;
                if image.len() != declared_len {
                    log::warn!(
                        "image stream yielded {} bytes, {} declared",
                        image.len(),
                        declared_len
                    );
                }
                self.validate_len(image.len())?;
                self.write_and_verify(id, image.as_bytes(), observer)
            });
        self.finish(result, observer)
    }

    fn enter<O: ProgressObserver + ?Sized>(&mut self, state: WorkflowState, observer: &mut O) {
        log::debug!("workflow: {} -> {}", self.state, state);
        self.state = state;
        observer.state_changed(state);
    }

    fn validate<O: ProgressObserver + ?Sized>(
        &mut self,
        len: usize,
        observer: &mut O,
    ) -> Result<(), WorkflowError> {
        self.enter(WorkflowState::Validating, observer);
        self.validate_len(len)
    }

    fn validate_len(&self, len: usize) -> Result<(), WorkflowError> {
        let capacity = self.device.geometry().total_size;
        if len as u64 > capacity as u64 {
            return Err(WorkflowError::new(
                FailureKind::SizeExceeded { len, capacity },
                None,
            ));
        }
        Ok(())
    }

    fn identify<O: ProgressObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> Result<JedecId, WorkflowError> {
        self.enter(WorkflowState::Identifying, observer);
        let id = self
            .device
            .identify()
            .map_err(|e| WorkflowError::new(FailureKind::CommunicationError, Some(e)))?;
        if id.looks_absent() {
            log::warn!("flash id {} looks like no chip is connected", id);
        } else {
            log::info!("flash id {}", id);
        }
        observer.device_identified(id);
        Ok(id)
    }

    fn write_and_verify<O: ProgressObserver + ?Sized>(
        &mut self,
        jedec_id: JedecId,
        image: &[u8],
        observer: &mut O,
    ) -> Result<ProgramReport, WorkflowError> {
        let geometry = *self.device.geometry();
        let erase_plan = plan::plan_erase(image.len(), &geometry, self.options.erase_strategy);
        let program_plan = plan::plan_program(image, &geometry);

        // Erase
        self.enter(WorkflowState::Erasing, observer);
        log::info!(
            "erasing {} bytes: {} block(s), {} sector(s){}",
            erase_plan.covered_len(),
            erase_plan.count(EraseGranularity::Block64K),
            erase_plan.count(EraseGranularity::Sector),
            if erase_plan.count(EraseGranularity::Chip) > 0 {
                ", full chip"
            } else {
                ""
            }
        );
        let start = self.device.now_ms();
        for (i, op) in erase_plan.iter().enumerate() {
            log::debug!("erase {} at {:#08x}", op.granularity, op.address);
            self.device.erase(op).map_err(|e| {
                let kind = match e {
                    Error::Communication => FailureKind::CommunicationError,
                    _ => FailureKind::EraseTimeout {
                        address: op.address,
                    },
                };
                WorkflowError::new(kind, Some(e))
            })?;
            observer.progress(OperationKind::Erase, i + 1, erase_plan.len());
        }
        let erase_ms = self.device.now_ms().saturating_sub(start);

        // Program
        self.enter(WorkflowState::Programming, observer);
        log::info!("programming {} page(s)", program_plan.len());
        let interval = self.options.page_report_interval.max(1);
        let total_pages = program_plan.len();
        let start = self.device.now_ms();
        for (i, page) in program_plan.iter().enumerate() {
            self.device.write_page(page.address, page.data).map_err(|e| {
                let kind = match e {
                    Error::Communication => FailureKind::CommunicationError,
                    _ => FailureKind::ProgramError {
                        address: page.address,
                    },
                };
                WorkflowError::new(kind, Some(e))
            })?;
            let done = i + 1;
            if done % interval == 0 || done == total_pages {
                observer.progress(OperationKind::Program, done, total_pages);
            }
        }
        let program_ms = self.device.now_ms().saturating_sub(start);

        // Verify
        let mut chunks_verified = 0;
        let mut verify_ms = 0;
        if self.options.verify {
            self.enter(WorkflowState::Verifying, observer);
            let start = self.device.now_ms();
            let report = verify_image(self.device, image, observer)?;
            verify_ms = self.device.now_ms().saturating_sub(start);
            if !report.is_clean() {
                return Err(WorkflowError::new(
                    FailureKind::VerificationFailed {
                        mismatches: report.mismatches.len(),
                    },
                    None,
                )
                .with_mismatches(report.mismatches));
            }
            chunks_verified = report.chunks_verified;
        } else {
            log::info!("verification skipped");
        }

        Ok(ProgramReport {
            jedec_id,
            image_len: image.len(),
            erase_ops: erase_plan.len(),
            bytes_erased: erase_plan.covered_len(),
            pages_written: total_pages,
            chunks_verified,
            erase_ms,
            program_ms,
            verify_ms,
        })
    }

    fn finish<O: ProgressObserver + ?Sized>(
        &mut self,
        result: Result<ProgramReport, WorkflowError>,
        observer: &mut O,
    ) -> Result<ProgramReport, WorkflowError> {
        match &result {
            Ok(report) => {
                self.enter(WorkflowState::Succeeded, observer);
                log::info!(
                    "wrote {} bytes in {} ms (erase {} ms, program {} ms, verify {} ms)",
                    report.image_len,
                    report.erase_ms + report.program_ms + report.verify_ms,
                    report.erase_ms,
                    report.program_ms,
                    report.verify_ms
                );
            }
            Err(e) => {
                let failed_in = self.state;
                self.enter(WorkflowState::Failed, observer);
                log::error!("{} failed: {}", failed_in, e);
            }
        }
        observer.finished(&result);
        result
    }
}
