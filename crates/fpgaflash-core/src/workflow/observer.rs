//! Progress reporting

use super::{Mismatch, ProgramReport, WorkflowError, WorkflowState};
use crate::protocol::JedecId;

/// Unit of work being counted by [`ProgressObserver::progress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Erase operations from the erase plan
    Erase,
    /// Page writes from the program plan
    Program,
    /// Verification read chunks
    Verify,
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Erase => write!(f, "Erasing"),
            Self::Program => write!(f, "Programming"),
            Self::Verify => write!(f, "Verifying"),
        }
    }
}

/// Receiver of workflow progress
///
/// Every method has an empty default. Observers are purely informational:
/// nothing they do can change the outcome of a run.
pub trait ProgressObserver {
    /// The workflow entered `state`
    fn state_changed(&mut self, _state: WorkflowState) {}

    /// RDID answered with `id`
    fn device_identified(&mut self, _id: JedecId) {}

    /// `current` of `total` units of `kind` are done
    fn progress(&mut self, _kind: OperationKind, _current: usize, _total: usize) {}

    /// A verification chunk differed from the image
    fn mismatch(&mut self, _mismatch: &Mismatch) {}

    /// The run ended
    fn finished(&mut self, _result: &Result<ProgramReport, WorkflowError>) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

impl<O: ProgressObserver + ?Sized> ProgressObserver for &mut O {
    fn state_changed(&mut self, state: WorkflowState) {
        (**self).state_changed(state)
    }

    fn device_identified(&mut self, id: JedecId) {
        (**self).device_identified(id)
    }

    fn progress(&mut self, kind: OperationKind, current: usize, total: usize) {
        (**self).progress(kind, current, total)
    }

    fn mismatch(&mut self, mismatch: &Mismatch) {
        (**self).mismatch(mismatch)
    }

    fn finished(&mut self, result: &Result<ProgramReport, WorkflowError>) {
        (**self).finished(result)
    }
}
