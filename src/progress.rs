//! Progress reporting with indicatif progress bars

use fpgaflash_core::protocol::JedecId;
use fpgaflash_core::workflow::{
    Mismatch, OperationKind, ProgramReport, ProgressObserver, WorkflowError, WorkflowState,
};
use indicatif::{ProgressBar, ProgressStyle};

/// Observer drawing one bar per workflow phase
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
    phase: Option<OperationKind>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            current_bar: None,
            phase: None,
        }
    }

    fn create_bar(&mut self, kind: OperationKind, total: usize) {
        self.finish();
        let unit = match kind {
            OperationKind::Erase => "ops",
            OperationKind::Program => "pages",
            OperationKind::Verify => "chunks",
        };
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}}) {}",
                    unit, kind
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.phase = Some(kind);
        self.current_bar = Some(pb);
    }

    /// Complete the current bar, if any
    pub fn finish(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish();
        }
        self.phase = None;
    }

    fn println(&self, line: String) {
        match &self.current_bar {
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for IndicatifProgress {
    fn state_changed(&mut self, state: WorkflowState) {
        log::debug!("workflow: {}", state);
        if state.is_terminal() {
            self.finish();
        }
    }

    fn device_identified(&mut self, id: JedecId) {
        self.println(format!("JEDEC ID: {}", id));
    }

    fn progress(&mut self, kind: OperationKind, current: usize, total: usize) {
        if self.phase != Some(kind) || self.current_bar.is_none() {
            self.create_bar(kind, total);
        }
        if let Some(pb) = &self.current_bar {
            pb.set_position(current as u64);
        }
    }

    fn mismatch(&mut self, mismatch: &Mismatch) {
        self.println(format_mismatch(mismatch));
    }

    fn finished(&mut self, _result: &Result<ProgramReport, WorkflowError>) {
        self.finish();
    }
}

/// One-line description of a mismatching chunk
pub fn format_mismatch(mismatch: &Mismatch) -> String {
    format!(
        "Mismatch in chunk at 0x{:06X}: expected {} got {}",
        mismatch.offset,
        hex(&mismatch.expected),
        hex(&mismatch.actual)
    )
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
