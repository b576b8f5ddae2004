pub mod crop;
pub mod detectors;
pub mod filters;
pub mod packet_loss;
pub mod resync;
pub mod simulation;
pub mod timeshift;
pub mod timing;

use crate::error::Stream;

// DIAGNOSTICS -----------------------------------------------------------------

/// Conditions worth reporting to the reviewer that never stop a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Matched-filter response peaks negative first.
    SignalInverted,
    /// Inversion was reverted because the positive response peak was much wider.
    InversionUndone,
    /// Many candidates but a weak response, the channel probably has no artefacts.
    NoRealArtefactSuspected { candidates: usize, ratio: f64 },
    /// External channel deflects upwards and was sign-inverted before scanning.
    ExternalSignalReversed,
    /// An artefact start was seen right at the beginning of the scan window.
    StartedDuringStimulation { index: usize },
    /// Matched-filter response has no positive maximum.
    FlatResponse,
    /// Less than one second of signal precedes the first artefact.
    LeadInTruncated { stream: Stream, missing_seconds: f64 },
}

impl Diagnostic {
    pub(crate) fn emit(&self) {
        match self {
            Diagnostic::SignalInverted => tracing::warn!("signal is inverted"),
            Diagnostic::InversionUndone => tracing::warn!("inversion undone"),
            Diagnostic::NoRealArtefactSuspected { candidates, ratio } => tracing::warn!(
                candidates,
                ratio,
                "probably the LFP signal did NOT contain any artefacts, many incorrect timings could be returned"
            ),
            Diagnostic::ExternalSignalReversed => {
                tracing::warn!("external signal is reversed, inverting it before detection")
            }
            Diagnostic::StartedDuringStimulation { index } => tracing::warn!(
                index,
                "artefact found at the very start of the window, the recording probably started during stimulation"
            ),
            Diagnostic::FlatResponse => {
                tracing::warn!("kernel response has no positive maximum, no artefact can be found")
            }
            Diagnostic::LeadInTruncated {
                stream,
                missing_seconds,
            } => tracing::warn!(
                %stream,
                missing_seconds,
                "first artefact is less than one second into the recording, cropping from the first sample"
            ),
        }
    }
}

/// Records a diagnostic and logs it.
pub(crate) fn push_diagnostic(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    diagnostic.emit();
    diagnostics.push(diagnostic);
}
