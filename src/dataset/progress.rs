/// Progress update emitted while building a feature matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixProgress {
    /// Rows finished so far, failed ones included.
    pub processed: usize,
    pub total: usize,
    /// Rows dropped under the skip-and-log policy.
    pub skipped: usize,
}

pub(super) fn progress_tick(
    progress: &mut Option<&mut dyn FnMut(MatrixProgress)>,
    processed: usize,
    total: usize,
    skipped: usize,
) {
    if let Some(callback) = progress.as_deref_mut() {
        callback(MatrixProgress {
            processed,
            total,
            skipped,
        });
    }
}
