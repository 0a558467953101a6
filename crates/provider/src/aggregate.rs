use sli_core::{SliResult, Verdict};

/// Overall verdict for a batch: pass when nothing failed (including an empty
/// batch), fail when everything failed, warning otherwise.
pub fn aggregate(results: &[SliResult]) -> Verdict {
    let failed = results.iter().filter(|r| !r.success).count();

    if failed == 0 {
        Verdict::Pass
    } else if failed < results.len() {
        Verdict::Warning
    } else {
        Verdict::Fail
    }
}
