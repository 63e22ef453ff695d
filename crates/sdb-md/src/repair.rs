//! OHLC repair.
//!
//! A bar violates OHLC consistency when its high sits below open or close, or
//! its low sits above open or close. Violating bars are widened in place
//! (`high = max(open, close, high)`, `low = min(open, close, low)`), never
//! dropped. Batch order is preserved.

use crate::provider::RawBar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub total: usize,
    pub repaired: usize,
}

pub fn violates(bar: &RawBar) -> bool {
    bar.high < bar.open || bar.high < bar.close || bar.low > bar.open || bar.low > bar.close
}

/// Repair every violating bar in `bars`; returns how many were touched.
pub fn repair_batch(bars: &mut [RawBar]) -> RepairReport {
    let mut repaired = 0;
    for bar in bars.iter_mut() {
        if violates(bar) {
            bar.high = bar.open.max(bar.close).max(bar.high);
            bar.low = bar.open.min(bar.close).min(bar.low);
            repaired += 1;
        }
    }
    RepairReport {
        total: bars.len(),
        repaired,
    }
}
