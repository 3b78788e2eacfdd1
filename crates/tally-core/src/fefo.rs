//! # FEFO Deduction Planning
//!
//! First-expiry-first-out: the batch that expires soonest is sold first.
//!
//! ```text
//! requested: 15
//!
//!   batch A  exp 2024-01-01  qty 10  ──► take 10 ──► qty 0   sold_out
//!   batch B  exp 2024-02-01  qty 10  ──► take  5 ──► qty 5   active
//!   batch C  exp 2024-03-01  qty 10      (untouched)
//! ```
//!
//! Planning is pure. The checkout engine executes the steps one at a time
//! against the directory and stops at the first failed write.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{BatchStatus, InventoryBatch};

/// One write-back against one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BatchDeduction {
    pub batch_id: String,
    /// Units taken from this batch.
    pub taken: i64,
    /// Quantity to write back.
    pub new_quantity: i64,
    /// Status to write back; `SoldOut` exactly when `new_quantity` is zero.
    pub new_status: BatchStatus,
}

/// Ordered write-backs for one cart line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeductionPlan {
    pub steps: Vec<BatchDeduction>,
    /// Units that no batch could cover.
    pub shortfall: i64,
}

impl DeductionPlan {
    pub fn total_taken(&self) -> i64 {
        self.steps.iter().map(|s| s.taken).sum()
    }

    pub fn is_satisfied(&self) -> bool {
        self.shortfall == 0
    }
}

/// Plans how `requested` units are drawn from `batches`.
///
/// Batches are consumed in ascending expiry order (ties broken by creation
/// time, then id). Batches that are sold out or empty are skipped.
pub fn plan_deduction(batches: &[InventoryBatch], requested: i64) -> DeductionPlan {
    let mut ordered: Vec<&InventoryBatch> = batches.iter().filter(|b| b.is_available()).collect();
    ordered.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut remaining = requested.max(0);
    let mut steps = Vec::new();

    for batch in ordered {
        if remaining == 0 {
            break;
        }
        let taken = remaining.min(batch.quantity);
        let new_quantity = batch.quantity - taken;
        steps.push(BatchDeduction {
            batch_id: batch.id.clone(),
            taken,
            new_quantity,
            new_status: BatchStatus::for_quantity(new_quantity),
        });
        remaining -= taken;
    }

    DeductionPlan {
        steps,
        shortfall: remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn batch(id: &str, quantity: i64, expiry: (i32, u32, u32)) -> InventoryBatch {
        let created = Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap();
        InventoryBatch {
            id: id.to_string(),
            product_id: "p-1".to_string(),
            shop_id: "s-1".to_string(),
            quantity,
            price_cents: 100,
            discount_bps: 0,
            expiry_date: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2).unwrap(),
            status: BatchStatus::for_quantity(quantity),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_oldest_expiry_consumed_first() {
        let batches = vec![
            batch("jan", 10, (2024, 1, 1)),
            batch("feb", 10, (2024, 2, 1)),
        ];

        let plan = plan_deduction(&batches, 15);

        assert_eq!(
            plan.steps,
            vec![
                BatchDeduction {
                    batch_id: "jan".to_string(),
                    taken: 10,
                    new_quantity: 0,
                    new_status: BatchStatus::SoldOut,
                },
                BatchDeduction {
                    batch_id: "feb".to_string(),
                    taken: 5,
                    new_quantity: 5,
                    new_status: BatchStatus::Active,
                },
            ]
        );
        assert_eq!(plan.total_taken(), 15);
        assert!(plan.is_satisfied());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let batches = vec![
            batch("mar", 10, (2024, 3, 1)),
            batch("jan", 3, (2024, 1, 1)),
        ];

        let plan = plan_deduction(&batches, 4);
        assert_eq!(plan.steps[0].batch_id, "jan");
        assert_eq!(plan.steps[1].batch_id, "mar");
        assert_eq!(plan.steps[1].new_quantity, 9);
    }

    #[test]
    fn test_stops_once_satisfied() {
        let batches = vec![
            batch("a", 10, (2024, 1, 1)),
            batch("b", 10, (2024, 2, 1)),
        ];
        let plan = plan_deduction(&batches, 10);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].new_status, BatchStatus::SoldOut);
    }

    #[test]
    fn test_shortfall_when_batches_run_out() {
        let batches = vec![batch("a", 2, (2024, 1, 1)), batch("b", 1, (2024, 2, 1))];
        let plan = plan_deduction(&batches, 5);
        assert_eq!(plan.total_taken(), 3);
        assert_eq!(plan.shortfall, 2);
        assert!(!plan.is_satisfied());
    }

    #[test]
    fn test_skips_sold_out_batches() {
        let mut dead = batch("dead", 5, (2023, 12, 1));
        dead.status = BatchStatus::SoldOut;
        let batches = vec![dead, batch("live", 5, (2024, 1, 1))];

        let plan = plan_deduction(&batches, 2);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].batch_id, "live");
    }

    #[test]
    fn test_same_expiry_uses_creation_order() {
        let mut older = batch("z-older", 1, (2024, 1, 1));
        older.created_at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let newer = batch("a-newer", 1, (2024, 1, 1));

        let plan = plan_deduction(&[newer, older], 1);
        assert_eq!(plan.steps[0].batch_id, "z-older");
    }

    #[test]
    fn test_zero_requested_is_empty_plan() {
        let plan = plan_deduction(&[batch("a", 5, (2024, 1, 1))], 0);
        assert!(plan.steps.is_empty());
        assert_eq!(plan.shortfall, 0);
    }
}
