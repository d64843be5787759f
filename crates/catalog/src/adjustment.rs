//! Stock adjustment vocabulary and the bucket transition table.
//!
//! The original system encoded the transition table in a database trigger;
//! here it is a pure function (`bucket_deltas`) so the ledger semantics are
//! unit-testable without any store.

use serde::{Deserialize, Serialize};

use tokopos_core::ValueObject;

/// Kind of ledger movement between stock buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentType {
    /// New stock entering the system (production run finished).
    Production,
    /// Stock handed from storage to a cashier.
    Distribution,
    /// Stock coming back from a cashier.
    Return,
    /// Stock rejected at the cashier (quality failure).
    Reject,
    /// Returned stock physically discarded.
    Disposal,
}

impl AdjustmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentType::Production => "production",
            AdjustmentType::Distribution => "distribution",
            AdjustmentType::Return => "return",
            AdjustmentType::Reject => "reject",
            AdjustmentType::Disposal => "disposal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" => Some(AdjustmentType::Production),
            "distribution" => Some(AdjustmentType::Distribution),
            "return" => Some(AdjustmentType::Return),
            "reject" => Some(AdjustmentType::Reject),
            "disposal" => Some(AdjustmentType::Disposal),
            _ => None,
        }
    }
}

/// Physical location an adjustment moves stock from/to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockLocation {
    Production,
    Storage,
    Cashier,
    Disposal,
}

impl StockLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            StockLocation::Production => "production",
            StockLocation::Storage => "storage",
            StockLocation::Cashier => "cashier",
            StockLocation::Disposal => "disposal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" => Some(StockLocation::Production),
            "storage" => Some(StockLocation::Storage),
            "cashier" => Some(StockLocation::Cashier),
            "disposal" => Some(StockLocation::Disposal),
            _ => None,
        }
    }
}

/// Physical condition of the goods being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockCondition {
    Good,
    Damaged,
    Expired,
    Rejected,
}

impl StockCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            StockCondition::Good => "good",
            StockCondition::Damaged => "damaged",
            StockCondition::Expired => "expired",
            StockCondition::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "good" => Some(StockCondition::Good),
            "damaged" => Some(StockCondition::Damaged),
            "expired" => Some(StockCondition::Expired),
            "rejected" => Some(StockCondition::Rejected),
            _ => None,
        }
    }
}

/// Signed effect of one adjustment on the four stock buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDeltas {
    pub storage: i64,
    pub distribution: i64,
    pub returned: i64,
    pub rejected: i64,
}

impl ValueObject for BucketDeltas {}

impl BucketDeltas {
    /// Net stock change across all buckets.
    ///
    /// Zero for transfers, `+quantity` for production (stock entering the
    /// system), `-quantity` for disposal (stock leaving it).
    pub fn net(&self) -> i64 {
        self.storage + self.distribution + self.returned + self.rejected
    }
}

/// The transition table: bucket deltas applied when an adjustment of the
/// given type and quantity is accepted.
///
/// Disposal draws from `returned` — returned goods awaiting a decision are
/// the pile that physically gets discarded; `rejected` is a terminal tally
/// written once at reject time.
pub fn bucket_deltas(adjustment_type: AdjustmentType, quantity: i64) -> BucketDeltas {
    let q = quantity;
    match adjustment_type {
        AdjustmentType::Production => BucketDeltas {
            storage: q,
            distribution: 0,
            returned: 0,
            rejected: 0,
        },
        AdjustmentType::Distribution => BucketDeltas {
            storage: -q,
            distribution: q,
            returned: 0,
            rejected: 0,
        },
        AdjustmentType::Return => BucketDeltas {
            storage: 0,
            distribution: -q,
            returned: q,
            rejected: 0,
        },
        AdjustmentType::Reject => BucketDeltas {
            storage: 0,
            distribution: -q,
            returned: 0,
            rejected: q,
        },
        AdjustmentType::Disposal => BucketDeltas {
            storage: 0,
            distribution: 0,
            returned: -q,
            rejected: 0,
        },
    }
}

/// The single legal (source, target) location pair for each adjustment type.
pub fn legal_route(adjustment_type: AdjustmentType) -> (StockLocation, StockLocation) {
    match adjustment_type {
        AdjustmentType::Production => (StockLocation::Production, StockLocation::Storage),
        AdjustmentType::Distribution => (StockLocation::Storage, StockLocation::Cashier),
        AdjustmentType::Return => (StockLocation::Cashier, StockLocation::Storage),
        AdjustmentType::Reject => (StockLocation::Cashier, StockLocation::Disposal),
        AdjustmentType::Disposal => (StockLocation::Storage, StockLocation::Disposal),
    }
}

/// Whether a condition is compatible with an adjustment type.
///
/// Reject implies `rejected`; fresh movements (production/distribution) must
/// be `good`; returns cover anything a cashier can hand back; disposal covers
/// goods discarded from the returned pile.
pub fn condition_allowed(adjustment_type: AdjustmentType, condition: StockCondition) -> bool {
    match adjustment_type {
        AdjustmentType::Production | AdjustmentType::Distribution => {
            condition == StockCondition::Good
        }
        AdjustmentType::Return => matches!(
            condition,
            StockCondition::Good | StockCondition::Damaged | StockCondition::Expired
        ),
        AdjustmentType::Reject => condition == StockCondition::Rejected,
        AdjustmentType::Disposal => {
            matches!(condition, StockCondition::Damaged | StockCondition::Expired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [AdjustmentType; 5] = [
        AdjustmentType::Production,
        AdjustmentType::Distribution,
        AdjustmentType::Return,
        AdjustmentType::Reject,
        AdjustmentType::Disposal,
    ];

    #[test]
    fn transition_table_matches_trigger_semantics() {
        let d = bucket_deltas(AdjustmentType::Production, 5);
        assert_eq!((d.storage, d.distribution, d.returned, d.rejected), (5, 0, 0, 0));

        let d = bucket_deltas(AdjustmentType::Distribution, 5);
        assert_eq!((d.storage, d.distribution, d.returned, d.rejected), (-5, 5, 0, 0));

        let d = bucket_deltas(AdjustmentType::Return, 5);
        assert_eq!((d.storage, d.distribution, d.returned, d.rejected), (0, -5, 5, 0));

        let d = bucket_deltas(AdjustmentType::Reject, 5);
        assert_eq!((d.storage, d.distribution, d.returned, d.rejected), (0, -5, 0, 5));

        let d = bucket_deltas(AdjustmentType::Disposal, 5);
        assert_eq!((d.storage, d.distribution, d.returned, d.rejected), (0, 0, -5, 0));
    }

    #[test]
    fn conservation_law_per_type() {
        for ty in ALL_TYPES {
            let net = bucket_deltas(ty, 7).net();
            match ty {
                AdjustmentType::Production => assert_eq!(net, 7),
                AdjustmentType::Disposal => assert_eq!(net, -7),
                _ => assert_eq!(net, 0, "transfer {ty:?} must conserve stock"),
            }
        }
    }

    #[test]
    fn each_type_has_exactly_one_legal_route() {
        assert_eq!(
            legal_route(AdjustmentType::Production),
            (StockLocation::Production, StockLocation::Storage)
        );
        assert_eq!(
            legal_route(AdjustmentType::Distribution),
            (StockLocation::Storage, StockLocation::Cashier)
        );
        assert_eq!(
            legal_route(AdjustmentType::Return),
            (StockLocation::Cashier, StockLocation::Storage)
        );
        assert_eq!(
            legal_route(AdjustmentType::Reject),
            (StockLocation::Cashier, StockLocation::Disposal)
        );
        assert_eq!(
            legal_route(AdjustmentType::Disposal),
            (StockLocation::Storage, StockLocation::Disposal)
        );
    }

    #[test]
    fn reject_requires_rejected_condition() {
        assert!(condition_allowed(AdjustmentType::Reject, StockCondition::Rejected));
        assert!(!condition_allowed(AdjustmentType::Reject, StockCondition::Good));
        assert!(!condition_allowed(AdjustmentType::Reject, StockCondition::Damaged));
        assert!(!condition_allowed(AdjustmentType::Reject, StockCondition::Expired));
    }

    #[test]
    fn fresh_movements_require_good_condition() {
        for ty in [AdjustmentType::Production, AdjustmentType::Distribution] {
            assert!(condition_allowed(ty, StockCondition::Good));
            assert!(!condition_allowed(ty, StockCondition::Damaged));
            assert!(!condition_allowed(ty, StockCondition::Expired));
            assert!(!condition_allowed(ty, StockCondition::Rejected));
        }
    }

    #[test]
    fn string_round_trips() {
        for ty in ALL_TYPES {
            assert_eq!(AdjustmentType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(AdjustmentType::parse("restock"), None);
        assert_eq!(StockLocation::parse("storage"), Some(StockLocation::Storage));
        assert_eq!(StockCondition::parse("expired"), Some(StockCondition::Expired));
    }
}
