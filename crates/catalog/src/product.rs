use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tokopos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use tokopos_events::Event;

use crate::adjustment::{
    bucket_deltas, condition_allowed, legal_route, AdjustmentType, BucketDeltas, StockCondition,
    StockLocation,
};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// The four stock counters maintained per product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBuckets {
    pub storage: i64,
    pub distribution: i64,
    pub returned: i64,
    pub rejected: i64,
}

impl StockBuckets {
    pub fn total(&self) -> i64 {
        self.storage + self.distribution + self.returned + self.rejected
    }

    /// Apply deltas, refusing any application that would drive a bucket
    /// negative. Returns the bucket that would have underflowed.
    pub fn checked_apply(&self, deltas: BucketDeltas) -> Result<StockBuckets, &'static str> {
        let next = StockBuckets {
            storage: self.storage + deltas.storage,
            distribution: self.distribution + deltas.distribution,
            returned: self.returned + deltas.returned,
            rejected: self.rejected + deltas.rejected,
        };
        if next.storage < 0 {
            return Err("storage");
        }
        if next.distribution < 0 {
            return Err("distribution");
        }
        if next.returned < 0 {
            return Err("returned");
        }
        if next.rejected < 0 {
            return Err("rejected");
        }
        Ok(next)
    }
}

/// Aggregate root: Product. Owns the catalog entry and its stock ledger;
/// the bucket counters are derived state replayable from `StockAdjusted`
/// and `DistributionReversed` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    category: Option<String>,
    price_cents: i64,
    buckets: StockBuckets,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            sku: String::new(),
            name: String::new(),
            category: None,
            price_cents: 0,
            buckets: StockBuckets::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn price_cents(&self) -> i64 {
        self.price_cents
    }

    pub fn buckets(&self) -> StockBuckets {
        self.buckets
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordAdjustment. Carries the caller-supplied route so the
/// aggregate can reject movements that do not match the adjustment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAdjustment {
    pub product_id: ProductId,
    pub adjustment_id: Uuid,
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub condition: StockCondition,
    pub source_location: StockLocation,
    pub target_location: StockLocation,
    pub notes: Option<String>,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseDistribution. Issued when a pending distribution is
/// cancelled; puts the reserved quantity back into storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseDistribution {
    pub product_id: ProductId,
    pub distribution_id: AggregateId,
    pub quantity: i64,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    RegisterProduct(RegisterProduct),
    RecordAdjustment(RecordAdjustment),
    ReverseDistribution(ReverseDistribution),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted. The deltas are recomputed from type and quantity
/// at apply time, so replay stays in lockstep with the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub adjustment_id: Uuid,
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub condition: StockCondition,
    pub source_location: StockLocation,
    pub target_location: StockLocation,
    pub notes: Option<String>,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DistributionReversed. Deliberately distinct from `StockAdjusted`
/// so a cancellation never masquerades as a return in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReversed {
    pub product_id: ProductId,
    pub distribution_id: AggregateId,
    pub quantity: i64,
    pub performed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductRegistered(ProductRegistered),
    StockAdjusted(StockAdjusted),
    DistributionReversed(DistributionReversed),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductRegistered(_) => "catalog.product.registered",
            ProductEvent::StockAdjusted(_) => "catalog.product.stock_adjusted",
            ProductEvent::DistributionReversed(_) => "catalog.product.distribution_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductRegistered(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::DistributionReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.price_cents = e.price_cents;
                self.buckets = StockBuckets::default();
                self.created = true;
            }
            ProductEvent::StockAdjusted(e) => {
                let deltas = bucket_deltas(e.adjustment_type, e.quantity);
                self.buckets.storage += deltas.storage;
                self.buckets.distribution += deltas.distribution;
                self.buckets.returned += deltas.returned;
                self.buckets.rejected += deltas.rejected;
            }
            ProductEvent::DistributionReversed(e) => {
                self.buckets.storage += e.quantity;
                self.buckets.distribution -= e.quantity;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            ProductCommand::RecordAdjustment(cmd) => self.handle_adjustment(cmd),
            ProductCommand::ReverseDistribution(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already registered"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.price_cents < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(vec![ProductEvent::ProductRegistered(ProductRegistered {
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            price_cents: cmd.price_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjustment(&self, cmd: &RecordAdjustment) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let (source, target) = legal_route(cmd.adjustment_type);
        if (cmd.source_location, cmd.target_location) != (source, target) {
            return Err(DomainError::invalid_transition(format!(
                "{} must move {} -> {}, got {} -> {}",
                cmd.adjustment_type.as_str(),
                source.as_str(),
                target.as_str(),
                cmd.source_location.as_str(),
                cmd.target_location.as_str(),
            )));
        }

        if !condition_allowed(cmd.adjustment_type, cmd.condition) {
            return Err(DomainError::invalid_transition(format!(
                "condition {} not allowed for {}",
                cmd.condition.as_str(),
                cmd.adjustment_type.as_str(),
            )));
        }

        let deltas = bucket_deltas(cmd.adjustment_type, cmd.quantity);
        if let Err(bucket) = self.buckets.checked_apply(deltas) {
            return Err(DomainError::insufficient_stock(format!(
                "{} of {} would drive {} below zero",
                cmd.adjustment_type.as_str(),
                cmd.quantity,
                bucket,
            )));
        }

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            adjustment_id: cmd.adjustment_id,
            adjustment_type: cmd.adjustment_type,
            quantity: cmd.quantity,
            condition: cmd.condition,
            source_location: cmd.source_location,
            target_location: cmd.target_location,
            notes: cmd.notes.clone(),
            performed_by: cmd.performed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseDistribution) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.buckets.distribution < cmd.quantity {
            return Err(DomainError::insufficient_stock(format!(
                "cannot reverse {} units, only {} in distribution",
                cmd.quantity, self.buckets.distribution,
            )));
        }

        Ok(vec![ProductEvent::DistributionReversed(DistributionReversed {
            product_id: cmd.product_id,
            distribution_id: cmd.distribution_id,
            quantity: cmd.quantity,
            performed_by: cmd.performed_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_user_id() -> UserId {
        UserId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_product() -> Product {
        let mut product = Product::empty(test_product_id());
        let cmd = RegisterProduct {
            product_id: product.id_typed(),
            sku: "KOPI-001".to_string(),
            name: "Kopi Susu Botol".to_string(),
            category: Some("beverage".to_string()),
            price_cents: 15000,
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::RegisterProduct(cmd)).unwrap();
        product.apply(&events[0]);
        product
    }

    fn adjustment(
        product: &Product,
        adjustment_type: AdjustmentType,
        quantity: i64,
        condition: StockCondition,
    ) -> RecordAdjustment {
        let (source, target) = legal_route(adjustment_type);
        RecordAdjustment {
            product_id: product.id_typed(),
            adjustment_id: Uuid::now_v7(),
            adjustment_type,
            quantity,
            condition,
            source_location: source,
            target_location: target,
            notes: None,
            performed_by: test_user_id(),
            occurred_at: test_time(),
        }
    }

    fn apply_adjustment(
        product: &mut Product,
        adjustment_type: AdjustmentType,
        quantity: i64,
        condition: StockCondition,
    ) {
        let cmd = adjustment(product, adjustment_type, quantity, condition);
        let events = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap();
        for event in &events {
            product.apply(event);
        }
    }

    #[test]
    fn register_product_emits_registered_event() {
        let product = Product::empty(test_product_id());
        let product_id = product.id_typed();
        let cmd = RegisterProduct {
            product_id,
            sku: "KOPI-001".to_string(),
            name: "Kopi Susu Botol".to_string(),
            category: None,
            price_cents: 15000,
            occurred_at: test_time(),
        };

        let events = product.handle(&ProductCommand::RegisterProduct(cmd)).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ProductEvent::ProductRegistered(e) => {
                assert_eq!(e.product_id, product_id);
                assert_eq!(e.sku, "KOPI-001");
                assert_eq!(e.name, "Kopi Susu Botol");
            }
            _ => panic!("Expected ProductRegistered event"),
        }
    }

    #[test]
    fn register_product_rejects_empty_sku() {
        let product = Product::empty(test_product_id());
        let cmd = RegisterProduct {
            product_id: product.id_typed(),
            sku: "   ".to_string(),
            name: "Kopi Susu Botol".to_string(),
            category: None,
            price_cents: 15000,
            occurred_at: test_time(),
        };

        let err = product.handle(&ProductCommand::RegisterProduct(cmd)).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty SKU"),
        }
    }

    #[test]
    fn register_product_rejects_duplicate_registration() {
        let product = registered_product();
        let cmd = RegisterProduct {
            product_id: product.id_typed(),
            sku: "KOPI-002".to_string(),
            name: "Another".to_string(),
            category: None,
            price_cents: 10000,
            occurred_at: test_time(),
        };

        let err = product.handle(&ProductCommand::RegisterProduct(cmd)).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for duplicate registration"),
        }
    }

    #[test]
    fn production_then_distribution_then_return_updates_buckets() {
        let mut product = registered_product();

        apply_adjustment(&mut product, AdjustmentType::Production, 100, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Distribution, 30, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Return, 10, StockCondition::Good);

        let buckets = product.buckets();
        assert_eq!(buckets.storage, 70);
        assert_eq!(buckets.distribution, 20);
        assert_eq!(buckets.returned, 10);
        assert_eq!(buckets.rejected, 0);
        assert_eq!(buckets.total(), 100);
    }

    #[test]
    fn reject_moves_from_distribution_to_rejected_tally() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 50, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Distribution, 20, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Reject, 5, StockCondition::Rejected);

        let buckets = product.buckets();
        assert_eq!(buckets.storage, 30);
        assert_eq!(buckets.distribution, 15);
        assert_eq!(buckets.rejected, 5);
    }

    #[test]
    fn disposal_draws_from_returned_stock() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 50, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Distribution, 20, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Return, 8, StockCondition::Damaged);
        apply_adjustment(&mut product, AdjustmentType::Disposal, 8, StockCondition::Damaged);

        let buckets = product.buckets();
        assert_eq!(buckets.returned, 0);
        assert_eq!(buckets.total(), 42);
    }

    #[test]
    fn distribution_exceeding_storage_is_rejected() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 10, StockCondition::Good);

        let cmd = adjustment(&product, AdjustmentType::Distribution, 11, StockCondition::Good);
        let err = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap_err();
        match err {
            DomainError::InsufficientStock(_) => {}
            _ => panic!("Expected InsufficientStock error"),
        }
        // Failed command leaves the ledger untouched.
        assert_eq!(product.buckets().storage, 10);
    }

    #[test]
    fn disposal_exceeding_returned_is_rejected() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 10, StockCondition::Good);

        let cmd = adjustment(&product, AdjustmentType::Disposal, 1, StockCondition::Expired);
        let err = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap_err();
        match err {
            DomainError::InsufficientStock(_) => {}
            _ => panic!("Expected InsufficientStock error"),
        }
    }

    #[test]
    fn adjustment_with_wrong_route_is_rejected() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 10, StockCondition::Good);

        let mut cmd = adjustment(&product, AdjustmentType::Distribution, 5, StockCondition::Good);
        cmd.target_location = StockLocation::Disposal;

        let err = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap_err();
        match err {
            DomainError::InvalidTransition(_) => {}
            _ => panic!("Expected InvalidTransition error for illegal route"),
        }
    }

    #[test]
    fn adjustment_with_incompatible_condition_is_rejected() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 10, StockCondition::Good);

        let cmd = adjustment(&product, AdjustmentType::Distribution, 5, StockCondition::Damaged);
        let err = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap_err();
        match err {
            DomainError::InvalidTransition(_) => {}
            _ => panic!("Expected InvalidTransition error for bad condition"),
        }
    }

    #[test]
    fn zero_quantity_adjustment_is_rejected() {
        let product = registered_product();
        let cmd = adjustment(&product, AdjustmentType::Production, 0, StockCondition::Good);
        let err = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero quantity"),
        }
    }

    #[test]
    fn adjustment_on_unregistered_product_is_not_found() {
        let product = Product::empty(test_product_id());
        let cmd = adjustment(&product, AdjustmentType::Production, 5, StockCondition::Good);
        let err = product.handle(&ProductCommand::RecordAdjustment(cmd)).unwrap_err();
        match err {
            DomainError::NotFound => {}
            _ => panic!("Expected NotFound for unregistered product"),
        }
    }

    #[test]
    fn reverse_distribution_restores_storage() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 40, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Distribution, 15, StockCondition::Good);

        let cmd = ReverseDistribution {
            product_id: product.id_typed(),
            distribution_id: AggregateId::new(),
            quantity: 15,
            performed_by: test_user_id(),
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::ReverseDistribution(cmd)).unwrap();
        product.apply(&events[0]);

        let buckets = product.buckets();
        assert_eq!(buckets.storage, 40);
        assert_eq!(buckets.distribution, 0);
    }

    #[test]
    fn reverse_distribution_exceeding_outstanding_is_rejected() {
        let mut product = registered_product();
        apply_adjustment(&mut product, AdjustmentType::Production, 40, StockCondition::Good);
        apply_adjustment(&mut product, AdjustmentType::Distribution, 10, StockCondition::Good);

        let cmd = ReverseDistribution {
            product_id: product.id_typed(),
            distribution_id: AggregateId::new(),
            quantity: 11,
            performed_by: test_user_id(),
            occurred_at: test_time(),
        };
        let err = product.handle(&ProductCommand::ReverseDistribution(cmd)).unwrap_err();
        match err {
            DomainError::InsufficientStock(_) => {}
            _ => panic!("Expected InsufficientStock when reversing more than outstanding"),
        }
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn adjustment_type_strategy() -> impl Strategy<Value = AdjustmentType> {
            prop_oneof![
                Just(AdjustmentType::Production),
                Just(AdjustmentType::Distribution),
                Just(AdjustmentType::Return),
                Just(AdjustmentType::Reject),
                Just(AdjustmentType::Disposal),
            ]
        }

        fn default_condition(adjustment_type: AdjustmentType) -> StockCondition {
            match adjustment_type {
                AdjustmentType::Reject => StockCondition::Rejected,
                AdjustmentType::Disposal => StockCondition::Damaged,
                _ => StockCondition::Good,
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: no accepted sequence of adjustments ever drives a
            /// bucket negative, and transfers conserve total stock.
            #[test]
            fn accepted_adjustments_preserve_ledger_invariants(
                ops in prop::collection::vec((adjustment_type_strategy(), 1i64..50), 0..40)
            ) {
                let mut product = registered_product();

                for (ty, qty) in ops {
                    let total_before = product.buckets().total();
                    let cmd = adjustment(&product, ty, qty, default_condition(ty));
                    match product.handle(&ProductCommand::RecordAdjustment(cmd)) {
                        Ok(events) => {
                            for event in &events {
                                product.apply(event);
                            }
                            let b = product.buckets();
                            prop_assert!(b.storage >= 0);
                            prop_assert!(b.distribution >= 0);
                            prop_assert!(b.returned >= 0);
                            prop_assert!(b.rejected >= 0);
                            let expected = match ty {
                                AdjustmentType::Production => total_before + qty,
                                AdjustmentType::Disposal => total_before - qty,
                                _ => total_before,
                            };
                            prop_assert_eq!(b.total(), expected);
                        }
                        Err(DomainError::InsufficientStock(_)) => {
                            prop_assert_eq!(product.buckets().total(), total_before);
                        }
                        Err(other) => {
                            return Err(TestCaseError::fail(format!("unexpected error: {other}")));
                        }
                    }
                }
            }

            /// Property: handle is pure (same state + command = same outcome,
            /// state untouched).
            #[test]
            fn handle_is_deterministic(qty in 1i64..1000) {
                let mut product = registered_product();
                apply_adjustment(&mut product, AdjustmentType::Production, 1000, StockCondition::Good);

                let state_before = product.clone();
                let cmd = adjustment(&product, AdjustmentType::Distribution, qty, StockCondition::Good);

                let events1 = product.handle(&ProductCommand::RecordAdjustment(cmd.clone()));
                let events2 = product.handle(&ProductCommand::RecordAdjustment(cmd));

                prop_assert_eq!(&state_before, &product);
                prop_assert_eq!(events1.unwrap(), events2.unwrap());
            }

            /// Property: replaying the same events yields the same state.
            #[test]
            fn apply_is_deterministic(
                ops in prop::collection::vec(1i64..30, 1..10)
            ) {
                let template = registered_product();
                let user = test_user_id();
                let events: Vec<ProductEvent> = ops
                    .iter()
                    .map(|qty| {
                        ProductEvent::StockAdjusted(StockAdjusted {
                            product_id: template.id_typed(),
                            adjustment_id: Uuid::now_v7(),
                            adjustment_type: AdjustmentType::Production,
                            quantity: *qty,
                            condition: StockCondition::Good,
                            source_location: StockLocation::Production,
                            target_location: StockLocation::Storage,
                            notes: None,
                            performed_by: user,
                            occurred_at: Utc::now(),
                        })
                    })
                    .collect();

                let mut p1 = template.clone();
                let mut p2 = template.clone();
                for event in &events {
                    p1.apply(event);
                    p2.apply(event);
                }

                prop_assert_eq!(&p1, &p2);
                prop_assert_eq!(p1.buckets().storage, template.buckets().storage + ops.iter().sum::<i64>());
            }
        }
    }
}
