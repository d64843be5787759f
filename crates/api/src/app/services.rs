use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use tokopos_catalog::{
    AdjustmentType, Product, ProductCommand, ProductId, ReverseDistribution, StockCondition,
};
use tokopos_core::{Aggregate, AggregateId, DomainError, UserId};
use tokopos_distribution::{
    CancelDistribution, DistributionCommand, DistributionEvent, DistributionId, DistributionStatus,
    ProductDistribution,
};
use tokopos_events::{EventBus, EventEnvelope, InMemoryEventBus};
use tokopos_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{
        AdjustmentRecord, DistributionView, DistributionsProjection, ProductStockProjection,
        ProductView, StockHistoryProjection,
    },
    read_model::InMemoryReadStore,
};

pub const PRODUCT_AGGREGATE: &str = "catalog.product";
pub const DISTRIBUTION_AGGREGATE: &str = "distribution";

type InMemoryDispatcher = CommandDispatcher<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
>;

type ProductsProjection = ProductStockProjection<Arc<InMemoryReadStore<ProductId, ProductView>>>;
type HistoryProjection = StockHistoryProjection<Arc<InMemoryReadStore<Uuid, AdjustmentRecord>>>;
type DistributionsProj =
    DistributionsProjection<Arc<InMemoryReadStore<DistributionId, DistributionView>>>;

/// Wired application services: dispatcher + projections backed by the
/// in-memory event store and bus.
#[derive(Clone)]
pub struct AppServices {
    dispatcher: Arc<InMemoryDispatcher>,
    products_projection: Arc<ProductsProjection>,
    history_projection: Arc<HistoryProjection>,
    distributions_projection: Arc<DistributionsProj>,
}

pub fn build_services() -> AppServices {
    // In-memory infra wiring: store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    let products_projection: Arc<ProductsProjection> =
        Arc::new(ProductStockProjection::new(Arc::new(InMemoryReadStore::new())));
    let history_projection: Arc<HistoryProjection> =
        Arc::new(StockHistoryProjection::new(Arc::new(InMemoryReadStore::new())));
    let distributions_projection: Arc<DistributionsProj> =
        Arc::new(DistributionsProjection::new(Arc::new(InMemoryReadStore::new())));

    // Background subscriber: bus -> projections
    {
        let sub = bus.subscribe();
        let products_projection = products_projection.clone();
        let history_projection = history_projection.clone();
        let distributions_projection = distributions_projection.clone();
        tokio::task::spawn_blocking(move || loop {
            match sub.recv() {
                Ok(env) => {
                    let at = env.aggregate_type();

                    // Apply to the relevant projection(s) only.
                    let apply_ok = match at {
                        PRODUCT_AGGREGATE => {
                            if let Err(e) = products_projection.apply_envelope(&env) {
                                Err(format!("{e:?}"))
                            } else if let Err(e) = history_projection.apply_envelope(&env) {
                                Err(format!("{e:?}"))
                            } else {
                                Ok(())
                            }
                        }
                        DISTRIBUTION_AGGREGATE => distributions_projection
                            .apply_envelope(&env)
                            .map_err(|e| format!("{e:?}")),
                        _ => Ok(()),
                    };

                    if let Err(e) = apply_ok {
                        tracing::warn!("projection apply failed: {e}");
                    }
                }
                Err(_) => break,
            }
        });
    }

    let dispatcher: Arc<InMemoryDispatcher> =
        Arc::new(CommandDispatcher::new(store, bus));

    AppServices {
        dispatcher,
        products_projection,
        history_projection,
        distributions_projection,
    }
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: tokopos_core::Aggregate<Error = DomainError>,
        A::Event: tokopos_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn product_get(&self, product_id: &ProductId) -> Option<ProductView> {
        self.products_projection.get(product_id)
    }

    pub fn product_list(&self) -> Vec<ProductView> {
        self.products_projection.list()
    }

    pub fn product_find_by_sku(&self, sku: &str) -> Option<ProductView> {
        self.products_projection.find_by_sku(sku)
    }

    pub fn adjustments_list(
        &self,
        product_id: Option<ProductId>,
        adjustment_type: Option<AdjustmentType>,
    ) -> Vec<AdjustmentRecord> {
        self.history_projection.list(product_id, adjustment_type)
    }

    pub fn distribution_get(&self, distribution_id: &DistributionId) -> Option<DistributionView> {
        self.distributions_projection.get(distribution_id)
    }

    pub fn distribution_list(&self, status: Option<DistributionStatus>) -> Vec<DistributionView> {
        self.distributions_projection.list(status)
    }

    /// Create a distribution: the stock movement commits first, then the
    /// workflow record. If the workflow create fails after stock moved, the
    /// movement is compensated with a reversal so the ledger never drifts.
    pub fn create_distribution(
        &self,
        adjustment: tokopos_catalog::RecordAdjustment,
        create: tokopos_distribution::CreateDistribution,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        debug_assert_eq!(adjustment.adjustment_type, AdjustmentType::Distribution);

        let product_id = adjustment.product_id;
        let quantity = adjustment.quantity;
        let performed_by = adjustment.performed_by;
        let occurred_at = adjustment.occurred_at;

        self.dispatch::<Product>(
            product_id.0,
            PRODUCT_AGGREGATE,
            ProductCommand::RecordAdjustment(adjustment),
            |id| Product::empty(ProductId::new(id)),
        )?;

        let distribution_id = create.distribution_id;
        match self.dispatch::<ProductDistribution>(
            distribution_id.0,
            DISTRIBUTION_AGGREGATE,
            DistributionCommand::CreateDistribution(create),
            |id| ProductDistribution::empty(DistributionId::new(id)),
        ) {
            Ok(committed) => Ok(committed),
            Err(e) => {
                // Put the stock back; the movement already committed.
                let compensate = ReverseDistribution {
                    product_id,
                    distribution_id: distribution_id.0,
                    quantity,
                    performed_by,
                    occurred_at,
                };
                if let Err(comp_err) = self.dispatch::<Product>(
                    product_id.0,
                    PRODUCT_AGGREGATE,
                    ProductCommand::ReverseDistribution(compensate),
                    |id| Product::empty(ProductId::new(id)),
                ) {
                    tracing::error!(
                        distribution_id = %distribution_id,
                        "failed to compensate stock after create failure: {comp_err:?}"
                    );
                }
                Err(e)
            }
        }
    }

    /// Cancel a pending distribution and return its reserved stock to
    /// storage. The stock reversal commits before the workflow record
    /// changes: if the distribution bucket cannot cover the reversal the
    /// cancel is refused outright and the record stays as it was.
    pub fn cancel_distribution(
        &self,
        distribution_id: DistributionId,
        cancelled_by: UserId,
        occurred_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let cancel = CancelDistribution {
            distribution_id,
            cancelled_by,
            occurred_at,
        };

        // Decide the cancellation against current workflow state without
        // committing it, so we learn the product and quantity up front and
        // reject non-cancellable distributions before any stock moves.
        let workflow = self.dispatcher.load_aggregate::<ProductDistribution>(
            distribution_id.0,
            |id| ProductDistribution::empty(DistributionId::new(id)),
        )?;
        let decided = workflow
            .handle(&DistributionCommand::CancelDistribution(cancel.clone()))
            .map_err(DispatchError::from)?;

        let Some(DistributionEvent::DistributionCancelled(cancelled)) = decided
            .iter()
            .find(|e| matches!(e, DistributionEvent::DistributionCancelled(_)))
        else {
            return Err(DispatchError::from(DomainError::invalid_transition(
                "cancel decided no cancellation event",
            )));
        };
        let product_id = cancelled.product_id;
        let quantity = cancelled.quantity;

        // Stock first. If the reversal overdraws the distribution bucket
        // this fails here with both streams untouched.
        let reverse = ReverseDistribution {
            product_id,
            distribution_id: distribution_id.0,
            quantity,
            performed_by: cancelled_by,
            occurred_at,
        };
        self.dispatch::<Product>(
            product_id.0,
            PRODUCT_AGGREGATE,
            ProductCommand::ReverseDistribution(reverse),
            |id| Product::empty(ProductId::new(id)),
        )?;

        match self.dispatch::<ProductDistribution>(
            distribution_id.0,
            DISTRIBUTION_AGGREGATE,
            DistributionCommand::CancelDistribution(cancel),
            |id| ProductDistribution::empty(DistributionId::new(id)),
        ) {
            Ok(committed) => Ok(committed),
            Err(e) => {
                // A concurrent writer beat us to the workflow stream. The
                // reversal already committed, so move the stock back out.
                let redo = distribution_adjustment(
                    product_id,
                    quantity,
                    cancelled_by,
                    occurred_at,
                );
                if let Err(comp_err) = self.dispatch::<Product>(
                    product_id.0,
                    PRODUCT_AGGREGATE,
                    ProductCommand::RecordAdjustment(redo),
                    |id| Product::empty(ProductId::new(id)),
                ) {
                    tracing::error!(
                        distribution_id = %distribution_id,
                        "failed to compensate stock after cancel failure: {comp_err:?}"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Build the stock-movement half of a distribution create, so the route
/// handler only assembles request data.
pub fn distribution_adjustment(
    product_id: ProductId,
    quantity: i64,
    performed_by: UserId,
    occurred_at: chrono::DateTime<chrono::Utc>,
) -> tokopos_catalog::RecordAdjustment {
    let (source, target) = tokopos_catalog::legal_route(AdjustmentType::Distribution);
    tokopos_catalog::RecordAdjustment {
        product_id,
        adjustment_id: Uuid::now_v7(),
        adjustment_type: AdjustmentType::Distribution,
        quantity,
        condition: StockCondition::Good,
        source_location: source,
        target_location: target,
        notes: None,
        performed_by,
        occurred_at,
    }
}
