use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tokopos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use tokopos_events::Event;
use tokopos_catalog::ProductId;

/// Distribution identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionId(pub AggregateId);

impl DistributionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DistributionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Distribution status lifecycle. Forward-only: each advance moves exactly
/// one step; `Cancelled` is reachable from `Pending` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStatus {
    Pending,
    Distributed,
    Completed,
    Cancelled,
}

impl DistributionStatus {
    /// The single status a forward advance may move to, if any.
    pub fn next(self) -> Option<DistributionStatus> {
        match self {
            DistributionStatus::Pending => Some(DistributionStatus::Distributed),
            DistributionStatus::Distributed => Some(DistributionStatus::Completed),
            DistributionStatus::Completed | DistributionStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistributionStatus::Pending => "pending",
            DistributionStatus::Distributed => "distributed",
            DistributionStatus::Completed => "completed",
            DistributionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DistributionStatus::Pending),
            "distributed" => Some(DistributionStatus::Distributed),
            "completed" => Some(DistributionStatus::Completed),
            "cancelled" => Some(DistributionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Aggregate root: ProductDistribution. Tracks one hand-off of stock from
/// storage to a cashier through its status lifecycle. The ledger side of the
/// hand-off lives on the Product aggregate; this one owns only the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDistribution {
    id: DistributionId,
    product_id: Option<ProductId>,
    quantity: i64,
    cashier_id: Option<UserId>,
    distributed_by: Option<UserId>,
    status: DistributionStatus,
    notes: Option<String>,
    version: u64,
    created: bool,
}

impl ProductDistribution {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DistributionId) -> Self {
        Self {
            id,
            product_id: None,
            quantity: 0,
            cashier_id: None,
            distributed_by: None,
            status: DistributionStatus::Pending,
            notes: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DistributionId {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn cashier_id(&self) -> Option<UserId> {
        self.cashier_id
    }

    pub fn distributed_by(&self) -> Option<UserId> {
        self.distributed_by
    }

    pub fn status(&self) -> DistributionStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_cancellable(&self) -> bool {
        self.created && self.status == DistributionStatus::Pending
    }
}

impl AggregateRoot for ProductDistribution {
    type Id = DistributionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDistribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDistribution {
    pub distribution_id: DistributionId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub cashier_id: UserId,
    pub distributed_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdvanceDistribution. `to` must be exactly the next status in the
/// lifecycle; skipping or rewinding is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceDistribution {
    pub distribution_id: DistributionId,
    pub to: DistributionStatus,
    pub advanced_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelDistribution. Only pending distributions can be cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDistribution {
    pub distribution_id: DistributionId,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionCommand {
    CreateDistribution(CreateDistribution),
    AdvanceDistribution(AdvanceDistribution),
    CancelDistribution(CancelDistribution),
}

/// Event: DistributionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionCreated {
    pub distribution_id: DistributionId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub cashier_id: UserId,
    pub distributed_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DistributionAdvanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionAdvanced {
    pub distribution_id: DistributionId,
    pub from: DistributionStatus,
    pub to: DistributionStatus,
    pub advanced_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DistributionCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionCancelled {
    pub distribution_id: DistributionId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionEvent {
    DistributionCreated(DistributionCreated),
    DistributionAdvanced(DistributionAdvanced),
    DistributionCancelled(DistributionCancelled),
}

impl Event for DistributionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DistributionEvent::DistributionCreated(_) => "distribution.created",
            DistributionEvent::DistributionAdvanced(_) => "distribution.advanced",
            DistributionEvent::DistributionCancelled(_) => "distribution.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DistributionEvent::DistributionCreated(e) => e.occurred_at,
            DistributionEvent::DistributionAdvanced(e) => e.occurred_at,
            DistributionEvent::DistributionCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductDistribution {
    type Command = DistributionCommand;
    type Event = DistributionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DistributionEvent::DistributionCreated(e) => {
                self.id = e.distribution_id;
                self.product_id = Some(e.product_id);
                self.quantity = e.quantity;
                self.cashier_id = Some(e.cashier_id);
                self.distributed_by = Some(e.distributed_by);
                self.status = DistributionStatus::Pending;
                self.notes = e.notes.clone();
                self.created = true;
            }
            DistributionEvent::DistributionAdvanced(e) => {
                self.status = e.to;
            }
            DistributionEvent::DistributionCancelled(_) => {
                self.status = DistributionStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DistributionCommand::CreateDistribution(cmd) => self.handle_create(cmd),
            DistributionCommand::AdvanceDistribution(cmd) => self.handle_advance(cmd),
            DistributionCommand::CancelDistribution(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ProductDistribution {
    fn ensure_distribution_id(&self, distribution_id: DistributionId) -> Result<(), DomainError> {
        if self.id != distribution_id {
            return Err(DomainError::invariant("distribution_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreateDistribution,
    ) -> Result<Vec<DistributionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("distribution already exists"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![DistributionEvent::DistributionCreated(
            DistributionCreated {
                distribution_id: cmd.distribution_id,
                product_id: cmd.product_id,
                quantity: cmd.quantity,
                cashier_id: cmd.cashier_id,
                distributed_by: cmd.distributed_by,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_advance(
        &self,
        cmd: &AdvanceDistribution,
    ) -> Result<Vec<DistributionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_distribution_id(cmd.distribution_id)?;

        let Some(next) = self.status.next() else {
            return Err(DomainError::invalid_transition(format!(
                "distribution is {} and cannot advance",
                self.status.as_str(),
            )));
        };
        if cmd.to != next {
            return Err(DomainError::invalid_transition(format!(
                "cannot advance from {} to {}, next is {}",
                self.status.as_str(),
                cmd.to.as_str(),
                next.as_str(),
            )));
        }

        Ok(vec![DistributionEvent::DistributionAdvanced(
            DistributionAdvanced {
                distribution_id: cmd.distribution_id,
                from: self.status,
                to: next,
                advanced_by: cmd.advanced_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelDistribution,
    ) -> Result<Vec<DistributionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_distribution_id(cmd.distribution_id)?;

        if !self.is_cancellable() {
            return Err(DomainError::invalid_transition(format!(
                "only pending distributions can be cancelled, this one is {}",
                self.status.as_str(),
            )));
        }

        let (Some(product_id), quantity) = (self.product_id, self.quantity) else {
            return Err(DomainError::invariant("distribution has no product"));
        };

        Ok(vec![DistributionEvent::DistributionCancelled(
            DistributionCancelled {
                distribution_id: cmd.distribution_id,
                product_id,
                quantity,
                cancelled_by: cmd.cancelled_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
