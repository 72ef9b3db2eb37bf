//! The bootstrap orchestrator.
//!
//! [`BootstrapOrchestrator::run`] rebuilds the simulated business from
//! scratch in two halves:
//!
//! 1. **Core** -- connect, drop the schema, migrate, and seed the reference
//!    tables in one transaction. Any failure here aborts the run with
//!    [`BootstrapError::Fatal`] and the clock is left untouched.
//! 2. **Business services** -- reset the clock, open a bank account, take
//!    out a loan, and buy a starting fleet. Nothing here fails the run:
//!    each step retries or falls back, and the resulting (possibly degraded)
//!    state is described by the returned [`BootstrapReport`].
//!
//! Runs are serialized by an internal lock, so two concurrent calls never
//! interleave their schema drops or fleet checks.

use std::fmt;
use std::sync::{Arc, PoisonError};

use haulsim_clock::Clock;
use haulsim_types::{BankAccount, LoanAttempt, TruckOffer, TruckPurchasePlan, core_seed_rows};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::collaborators::{
    BankService, GatewayError, MarketService, PersistenceGateway, SeedTransaction,
};
use crate::config::BootstrapConfig;
use crate::planning::{minimal_fleet_plan, plan_purchase};

/// Where a run currently is.
///
/// ```text
/// Idle -> ConnectingDb -> DroppingSchema -> Migrating -> SeedingCore
///      -> ClockReset -> InitializingBankAccount -> InitializingFleet -> Done
/// ```
///
/// Any of the first four phases can end in `Failed`. The rest never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// No run has started yet.
    Idle,
    /// Connecting to the database.
    ConnectingDb,
    /// Dropping the existing schema.
    DroppingSchema,
    /// Running migrations.
    Migrating,
    /// Seeding the reference tables.
    SeedingCore,
    /// Resetting the simulation clock.
    ClockReset,
    /// Opening the bank account.
    InitializingBankAccount,
    /// Borrowing and buying the starting fleet.
    InitializingFleet,
    /// The last run finished.
    Done,
    /// The last run aborted in a core phase.
    Failed,
}

impl BootstrapPhase {
    /// Whether a failure in this phase aborts the run.
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::ConnectingDb | Self::DroppingSchema | Self::Migrating | Self::SeedingCore
        )
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ConnectingDb => "connecting to database",
            Self::DroppingSchema => "dropping schema",
            Self::Migrating => "migrating",
            Self::SeedingCore => "seeding core",
            Self::ClockReset => "resetting clock",
            Self::InitializingBankAccount => "initializing bank account",
            Self::InitializingFleet => "initializing fleet",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A failure that aborts a bootstrap run.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A core phase failed. The persistence error is carried unchanged.
    #[error("bootstrap failed during {phase}: {source}")]
    Fatal {
        /// The phase that failed.
        phase: BootstrapPhase,
        /// The error returned by the persistence layer.
        #[source]
        source: GatewayError,
    },
}

impl BootstrapError {
    /// The phase that failed.
    pub const fn phase(&self) -> BootstrapPhase {
        match self {
            Self::Fatal { phase, .. } => *phase,
        }
    }
}

/// How the fleet ended up after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetOutcome {
    /// Trucks were bought according to the purchase plan.
    Purchased {
        /// Trucks recorded.
        trucks: u32,
    },
    /// Trucks already existed, so nothing was bought.
    AlreadyPresent {
        /// Trucks found.
        existing: u64,
    },
    /// The planned purchase failed and the two-truck fallback was bought.
    MinimalFallback {
        /// Trucks recorded.
        trucks: u32,
    },
    /// Both the planned purchase and the fallback failed.
    Empty,
}

/// Result of one pass through [`BootstrapOrchestrator::purchase_fleet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// Trucks already existed; the plan was not executed.
    Skipped {
        /// Trucks found.
        existing: u64,
    },
    /// The plan was executed.
    Bought {
        /// Trucks recorded across every line that succeeded.
        trucks: u32,
        /// Lines whose order or payment failed.
        skipped_lines: usize,
    },
}

/// State of the simulated business after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// The business's bank account, if one could be opened.
    pub bank_account: Option<BankAccount>,
    /// The loan application.
    pub loan: LoanAttempt,
    /// The starting fleet.
    pub fleet: FleetOutcome,
}

/// Rebuilds the simulated business from scratch.
#[derive(Debug)]
pub struct BootstrapOrchestrator<P, B, M> {
    persistence: P,
    bank: B,
    market: M,
    clock: Arc<Clock>,
    config: BootstrapConfig,
    run_lock: Mutex<()>,
    phase: std::sync::Mutex<BootstrapPhase>,
}

impl<P, B, M> BootstrapOrchestrator<P, B, M>
where
    P: PersistenceGateway,
    B: BankService,
    M: MarketService,
{
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        persistence: P,
        bank: B,
        market: M,
        clock: Arc<Clock>,
        config: BootstrapConfig,
    ) -> Self {
        Self {
            persistence,
            bank,
            market,
            clock,
            config,
            run_lock: Mutex::new(()),
            phase: std::sync::Mutex::new(BootstrapPhase::Idle),
        }
    }

    /// The phase the current (or last) run is in.
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, phase: BootstrapPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
        debug!(%phase, "Bootstrap phase");
    }

    /// The persistence gateway.
    pub const fn persistence(&self) -> &P {
        &self.persistence
    }

    /// The clock reset by every run.
    pub const fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    /// Rebuild the database and the simulated business.
    ///
    /// Only a failure in a core phase is returned. Bank, loan, and fleet
    /// failures are absorbed and show up in the report instead.
    pub async fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let _guard = self.run_lock.lock().await;
        info!("Bootstrap started");

        let seeded = match self.prepare_core().await {
            Ok(seeded) => seeded,
            Err(e) => {
                self.enter(BootstrapPhase::Failed);
                error!(phase = %e.phase(), error = %e, "Bootstrap aborted");
                return Err(e);
            }
        };
        info!(rows = seeded, "Core schema ready");

        self.enter(BootstrapPhase::ClockReset);
        self.clock.reset();

        let report = self.initialize_business_services().await;
        self.enter(BootstrapPhase::Done);
        info!(
            bank_account = report.bank_account.is_some(),
            loan_approved = report.loan.approved,
            fleet = ?report.fleet,
            "Bootstrap finished"
        );
        Ok(report)
    }

    /// Connect, drop, migrate, and seed. Returns the number of seeded rows.
    async fn prepare_core(&self) -> Result<usize, BootstrapError> {
        self.enter(BootstrapPhase::ConnectingDb);
        self.persistence
            .ensure_connected()
            .await
            .map_err(|source| fatal(BootstrapPhase::ConnectingDb, source))?;

        self.enter(BootstrapPhase::DroppingSchema);
        self.persistence
            .drop_schema()
            .await
            .map_err(|source| fatal(BootstrapPhase::DroppingSchema, source))?;

        self.enter(BootstrapPhase::Migrating);
        self.persistence
            .migrate()
            .await
            .map_err(|source| fatal(BootstrapPhase::Migrating, source))?;

        self.enter(BootstrapPhase::SeedingCore);
        self.seed_core().await
    }

    /// Insert the reference rows in one transaction and return how many
    /// were written.
    ///
    /// On an insert failure the transaction is rolled back and released
    /// before the error is returned.
    pub async fn seed_core(&self) -> Result<usize, BootstrapError> {
        let mut tx = self
            .persistence
            .begin_seed()
            .await
            .map_err(|source| fatal(BootstrapPhase::SeedingCore, source))?;

        let rows = core_seed_rows();
        for row in &rows {
            if let Err(source) = tx.insert(row).await {
                error!(table = row.table(), %source, "Seed insert failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(%rollback_err, "Seed rollback failed");
                }
                return Err(fatal(BootstrapPhase::SeedingCore, source));
            }
        }

        tx.commit()
            .await
            .map_err(|source| fatal(BootstrapPhase::SeedingCore, source))?;
        Ok(rows.len())
    }

    /// Open the bank account, the loan, and the fleet. Never fails.
    pub async fn initialize_business_services(&self) -> BootstrapReport {
        self.enter(BootstrapPhase::InitializingBankAccount);
        let bank_account = self.initialize_bank_account().await;
        self.enter(BootstrapPhase::InitializingFleet);
        let (loan, fleet) = self.initialize_fleet().await;
        BootstrapReport {
            bank_account,
            loan,
            fleet,
        }
    }

    /// Open the business's bank account, retrying with backoff.
    ///
    /// Returns `None` once every attempt has failed.
    pub async fn initialize_bank_account(&self) -> Option<BankAccount> {
        let policy = self.config.retry_policy();
        match policy
            .run("bank_account", |_| self.bank.create_account())
            .await
        {
            Ok(account) => {
                info!(account = %account.account_number, "Bank account opened");
                Some(account)
            }
            Err(e) => {
                warn!(error = %e, "Continuing without a bank account");
                None
            }
        }
    }

    /// Current market offers, retrying with backoff.
    ///
    /// Returns an empty list once every attempt has failed.
    pub async fn fetch_offers(&self) -> Vec<TruckOffer> {
        let policy = self.config.retry_policy();
        match policy.run("fetch_offers", |_| self.market.list_offers()).await {
            Ok(offers) => {
                debug!(offers = offers.len(), "Fetched truck offers");
                offers
            }
            Err(e) => {
                warn!(error = %e, "No truck offers available, planning without them");
                Vec::new()
            }
        }
    }

    /// Apply for a loan of `amount`.
    ///
    /// A declined or failed application is retried once at the amount
    /// scaled by the configured shrink factor, provided that is strictly
    /// smaller. The outcome is only ever reported, never raised.
    pub async fn apply_loan(&self, amount: Decimal) -> LoanAttempt {
        if self.try_loan(amount).await {
            info!(%amount, "Loan approved");
            return LoanAttempt {
                requested_amount: amount,
                attempted_amount: amount,
                approved: true,
            };
        }

        let reduced = amount
            .checked_mul(self.config.loan_shrink_factor)
            .map(|value| value.round_dp(2))
            .filter(|value| *value < amount);
        let Some(reduced) = reduced else {
            warn!(%amount, "Loan rejected, no smaller amount to try");
            return LoanAttempt {
                requested_amount: amount,
                attempted_amount: amount,
                approved: false,
            };
        };

        info!(%amount, %reduced, "Loan rejected, retrying with a reduced amount");
        let approved = self.try_loan(reduced).await;
        if approved {
            info!(amount = %reduced, "Reduced loan approved");
        } else {
            warn!(amount = %reduced, "Reduced loan rejected, continuing without a loan");
        }
        LoanAttempt {
            requested_amount: amount,
            attempted_amount: reduced,
            approved,
        }
    }

    async fn try_loan(&self, amount: Decimal) -> bool {
        match self.bank.apply_for_loan(amount).await {
            Ok(decision) => {
                if let Some(loan_number) = decision.loan_number.as_deref() {
                    debug!(%amount, loan_number, approved = decision.approved, "Loan decision");
                }
                decision.approved
            }
            Err(e) => {
                warn!(%amount, error = %e, "Loan application failed");
                false
            }
        }
    }

    /// Buy every line of `plan` unless trucks already exist.
    ///
    /// A line is recorded only when both its order and its payment went
    /// through; otherwise it is skipped. At most the planned quantity is
    /// recorded per line, whatever the market confirms. Persistence errors
    /// are returned.
    pub async fn purchase_fleet(
        &self,
        plan: &TruckPurchasePlan,
    ) -> Result<PurchaseOutcome, GatewayError> {
        let existing = self.persistence.count_trucks().await?;
        if existing > 0 {
            info!(existing, "Trucks already present, skipping fleet purchase");
            return Ok(PurchaseOutcome::Skipped { existing });
        }

        let mut trucks: u32 = 0;
        let mut skipped_lines = 0_usize;
        for line in &plan.lines {
            let order = match self.market.place_order(&line.name, line.quantity_to_buy).await {
                Ok(order) => order,
                Err(e) => {
                    warn!(
                        truck = %line.name,
                        quantity = line.quantity_to_buy,
                        error = %e,
                        "Truck order failed, skipping line"
                    );
                    skipped_lines = skipped_lines.saturating_add(1);
                    continue;
                }
            };

            let quantity = order.quantity.min(line.quantity_to_buy);
            if order.quantity != line.quantity_to_buy {
                warn!(
                    truck = %line.name,
                    ordered = line.quantity_to_buy,
                    confirmed = order.quantity,
                    recorded = quantity,
                    "Market confirmed a different quantity than ordered"
                );
            }

            let description = format!(
                "Purchase of {quantity} x {} (order {})",
                line.name, order.order_id
            );
            if let Err(e) = self
                .bank
                .post_transaction(&order.bank_account, order.total_price, &description)
                .await
            {
                warn!(
                    truck = %line.name,
                    order_id = %order.order_id,
                    amount = %order.total_price,
                    error = %e,
                    "Truck payment failed, skipping line"
                );
                skipped_lines = skipped_lines.saturating_add(1);
                continue;
            }

            self.persistence
                .insert_trucks(&line.truck_spec(), quantity)
                .await?;
            info!(
                truck = %line.name,
                quantity,
                order_id = %order.order_id,
                "Trucks purchased"
            );
            trucks = trucks.saturating_add(quantity);
        }

        Ok(PurchaseOutcome::Bought {
            trucks,
            skipped_lines,
        })
    }

    /// Buy the hardcoded two-truck fleet through [`purchase_fleet`](Self::purchase_fleet).
    pub async fn minimal_fleet_setup(&self) -> Result<PurchaseOutcome, GatewayError> {
        self.purchase_fleet(&minimal_fleet_plan()).await
    }

    /// Fetch offers, plan, borrow, and buy, falling back to the minimal
    /// fleet if the purchase fails outright. Never fails.
    pub async fn initialize_fleet(&self) -> (LoanAttempt, FleetOutcome) {
        let offers = self.fetch_offers().await;
        let plan = plan_purchase(&offers);
        info!(
            trucks = plan.total_trucks(),
            loan_amount = %plan.loan_amount,
            "Fleet purchase planned"
        );
        let loan = self.apply_loan(plan.loan_amount).await;

        let fleet = match self.purchase_fleet(&plan).await {
            Ok(outcome) => fleet_outcome(outcome, false),
            Err(e) => {
                error!(error = %e, "Fleet purchase failed, falling back to minimal fleet");
                match self.minimal_fleet_setup().await {
                    Ok(outcome) => fleet_outcome(outcome, true),
                    Err(e) => {
                        error!(error = %e, "Minimal fleet setup failed, continuing without trucks");
                        FleetOutcome::Empty
                    }
                }
            }
        };
        (loan, fleet)
    }
}

const fn fatal(phase: BootstrapPhase, source: GatewayError) -> BootstrapError {
    BootstrapError::Fatal { phase, source }
}

const fn fleet_outcome(outcome: PurchaseOutcome, fallback: bool) -> FleetOutcome {
    match outcome {
        PurchaseOutcome::Skipped { existing } => FleetOutcome::AlreadyPresent { existing },
        PurchaseOutcome::Bought { trucks, .. } if fallback => {
            FleetOutcome::MinimalFallback { trucks }
        }
        PurchaseOutcome::Bought { trucks, .. } => FleetOutcome::Purchased { trucks },
    }
}
