//! Domain types for Bandwise

pub mod execution;
pub mod lot;
pub mod order;
pub mod plan;
pub mod portfolio;
pub mod prices;
pub mod signal;

pub use execution::{ExecutionRecord, ExecutionStatus};
pub use lot::LotMode;
pub use order::{Order, OrderSide};
pub use plan::{AllocationPlan, ClassDrift, PlanAction, PlanEntry, PlanWarning, WarningKind};
pub use portfolio::{NavPoint, PortfolioState, Position, StateError};
pub use prices::PriceBook;
pub use signal::{Signal, SignalBatch, SignalError};

/// Symbol type alias
pub type Symbol = String;

/// Asset class name as it appears in the strategy config (e.g. "equities").
pub type AssetClass = String;
