//! Interfaces of the external engines the TRM computation relies on.
//!
//! None of these are implemented here: physical load-flow solving, sensitivity
//! analysis and balance adjustment are provided by the caller as trait objects
//! (`Arc<dyn LoadFlowEngine>`, ...). The traits are `Send + Sync` so one engine
//! can serve independent computations running on independent networks.

pub mod balance;
pub mod load_flow;
pub mod sensitivity;

pub use balance::{
    BalanceAdjuster, BalanceAdjustmentParameters, BalanceArea, BalanceComputationResult,
    BalanceComputationStatus,
};
pub use load_flow::{run_load_flow, LoadFlowEngine, LoadFlowParameters, LoadFlowStatus};
pub use sensitivity::{
    SensitivityEngine, SensitivityFactor, SensitivityFunctionType, SensitivityParameters,
    SensitivityValue, SensitivityVariableSet, SensitivityVariableType,
};
