//! Token accounting for Dossier.
//!
//! Every size in the system goes through [`estimate_size`], so budgets,
//! trimming, and state reporting agree on what a "token" is. The only
//! mutable state here is a [`SessionBudget`], which belongs to exactly one
//! session and is threaded through the calls that spend it.

pub mod ledger;
pub mod token;
pub mod trim;

pub use ledger::{BudgetSnapshot, SessionBudget};
pub use token::estimate_size;
pub use trim::trim_to_budget;
