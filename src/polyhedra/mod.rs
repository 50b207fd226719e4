//! Polyhedral assume/guarantee contracts.
//!
//! - [`term`]: single linear inequalities over named variables
//! - [`parse`]: constraint strings such as `"-x1 <= -0.02"`
//! - [`term_list`]: conjunctions (projection, feasibility, implication, abduction)
//! - [`contract`]: IO contracts and their composition/merge/refinement

pub mod contract;
mod error;
pub mod parse;
pub mod term;
pub mod term_list;

pub use contract::{
    ContractRecord, IoContract, QUANTIZATION_TOLERANCE, read_contracts_from_file,
    write_contracts_to_file,
};
pub use error::{ContractError, ParseError};
pub use parse::{parse_constraint, parse_constraints};
pub use term::{Term, Var};
pub use term_list::{Bound, TermList};
