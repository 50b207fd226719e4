use std::fmt;

use super::term::Var;

/// A constraint string that does not describe a linear inequality.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub input: String,
    /// 1-based character column.
    pub column: usize,
    pub message: String,
}

impl ParseError {
    /// `offset` is the byte offset of the offending character in `input`.
    pub fn new(input: &str, offset: usize, message: impl Into<String>) -> Self {
        let column = input
            .get(..offset)
            .map_or(input.chars().count(), |head| head.chars().count())
            + 1;
        Self {
            input: input.to_string(),
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at column {} in `{}`",
            self.message, self.column, self.input
        )
    }
}

impl std::error::Error for ParseError {}

/// Failures of contract construction and of the contract operators.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractError {
    Parse(ParseError),
    /// Variable roles violate the IO-contract rules.
    Invalid(String),
    /// Both operands drive the same outputs.
    OverlappingOutputs(Vec<Var>),
    /// Each operand consumes outputs of the other.
    Cyclic { forward: Vec<Var>, backward: Vec<Var> },
    /// No context bound can discharge an assumption on a hidden variable.
    Abduction { term: String, var: Var },
    /// An assumption reduces to a contradiction under the context.
    Unsatisfiable { term: String },
    /// The composite assumptions describe an empty set.
    IncompatibleAssumptions { assumptions: String },
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Invalid(msg) => write!(f, "invalid contract: {msg}"),
            Self::OverlappingOutputs(vars) => {
                write!(f, "outputs overlap: {}", join_vars(vars))
            }
            Self::Cyclic { forward, backward } => write!(
                f,
                "contracts feed each other ({} one way, {} the other)",
                join_vars(forward),
                join_vars(backward)
            ),
            Self::Abduction { term, var } => {
                write!(f, "no context bound on {var} discharges `{term}`")
            }
            Self::Unsatisfiable { term } => {
                write!(f, "assumption `{term}` cannot be met by the upstream guarantees")
            }
            Self::IncompatibleAssumptions { assumptions } => {
                write!(f, "composite assumptions are infeasible: {assumptions}")
            }
        }
    }
}

impl std::error::Error for ContractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for ContractError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

fn join_vars(vars: &[Var]) -> String {
    vars.iter()
        .map(Var::name)
        .collect::<Vec<_>>()
        .join(", ")
}
