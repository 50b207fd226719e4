use super::envelope::{Envelope, EnvelopeVariant, Line, Regime, RegimeEnvelope};
use super::params::SensorParams;
use crate::error::Result;
use crate::polyhedra::{ContractError, IoContract, Term, TermList, Var};

/// One IO contract per regime of a single sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeContracts {
    pub lag: IoContract,
    pub linear: IoContract,
    pub saturation: IoContract,
}

impl RegimeContracts {
    pub fn get(&self, regime: Regime) -> &IoContract {
        match regime {
            Regime::Lag => &self.lag,
            Regime::Linear => &self.linear,
            Regime::Saturation => &self.saturation,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Regime, &IoContract)> {
        Regime::ALL.into_iter().map(move |r| (r, self.get(r)))
    }
}

/// Contracts for every regime of `params`, reading `input` and driving `output`.
pub fn sensor_contracts(
    params: &SensorParams,
    input: &str,
    output: &str,
    variant: EnvelopeVariant,
) -> Result<RegimeContracts> {
    let envelope = Envelope::build(params, variant)?;
    let input = Var::new(input);
    let output = Var::new(output);
    Ok(RegimeContracts {
        lag: regime_contract(&envelope.lag, &input, &output)?,
        linear: regime_contract(&envelope.linear, &input, &output)?,
        saturation: regime_contract(&envelope.saturation, &input, &output)?,
    })
}

/// Domain bounds become assumptions, envelope lines become guarantees.
pub fn regime_contract(
    regime: &RegimeEnvelope,
    input: &Var,
    output: &Var,
) -> std::result::Result<IoContract, ContractError> {
    let mut assumptions = TermList::new();
    if let Some(hi) = regime.u_max {
        assumptions.push(Term::upper(input.clone(), hi));
    }
    if let Some(lo) = regime.u_min {
        assumptions.push(Term::lower(input.clone(), lo));
    }

    let mut guarantees = TermList::new();
    if let Some(upper) = regime.upper {
        guarantees.push(below_line(upper, input, output));
    }
    guarantees.push(above_line(regime.lower, input, output));

    IoContract::new(
        vec![input.clone()],
        vec![output.clone()],
        assumptions,
        guarantees,
    )
}

// y - slope*u <= intercept
fn below_line(line: Line, input: &Var, output: &Var) -> Term {
    Term::new(
        [(output.clone(), 1.0), (input.clone(), -line.slope)],
        line.intercept,
    )
}

// -y + slope*u <= -intercept
fn above_line(line: Line, input: &Var, output: &Var) -> Term {
    Term::new(
        [(output.clone(), -1.0), (input.clone(), line.slope)],
        -line.intercept,
    )
}
