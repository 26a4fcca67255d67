//! Reference swap counter-party.
//!
//! [`FixedRateRouter`] quotes one fixed rate between two assets and settles
//! from its own inventory. It takes whatever input it was offered (the
//! attached native value, or the caller's full allowance) and pays
//! `input * numerator / denominator` of the output back to the caller.
//! The call payload is ignored.

use crate::types::{Address, Amount, Asset};
use crate::world::{ExternalContract, ExternalError, Host};

#[derive(Debug, Clone)]
pub struct FixedRateRouter {
    pub input: Asset,
    pub output: Asset,
    pub numerator: Amount,
    pub denominator: Amount,
}

impl FixedRateRouter {
    pub fn new(input: Asset, output: Asset, numerator: Amount, denominator: Amount) -> Self {
        Self {
            input,
            output,
            numerator,
            denominator,
        }
    }

    pub fn quote(&self, amount_in: Amount) -> Result<Amount, ExternalError> {
        if self.denominator == 0 {
            return Err(ExternalError::Reverted("router has no rate".into()));
        }
        amount_in
            .checked_mul(self.numerator)
            .map(|v| v / self.denominator)
            .ok_or_else(|| ExternalError::Reverted("quote overflow".into()))
    }
}

impl ExternalContract for FixedRateRouter {
    fn execute(
        &self,
        host: &mut Host<'_>,
        caller: Address,
        value: Amount,
        _payload: &[u8],
    ) -> Result<(), ExternalError> {
        let this = host.this();
        let amount_in = match self.input {
            Asset::Native => value,
            Asset::Fungible(token) => {
                let offered = host.token_allowance(token, caller, this)?;
                host.transfer_token_from(token, caller, this, offered)?;
                offered
            }
        };
        if amount_in == 0 {
            return Err(ExternalError::Reverted("nothing to swap".into()));
        }

        let amount_out = self.quote(amount_in)?;
        match self.output {
            Asset::Native => host.send_native(caller, amount_out),
            Asset::Fungible(token) => host.transfer_token(token, caller, amount_out),
        }
    }
}
