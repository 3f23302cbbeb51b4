use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};
use crate::outcome::Outcome;

/// Bookmaker decimal odds keyed by outcome. Every quoted price is finite and > 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct OddsQuote {
    prices: BTreeMap<Outcome, f64>,
}

impl OddsQuote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full 1X2 quote.
    pub fn from_1x2(home: f64, draw: f64, away: f64) -> Result<Self> {
        let mut quote = Self::new();
        quote.set(Outcome::Home, home)?;
        quote.set(Outcome::Draw, draw)?;
        quote.set(Outcome::Away, away)?;
        Ok(quote)
    }

    pub fn set(&mut self, outcome: Outcome, decimal_odds: f64) -> Result<()> {
        if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
            return Err(PredictorError::InvalidOdds {
                label: outcome.label().to_string(),
                value: decimal_odds,
            });
        }
        self.prices.insert(outcome, decimal_odds);
        Ok(())
    }

    pub fn get(&self, outcome: Outcome) -> Option<f64> {
        self.prices.get(&outcome).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Outcome, f64)> + '_ {
        self.prices.iter().map(|(o, p)| (*o, *p))
    }

    pub fn implied_probability(&self, outcome: Outcome) -> Option<f64> {
        self.get(outcome).map(|price| 1.0 / price)
    }

    /// Sum of implied probabilities minus one; needs a full 1X2 quote.
    pub fn margin(&self) -> Option<f64> {
        let sum = self.full_implied_sum()?;
        Some(sum - 1.0)
    }

    /// Implied probabilities with the bookmaker margin removed proportionally.
    pub fn no_vig_probabilities(&self) -> Option<BTreeMap<Outcome, f64>> {
        let sum = self.full_implied_sum()?;
        if sum <= 0.0 {
            return None;
        }
        Some(
            self.prices
                .iter()
                .map(|(o, price)| (*o, (1.0 / price) / sum))
                .collect(),
        )
    }

    fn full_implied_sum(&self) -> Option<f64> {
        let mut sum = 0.0;
        for outcome in Outcome::ALL {
            sum += self.implied_probability(outcome)?;
        }
        Some(sum)
    }
}

impl TryFrom<BTreeMap<String, f64>> for OddsQuote {
    type Error = PredictorError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        let mut quote = OddsQuote::new();
        for (label, price) in raw {
            let Some(outcome) = Outcome::from_label(&label) else {
                return Err(PredictorError::InvalidOdds {
                    label,
                    value: price,
                });
            };
            quote.set(outcome, price)?;
        }
        Ok(quote)
    }
}

impl From<OddsQuote> for BTreeMap<String, f64> {
    fn from(quote: OddsQuote) -> Self {
        quote
            .prices
            .into_iter()
            .map(|(o, p)| (o.label().to_string(), p))
            .collect()
    }
}

/// Net profit of a winning stake at decimal odds.
pub fn potential_profit(stake: f64, decimal_odds: f64) -> f64 {
    stake * decimal_odds - stake
}
