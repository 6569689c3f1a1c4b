use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::RateTableError;
use super::types::{BorrowerType, ProductType, RepaymentType};

/// Substituted by callers when no configuration matches.
pub const DEFAULT_RATE_QUOTE: RateQuote = RateQuote {
    rate: 5.74,
    comparison_rate: 5.65,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub rate: f64,
    pub comparison_rate: f64,
}

/// LVR pricing band. Each band includes its upper bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LvrBucket {
    #[serde(rename = "0-60")]
    UpTo60,
    #[serde(rename = "60-70")]
    From60To70,
    #[serde(rename = "70-80")]
    From70To80,
    #[serde(rename = "80-85")]
    From80To85,
    #[serde(rename = "85-90")]
    From85To90,
    #[serde(rename = "90-95")]
    From90To95,
}

impl LvrBucket {
    pub const ALL: [LvrBucket; 6] = [
        LvrBucket::UpTo60,
        LvrBucket::From60To70,
        LvrBucket::From70To80,
        LvrBucket::From80To85,
        LvrBucket::From85To90,
        LvrBucket::From90To95,
    ];

    pub fn upper_bound(self) -> f64 {
        match self {
            LvrBucket::UpTo60 => 60.0,
            LvrBucket::From60To70 => 70.0,
            LvrBucket::From70To80 => 80.0,
            LvrBucket::From80To85 => 85.0,
            LvrBucket::From85To90 => 90.0,
            LvrBucket::From90To95 => 95.0,
        }
    }

    /// Values above 95 land in the top band; `max_lvr` on each configuration
    /// decides whether they are actually lendable.
    pub fn from_lvr(lvr: f64) -> Self {
        LvrBucket::ALL
            .into_iter()
            .find(|bucket| lvr <= bucket.upper_bound())
            .unwrap_or(LvrBucket::From90To95)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Everything the resolver needs to price a loan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuery {
    pub lvr: f64,
    pub product_type: ProductType,
    pub repayment_type: RepaymentType,
    pub borrower_type: BorrowerType,
    pub loan_amount: f64,
    pub is_first_home_buyer: bool,
    pub has_offset: bool,
    pub has_redraw: bool,
}

/// One row of a lender rate card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConfiguration {
    pub id: String,
    pub product_name: String,
    pub lender: String,
    pub product_type: ProductType,
    pub repayment_type: RepaymentType,
    pub borrower_type: BorrowerType,
    pub lvr_range: LvrBucket,
    pub has_offset: bool,
    pub has_redraw: bool,
    pub rate: f64,
    pub comparison_rate: f64,
    pub max_lvr: f64,
    pub min_loan_amount: f64,
    #[serde(default)]
    pub max_loan_amount: Option<f64>,
    pub is_first_home_buyer_eligible: bool,
    pub effective_date: NaiveDate,
}

impl RateConfiguration {
    pub fn quote(&self) -> RateQuote {
        RateQuote {
            rate: self.rate,
            comparison_rate: self.comparison_rate,
        }
    }

    fn accepts_loan_amount(&self, amount: f64) -> bool {
        amount >= self.min_loan_amount && self.max_loan_amount.is_none_or(|max| amount <= max)
    }

    fn matches(&self, query: &RateQuery, bucket: LvrBucket) -> bool {
        self.lvr_range == bucket
            && self.product_type == query.product_type
            && self.repayment_type == query.repayment_type
            && self.borrower_type == query.borrower_type
            && query.lvr <= self.max_lvr
            && self.accepts_loan_amount(query.loan_amount)
            && (!query.has_offset || self.has_offset)
            && (!query.has_redraw || self.has_redraw)
            && (!query.is_first_home_buyer || self.is_first_home_buyer_eligible)
    }

    fn check(&self) -> Result<(), RateTableError> {
        let invalid = |reason: &str| RateTableError::InvalidConfiguration {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(invalid("rate must be a finite, non-negative percentage"));
        }
        if !self.comparison_rate.is_finite() || self.comparison_rate < 0.0 {
            return Err(invalid(
                "comparisonRate must be a finite, non-negative percentage",
            ));
        }
        if !(self.max_lvr > 0.0 && self.max_lvr <= 100.0) {
            return Err(invalid("maxLvr must be within (0, 100]"));
        }
        if !self.min_loan_amount.is_finite() || self.min_loan_amount < 0.0 {
            return Err(invalid("minLoanAmount must be >= 0"));
        }
        if let Some(max) = self.max_loan_amount {
            if !(max >= self.min_loan_amount) {
                return Err(invalid("maxLoanAmount must be >= minLoanAmount"));
            }
        }
        Ok(())
    }
}

/// Read-only rate card. Replace the whole table to refresh rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    configurations: Vec<RateConfiguration>,
}

impl RateTable {
    pub fn new(configurations: Vec<RateConfiguration>) -> Result<Self, RateTableError> {
        for configuration in &configurations {
            configuration.check()?;
        }
        Ok(Self { configurations })
    }

    pub fn from_json_str(json: &str) -> Result<Self, RateTableError> {
        let configurations = serde_json::from_str::<Vec<RateConfiguration>>(json)?;
        Self::new(configurations)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RateTableError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| RateTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn configurations(&self) -> &[RateConfiguration] {
        &self.configurations
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Lowest-rate configuration matching every hard requirement of `query`.
    /// Equal rates keep the earliest configuration in table order.
    pub fn find_best(&self, query: &RateQuery) -> Option<&RateConfiguration> {
        let bucket = LvrBucket::from_lvr(query.lvr);
        self.configurations
            .iter()
            .filter(|c| c.matches(query, bucket))
            .fold(None, |best: Option<&RateConfiguration>, candidate| match best {
                Some(current) if current.rate <= candidate.rate => Some(current),
                _ => Some(candidate),
            })
    }
}

/// Formula pricing used when no rate card is loaded. Premiums are
/// percentage points over the caller's base rate, one per LVR band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TieredRateModel {
    pub tier_premiums: [f64; 6],
}

impl Default for TieredRateModel {
    fn default() -> Self {
        Self {
            tier_premiums: [0.0, 0.10, 0.20, 0.45, 0.65, 0.90],
        }
    }
}

impl TieredRateModel {
    const INVESTOR_LOADING: f64 = 0.20;
    const INTEREST_ONLY_LOADING: f64 = 0.30;
    const OFFSET_LOADING: f64 = 0.10;
    const COMPARISON_BASE: f64 = 0.20;
    const COMPARISON_INTEREST_ONLY: f64 = 0.10;
    const COMPARISON_OFFSET: f64 = 0.05;
    const COMPARISON_INVESTOR: f64 = 0.10;

    fn fixed_term_adjustment(product_type: ProductType) -> f64 {
        match product_type {
            ProductType::Variable => 0.0,
            ProductType::Fixed1 => -0.10,
            ProductType::Fixed2 => -0.05,
            ProductType::Fixed3 => 0.05,
            ProductType::Fixed4 => 0.10,
            ProductType::Fixed5 => 0.15,
        }
    }

    pub fn quote(&self, query: &RateQuery, base_rate: f64) -> RateQuote {
        let bucket = LvrBucket::from_lvr(query.lvr);
        let mut rate = base_rate + self.tier_premiums[bucket.index()];
        let mut comparison_loading = Self::COMPARISON_BASE;

        if query.borrower_type == BorrowerType::Investor {
            rate += Self::INVESTOR_LOADING;
            comparison_loading += Self::COMPARISON_INVESTOR;
        }
        rate += Self::fixed_term_adjustment(query.product_type);
        if query.repayment_type == RepaymentType::InterestOnly {
            rate += Self::INTEREST_ONLY_LOADING;
            comparison_loading += Self::COMPARISON_INTEREST_ONLY;
        }
        if query.has_offset {
            rate += Self::OFFSET_LOADING;
            comparison_loading += Self::COMPARISON_OFFSET;
        }

        RateQuote {
            rate,
            comparison_rate: rate + comparison_loading,
        }
    }
}

/// Source of headline and comparison rates for the solver.
#[derive(Debug, Clone)]
pub enum RateResolver {
    Table(Arc<RateTable>),
    Tiered(TieredRateModel),
}

impl Default for RateResolver {
    fn default() -> Self {
        RateResolver::Tiered(TieredRateModel::default())
    }
}

impl RateResolver {
    /// `None` means the rate card has no eligible product.
    pub fn resolve(&self, query: &RateQuery, base_rate: f64) -> Option<RateQuote> {
        match self {
            RateResolver::Table(table) => table.find_best(query).map(RateConfiguration::quote),
            RateResolver::Tiered(model) => Some(model.quote(query, base_rate)),
        }
    }
}
