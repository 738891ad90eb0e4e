//! 負擔能力模型：把物件價格、買方現金與融資方式換算成「有效購買力」與分級。
//!
//! 所有函式都是純函式。價格必須是正的有限值，現金必須是非負的有限值；
//! 超出定義域的輸入會回傳 `MapError::InvalidInput`，不會被默默夾成 0。

use crate::domain::model::{
    AffordabilityResult, BuyerState, CustomLoan, FinancingConfig, PolicyLoan, PurchaseBreakdown,
    Record, Tier,
};
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_negative, validate_positive};
use serde::{Deserialize, Serialize};

/// 每月可用於還款的所得比例 (年所得 40%)
pub const DEBT_SERVICE_RATIO: f64 = 0.4;

/// 一般貸款統一套用的 LTV 上限
pub const DEFAULT_CUSTOM_LTV_CAP: f64 = 0.7;

pub const DEFAULT_AMPLE_MARGIN: f64 = 2.0;
pub const DEFAULT_COMFORTABLE_MARGIN: f64 = 1.0;
pub const DEFAULT_TIGHT_MARGIN: f64 = 0.0;

/// 分級門檻：以 `有效購買力 - 價格` 的差額比較
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub ample: f64,
    pub comfortable: f64,
    pub tight: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            ample: DEFAULT_AMPLE_MARGIN,
            comfortable: DEFAULT_COMFORTABLE_MARGIN,
            tight: DEFAULT_TIGHT_MARGIN,
        }
    }
}

impl TierThresholds {
    pub fn classify(&self, diff: f64) -> Tier {
        if diff >= self.ample {
            Tier::Ample
        } else if diff >= self.comfortable {
            Tier::Comfortable
        } else if diff >= self.tight {
            Tier::Tight
        } else {
            Tier::Insufficient
        }
    }
}

/// 本息平均攤還下，以年所得 40% 可負擔的最大本金，再扣除既有負債。
///
/// `M = income × 0.4 / 12`，`r = rate / 100 / 12`，`N = term_months`；
/// `P = M × ((1+r)^N − 1) / (r × (1+r)^N)`。
/// 所得、期數或利率不為正、負債為負 (或任一輸入非有限值) 時回傳 0，結果永不為負。
pub fn amortization_capacity(
    annual_income: f64,
    term_months: u32,
    annual_rate_percent: f64,
    existing_debt: f64,
) -> f64 {
    let inputs_ok = annual_income.is_finite()
        && annual_income > 0.0
        && term_months > 0
        && annual_rate_percent.is_finite()
        && annual_rate_percent > 0.0
        && existing_debt.is_finite()
        && existing_debt >= 0.0;
    if !inputs_ok {
        return 0.0;
    }

    let monthly_payment = annual_income * DEBT_SERVICE_RATIO / 12.0;
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    let n = term_months as f64;

    let factor = (1.0 + monthly_rate).powf(n);
    let principal = monthly_payment * (factor - 1.0) / (monthly_rate * factor);

    (principal - existing_debt).max(0.0)
}

impl CustomLoan {
    pub fn capacity(&self) -> f64 {
        amortization_capacity(
            self.annual_income,
            self.term_months,
            self.annual_rate_percent,
            self.existing_debt,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityModel {
    pub thresholds: TierThresholds,
    pub custom_ltv_cap: f64,
}

impl Default for AffordabilityModel {
    fn default() -> Self {
        Self {
            thresholds: TierThresholds::default(),
            custom_ltv_cap: DEFAULT_CUSTOM_LTV_CAP,
        }
    }
}

impl AffordabilityModel {
    pub fn new(thresholds: TierThresholds, custom_ltv_cap: f64) -> Self {
        Self {
            thresholds,
            custom_ltv_cap,
        }
    }

    /// 不考慮適用門檻的可用貸款額
    pub fn usable_loan(&self, price: f64, financing: &FinancingConfig) -> Result<f64> {
        validate_positive("price", price)?;

        let loan = match financing {
            FinancingConfig::None => 0.0,
            FinancingConfig::Policy(policy) => policy_loan(policy, price),
            FinancingConfig::Custom(custom) => custom.capacity().min(self.custom_ltv_cap * price),
        };
        Ok(loan)
    }

    /// 現金 + 可用貸款。政策貸款的價格/面積門檻先於計算：不適用時貸款額為 0。
    pub fn effective_budget(
        &self,
        price: f64,
        area: Option<f64>,
        cash: f64,
        financing: &FinancingConfig,
    ) -> Result<f64> {
        validate_non_negative("cash", cash)?;
        Ok(cash + self.applicable_loan(price, area, financing)?)
    }

    pub fn tier(&self, price: f64, effective_budget: f64) -> Tier {
        self.thresholds.classify(effective_budget - price)
    }

    pub fn assess(&self, price: f64, area: Option<f64>, buyer: &BuyerState) -> Result<AffordabilityResult> {
        validate_non_negative("cash", buyer.cash)?;
        let usable_loan = self.applicable_loan(price, area, &buyer.financing)?;
        let effective_budget = buyer.cash + usable_loan;

        Ok(AffordabilityResult {
            usable_loan,
            effective_budget,
            tier: self.tier(price, effective_budget),
        })
    }

    pub fn assess_record(&self, record: &Record, buyer: &BuyerState) -> Result<AffordabilityResult> {
        self.assess(record.price, record.known_area(), buyer)
    }

    pub fn is_affordable(&self, price: f64, area: Option<f64>, buyer: &BuyerState) -> Result<bool> {
        Ok(self.assess(price, area, buyer)?.covers(price))
    }

    /// 只靠現金買不起，但加上貸款就買得起
    pub fn is_loan_dependent(&self, price: f64, area: Option<f64>, buyer: &BuyerState) -> Result<bool> {
        let result = self.assess(price, area, buyer)?;
        Ok(Self::loan_dependent(price, buyer.cash, &result))
    }

    /// 已評估過的結果是否需要貸款才買得起
    pub fn loan_dependent(price: f64, cash: f64, result: &AffordabilityResult) -> bool {
        result.covers(price) && price > cash
    }

    /// 現金先用到價格為止，不足部分在貸款額度內補上
    pub fn breakdown(&self, price: f64, area: Option<f64>, buyer: &BuyerState) -> Result<PurchaseBreakdown> {
        validate_non_negative("cash", buyer.cash)?;
        let usable_loan = self.applicable_loan(price, area, &buyer.financing)?;

        let cash_used = buyer.cash.min(price);
        let needed_from_loan = (price - cash_used).max(0.0);
        let loan_used = needed_from_loan.min(usable_loan);

        Ok(PurchaseBreakdown {
            cash_used,
            loan_used,
            cash_portion: cash_used / price,
            loan_portion: loan_used / price,
        })
    }

    fn applicable_loan(&self, price: f64, area: Option<f64>, financing: &FinancingConfig) -> Result<f64> {
        let loan = self.usable_loan(price, financing)?;
        match financing {
            FinancingConfig::Policy(policy) if !policy.applies_to(price, area) => Ok(0.0),
            _ => Ok(loan),
        }
    }
}

fn policy_loan(policy: &PolicyLoan, price: f64) -> f64 {
    policy.max_loan.min(policy.loan_to_value_ratio * price)
}
