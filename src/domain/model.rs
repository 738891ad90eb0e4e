use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 一筆實價登錄成交紀錄。金額單位一律為「億」(price unit)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    /// 行政洞名
    pub dong: String,
    pub apt: Option<String>,
    /// 專有面積 (m²)，未知時為 None
    pub area: Option<f64>,
    pub price: f64,
    pub year: Option<i32>,
    pub lat: f64,
    pub lon: f64,
}

impl Record {
    /// 進入核心前的邊界條件：price / lat / lon 必須是有限值
    pub fn is_indexable(&self) -> bool {
        self.price.is_finite() && self.lat.is_finite() && self.lon.is_finite()
    }

    pub fn known_area(&self) -> Option<f64> {
        self.area.filter(|a| a.is_finite())
    }
}

/// 政策型貸款 (固定條件、有所得/價格/面積門檻)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyLoan {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub max_loan: f64,
    #[serde(alias = "ltv")]
    pub loan_to_value_ratio: f64,
    pub max_income: f64,
    pub max_price: f64,
    pub max_area: f64,
}

impl PolicyLoan {
    /// 新生兒特例購屋貸款
    pub fn newborn() -> Self {
        Self {
            id: "newborn".to_string(),
            name: "Newborn special".to_string(),
            max_loan: 4.0,
            loan_to_value_ratio: 0.7,
            max_income: 1.3,
            max_price: 9.0,
            max_area: 85.0,
        }
    }

    /// 新婚夫婦購屋貸款
    pub fn newlywed() -> Self {
        Self {
            id: "newlywed".to_string(),
            name: "Newlywed".to_string(),
            max_loan: 3.2,
            loan_to_value_ratio: 0.7,
            max_income: 0.85,
            max_price: 6.0,
            max_area: 85.0,
        }
    }

    /// 所得門檻 (由呼叫端在建立 FinancingConfig::Policy 之前檢查)
    pub fn is_eligible(&self, annual_income: f64) -> bool {
        annual_income.is_finite() && annual_income <= self.max_income
    }

    /// 價格/面積門檻：不符合時這個商品對該物件完全不適用
    pub fn applies_to(&self, price: f64, area: Option<f64>) -> bool {
        if price > self.max_price {
            return false;
        }
        match area.filter(|a| a.is_finite()) {
            Some(area) => area <= self.max_area,
            None => true,
        }
    }
}

/// 一般市場利率貸款，可貸額度由所得以本息平均攤還反推
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomLoan {
    /// 年所得 (每月可負擔額 = 年所得 × 0.4 / 12)
    pub annual_income: f64,
    pub term_months: u32,
    pub annual_rate_percent: f64,
    #[serde(default)]
    pub existing_debt: f64,
}

/// 同一時間只會有一種融資方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinancingConfig {
    #[default]
    None,
    Policy(PolicyLoan),
    Custom(CustomLoan),
}

/// 使用者輸入的快照，核心只讀不改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerState {
    pub cash: f64,
    #[serde(default)]
    pub financing: FinancingConfig,
}

impl BuyerState {
    pub fn new(cash: f64, financing: FinancingConfig) -> Self {
        Self { cash, financing }
    }

    pub fn cash_only(cash: f64) -> Self {
        Self::new(cash, FinancingConfig::None)
    }
}

/// 負擔能力分級，宣告順序即序數 (Insufficient < Tight < Comfortable < Ample)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Insufficient,
    Tight,
    Comfortable,
    Ample,
}

impl Tier {
    pub fn name(self) -> &'static str {
        match self {
            Self::Insufficient => "Insufficient",
            Self::Tight => "Tight",
            Self::Comfortable => "Comfortable",
            Self::Ample => "Ample",
        }
    }

    pub fn is_affordable(self) -> bool {
        self != Self::Insufficient
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityResult {
    pub usable_loan: f64,
    pub effective_budget: f64,
    pub tier: Tier,
}

impl AffordabilityResult {
    /// 預算足以支付該價格
    pub fn covers(&self, price: f64) -> bool {
        self.effective_budget >= price
    }
}

/// 選取物件時的「現金 + 貸款」組成
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurchaseBreakdown {
    pub cash_used: f64,
    pub loan_used: f64,
    pub cash_portion: f64,
    pub loan_portion: f64,
}

/// [west, south, east, north]，經緯度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn from_array(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    pub fn is_finite(&self) -> bool {
        self.west.is_finite() && self.south.is_finite() && self.east.is_finite() && self.north.is_finite()
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lon_ok = if self.west <= self.east {
            lon >= self.west && lon <= self.east
        } else {
            lon >= self.west || lon <= self.east
        };
        lon_ok && lat >= self.south && lat <= self.north
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: f64,
    pub bbox: BoundingBox,
}

impl ViewState {
    pub fn new(zoom: f64, bbox: BoundingBox) -> Self {
        Self { zoom, bbox }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMarker {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
    pub count: usize,
    pub mean_price: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMarker {
    pub lat: f64,
    pub lon: f64,
    pub record: Arc<Record>,
    pub tier: Tier,
    pub is_loan_dependent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerDescriptor {
    Cluster(ClusterMarker),
    Point(PointMarker),
}

impl MarkerDescriptor {
    pub fn tier(&self) -> Tier {
        match self {
            Self::Cluster(c) => c.tier,
            Self::Point(p) => p.tier,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        match self {
            Self::Cluster(c) => (c.lat, c.lon),
            Self::Point(p) => (p.lat, p.lon),
        }
    }

    pub fn record(&self) -> Option<&Arc<Record>> {
        match self {
            Self::Cluster(_) => None,
            Self::Point(p) => Some(&p.record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Insufficient < Tier::Tight);
        assert!(Tier::Tight < Tier::Comfortable);
        assert!(Tier::Comfortable < Tier::Ample);
    }

    #[test]
    fn test_policy_gates() {
        let loan = PolicyLoan::newborn();
        assert!(loan.is_eligible(1.3));
        assert!(!loan.is_eligible(1.31));
        assert!(loan.applies_to(9.0, Some(84.9)));
        assert!(!loan.applies_to(9.1, None));
        assert!(!loan.applies_to(5.0, Some(100.0)));
        assert!(loan.applies_to(5.0, Some(f64::NAN)));
    }

    #[test]
    fn test_financing_config_serde() {
        let json = r#"{"type":"custom","annual_income":0.8,"term_months":360,"annual_rate_percent":4.5}"#;
        let config: FinancingConfig = serde_json::from_str(json).unwrap();
        match config {
            FinancingConfig::Custom(loan) => {
                assert_eq!(loan.term_months, 360);
                assert_eq!(loan.existing_debt, 0.0);
            }
            other => panic!("unexpected financing: {:?}", other),
        }
    }

    #[test]
    fn test_bbox_contains_across_antimeridian() {
        let bbox = BoundingBox::new(170.0, -10.0, -170.0, 10.0);
        assert!(bbox.contains(0.0, 175.0));
        assert!(bbox.contains(0.0, -175.0));
        assert!(!bbox.contains(0.0, 0.0));
    }
}
