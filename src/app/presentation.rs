use crate::domain::model::{MarkerDescriptor, Tier};
use serde::{Deserialize, Serialize};

/// tier → 顏色對照。核心只回傳 tier，顏色由這裡 (設定檔) 決定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub ample: String,
    pub comfortable: String,
    pub tight: String,
    /// None 表示不畫
    pub insufficient: Option<String>,
    /// 需要貸款才買得起的物件外框顏色
    pub loan_badge: String,
    pub unit_suffix: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            ample: "#22c55e".to_string(),
            comfortable: "#fb923c".to_string(),
            tight: "#ec5353".to_string(),
            insufficient: None,
            loan_badge: "#38bdf8".to_string(),
            unit_suffix: "억".to_string(),
        }
    }
}

impl Palette {
    pub fn color(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Ample => Some(&self.ample),
            Tier::Comfortable => Some(&self.comfortable),
            Tier::Tight => Some(&self.tight),
            Tier::Insufficient => self.insufficient.as_deref(),
        }
    }

    pub fn price_label(&self, price: f64) -> String {
        format!("{:.1}{}", price, self.unit_suffix)
    }

    /// marker 上顯示的文字
    pub fn marker_label(&self, marker: &MarkerDescriptor) -> String {
        match marker {
            MarkerDescriptor::Cluster(c) => {
                format!("avg {} ({} deals)", self.price_label(c.mean_price), c.count)
            }
            MarkerDescriptor::Point(p) => {
                let apt = p.record.apt.as_deref().unwrap_or("");
                format!("{} / {} / {}", p.record.dong, apt, self.price_label(p.record.price))
            }
        }
    }

    pub fn border(&self, marker: &MarkerDescriptor) -> Option<&str> {
        match marker {
            MarkerDescriptor::Point(p) if p.is_loan_dependent => Some(&self.loan_badge),
            _ => None,
        }
    }
}

pub fn tier_message(tier: Tier) -> &'static str {
    match tier {
        Tier::Ample => "Plenty of room in the budget for this one",
        Tier::Comfortable => "A comfortable purchase",
        Tier::Tight => "Affordable, but only just",
        Tier::Insufficient => "Over budget",
    }
}
