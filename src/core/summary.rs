use crate::core::affordability::AffordabilityModel;
use crate::domain::model::{AffordabilityResult, BoundingBox, BuyerState, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 呼叫端的第一層篩選 (面積區間、最早年份)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub area_range: Option<(f64, f64)>,
    pub year_min: Option<i32>,
}

impl RecordFilter {
    /// 設定了條件時，面積/年份未知的紀錄不會通過
    pub fn matches(&self, record: &Record) -> bool {
        if let Some((min, max)) = self.area_range {
            match record.known_area() {
                Some(area) if area >= min && area <= max => {}
                _ => return false,
            }
        }
        if let Some(year_min) = self.year_min {
            match record.year {
                Some(year) if year >= year_min => {}
                _ => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purchasable<'a> {
    pub record: &'a Record,
    pub result: AffordabilityResult,
    pub is_loan_dependent: bool,
}

/// 通過篩選且買得起的紀錄。無法評估的紀錄略過，不影響其他紀錄。
pub fn purchasable<'a>(
    records: &'a [Record],
    model: &AffordabilityModel,
    buyer: &BuyerState,
    filter: &RecordFilter,
) -> Vec<Purchasable<'a>> {
    let mut skipped = 0usize;
    let listing: Vec<Purchasable<'a>> = records
        .iter()
        .filter(|r| filter.matches(r))
        .filter_map(|record| match model.assess_record(record, buyer) {
            Ok(result) => Some((record, result)),
            Err(e) => {
                tracing::debug!("Record {} not assessable: {}", record.id, e);
                skipped += 1;
                None
            }
        })
        .filter(|(record, result)| result.covers(record.price))
        .map(|(record, result)| Purchasable {
            record,
            is_loan_dependent: AffordabilityModel::loan_dependent(record.price, buyer.cash, &result),
            result,
        })
        .collect();

    if skipped > 0 {
        tracing::warn!("⚠️ {} records could not be assessed and were skipped", skipped);
    }
    listing
}

/// 洞名 → 筆數 (面量圖著色用)，空字串不計
pub fn dong_counts<'a, I>(records: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut counts = BTreeMap::new();
    for record in records {
        if record.dong.is_empty() {
            continue;
        }
        *counts.entry(record.dong.clone()).or_insert(0) += 1;
    }
    counts
}

/// 以分位數修剪離群值後的資料範圍 (初始畫面用)，`trim` 為單側比例
pub fn trimmed_bounds<'a, I>(records: I, trim: f64) -> Option<BoundingBox>
where
    I: IntoIterator<Item = &'a Record>,
{
    let (mut lats, mut lons): (Vec<f64>, Vec<f64>) = records
        .into_iter()
        .filter(|r| r.lat.is_finite() && r.lon.is_finite())
        .map(|r| (r.lat, r.lon))
        .unzip();
    if lats.is_empty() {
        return None;
    }

    lats.sort_by(f64::total_cmp);
    lons.sort_by(f64::total_cmp);
    let trim = trim.clamp(0.0, 0.5);

    Some(BoundingBox::new(
        quantile(&lons, trim),
        quantile(&lats, trim),
        quantile(&lons, 1.0 - trim),
        quantile(&lats, 1.0 - trim),
    ))
}

// 線性內插，輸入必須已排序且非空
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let base = pos.floor() as usize;
    let rest = pos - base as f64;
    match sorted.get(base + 1) {
        Some(next) if rest > 0.0 => sorted[base] + rest * (next - sorted[base]),
        _ => sorted[base],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FinancingConfig, PolicyLoan};

    fn record(id: u64, dong: &str, price: f64, area: Option<f64>, year: Option<i32>) -> Record {
        Record {
            id,
            dong: dong.to_string(),
            apt: None,
            area,
            price,
            year,
            lat: 37.5 + id as f64 * 0.01,
            lon: 127.0 + id as f64 * 0.01,
        }
    }

    #[test]
    fn test_filter_requires_known_values() {
        let filter = RecordFilter {
            area_range: Some((45.0, 90.0)),
            year_min: Some(2022),
        };
        assert!(filter.matches(&record(1, "a", 5.0, Some(59.0), Some(2023))));
        assert!(!filter.matches(&record(2, "a", 5.0, Some(120.0), Some(2023))));
        assert!(!filter.matches(&record(3, "a", 5.0, None, Some(2023))));
        assert!(!filter.matches(&record(4, "a", 5.0, Some(59.0), Some(2021))));
        assert!(!filter.matches(&record(5, "a", 5.0, Some(59.0), None)));

        assert!(RecordFilter::default().matches(&record(6, "a", 5.0, None, None)));
    }

    #[test]
    fn test_purchasable_flags_loan_dependency() {
        let records = vec![
            record(1, "Mok-dong", 3.0, Some(59.0), Some(2023)),
            record(2, "Mok-dong", 5.0, Some(59.0), Some(2023)),
            record(3, "Sinjeong-dong", 9.0, Some(59.0), Some(2023)),
            record(4, "Sinjeong-dong", -1.0, Some(59.0), Some(2023)),
        ];
        let buyer = BuyerState::new(4.0, FinancingConfig::Policy(PolicyLoan::newborn()));
        let model = AffordabilityModel::default();

        let listing = purchasable(&records, &model, &buyer, &RecordFilter::default());
        let ids: Vec<u64> = listing.iter().map(|p| p.record.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(!listing[0].is_loan_dependent);
        assert!(listing[1].is_loan_dependent);
    }

    #[test]
    fn test_dong_counts() {
        let records = vec![
            record(1, "Mok-dong", 3.0, None, None),
            record(2, "Mok-dong", 5.0, None, None),
            record(3, "Sinjeong-dong", 9.0, None, None),
            record(4, "", 9.0, None, None),
        ];
        let counts = dong_counts(&records);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["Mok-dong"], 2);
        assert_eq!(counts["Sinjeong-dong"], 1);
    }

    #[test]
    fn test_trimmed_bounds() {
        let records: Vec<Record> = (0..=100).map(|i| record(i, "a", 1.0, None, None)).collect();
        let bounds = trimmed_bounds(&records, 0.02).unwrap();
        assert!((bounds.south - 37.52).abs() < 1e-9);
        assert!((bounds.north - 38.48).abs() < 1e-9);
        assert!((bounds.west - 127.02).abs() < 1e-9);
        assert!((bounds.east - 127.98).abs() < 1e-9);

        assert!(trimmed_bounds(&Vec::<Record>::new(), 0.02).is_none());
    }
}
