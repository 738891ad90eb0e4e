use crate::core::{Record, RecordSource, Storage};
use crate::utils::error::Result;
use serde::Deserialize;

/// 成交金額欄位 (dealAmount) 的單位是「萬」，換算成「億」
const MANWON_PER_EOK: f64 = 10_000.0;

/// 原始 CSV 欄位。實價登錄 API 的欄位名稱與簡化欄位名稱都接受。
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default, alias = "umdNm")]
    dong: Option<String>,
    #[serde(default, alias = "aptNm")]
    apt: Option<String>,
    #[serde(default, alias = "excluUseAr")]
    area: Option<String>,
    #[serde(default, rename = "dealAmount")]
    deal_amount: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default, alias = "dealYear")]
    year: Option<String>,
    #[serde(default, alias = "Latitude")]
    lat: Option<String>,
    #[serde(default, alias = "Longitude")]
    lon: Option<String>,
}

/// 解析後的結果與被丟棄的列數
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecords {
    pub records: Vec<Record>,
    pub dropped: usize,
}

/// 把 CSV 內容轉成 Record。無法解碼或 price / lat / lon 不是有限值的列直接丟棄。
pub fn parse_records(data: &[u8]) -> Result<ParsedRecords> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    // 標頭讀不到時整份資料無法對應欄位
    reader.headers()?;

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (i, row) in reader.deserialize::<RawRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("Row {} could not be decoded: {}", i + 1, e);
                dropped += 1;
                continue;
            }
        };
        match map_row(row, i as u64 + 1) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    Ok(ParsedRecords { records, dropped })
}

fn map_row(row: RawRow, id: u64) -> Option<Record> {
    let price = match parse_number(row.deal_amount.as_deref()) {
        Some(manwon) => manwon / MANWON_PER_EOK,
        None => parse_number(row.price.as_deref())?,
    };
    let lat = parse_number(row.lat.as_deref())?;
    let lon = parse_number(row.lon.as_deref())?;

    let record = Record {
        id,
        dong: row.dong.unwrap_or_default(),
        apt: row.apt.filter(|s| !s.is_empty()),
        area: parse_number(row.area.as_deref()),
        price,
        year: parse_number(row.year.as_deref()).map(|y| y as i32),
        lat,
        lon,
    };
    record.is_indexable().then_some(record)
}

/// 允許千分位逗號 ("12,500")；空白或非數字視為未知
fn parse_number(value: Option<&str>) -> Option<f64> {
    let cleaned: String = value?.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct CsvRecordSource<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> CsvRecordSource<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }
}

impl<S: Storage> RecordSource for CsvRecordSource<S> {
    async fn load_records(&self) -> Result<Vec<Record>> {
        tracing::debug!("Reading transaction data from: {}", self.path);
        let data = self.storage.read_file(&self.path).await?;

        let parsed = parse_records(&data)?;
        if parsed.dropped > 0 {
            tracing::warn!(
                "⚠️ Dropped {} rows without a finite price or coordinates",
                parsed.dropped
            );
        }
        tracing::info!("📥 Loaded {} records from {}", parsed.records.len(), self.path);

        Ok(parsed.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::MapError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn with_file(path: &str, data: &str) -> Self {
            let mut files = HashMap::new();
            files.insert(path.to_string(), data.as_bytes().to_vec());
            Self {
                files: Arc::new(Mutex::new(files)),
            }
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                MapError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_parse_api_columns() {
        let csv = "umdNm,aptNm,excluUseAr,dealAmount,dealYear,Latitude,Longitude\n\
                   Mok-dong,Hyundai,84.97,\"125,000\",2024,37.5301,126.8750\n";
        let parsed = parse_records(csv.as_bytes()).unwrap();

        assert_eq!(parsed.dropped, 0);
        let record = &parsed.records[0];
        assert_eq!(record.id, 1);
        assert_eq!(record.dong, "Mok-dong");
        assert_eq!(record.apt.as_deref(), Some("Hyundai"));
        assert_eq!(record.area, Some(84.97));
        assert!((record.price - 12.5).abs() < 1e-12);
        assert_eq!(record.year, Some(2024));
    }

    #[test]
    fn test_parse_simple_columns_with_unknown_area() {
        let csv = "dong,apt,area,price,year,lat,lon\n\
                   Sinjeong-dong,,,5.0,,37.51,126.85\n";
        let parsed = parse_records(csv.as_bytes()).unwrap();

        let record = &parsed.records[0];
        assert_eq!(record.apt, None);
        assert_eq!(record.area, None);
        assert_eq!(record.year, None);
        assert_eq!(record.price, 5.0);
    }

    #[test]
    fn test_rows_without_coordinates_are_dropped() {
        let csv = "dong,price,lat,lon\n\
                   a,5.0,37.5,127.0\n\
                   b,5.0,,127.0\n\
                   c,abc,37.5,127.0\n\
                   d,6.0,37.6,127.1\n";
        let parsed = parse_records(csv.as_bytes()).unwrap();

        assert_eq!(parsed.dropped, 2);
        let ids: Vec<u64> = parsed.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_undecodable_row_is_dropped_not_fatal() {
        let mut csv = b"dong,price,lat,lon\na,5.0,37.5,127.0\n".to_vec();
        csv.extend_from_slice(b"b\xff\xfe,5.0,37.5,127.0\n");
        csv.extend_from_slice(b"c,6.0,37.6,127.1\n");

        let parsed = parse_records(&csv).unwrap();
        assert_eq!(parsed.dropped, 1);
        let ids: Vec<u64> = parsed.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_csv_source_reads_through_storage() {
        let storage = MockStorage::with_file("deals.csv", "dong,price,lat,lon\na,5.0,37.5,127.0\n");
        let source = CsvRecordSource::new(storage, "deals.csv");

        let records = source.load_records().await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_csv_source_missing_file() {
        let storage = MockStorage::with_file("other.csv", "");
        let source = CsvRecordSource::new(storage, "deals.csv");

        let err = source.load_records().await.unwrap_err();
        assert!(matches!(err, MapError::IoError(_)));
    }
}
