use crate::core::affordability::AffordabilityModel;
use crate::core::cluster::{ClusterOptions, IndexEntry, SpatialIndex};
use crate::domain::model::{
    BuyerState, ClusterMarker, MarkerDescriptor, PointMarker, Record, ViewState,
};
use crate::domain::ports::SelectionSink;
use crate::utils::error::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_SHOW_ZOOM: i32 = 13;
pub const DEFAULT_DETAIL_ZOOM: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomBands {
    /// 這個 zoom 以下整個圖層隱藏
    pub show: i32,
    /// 這個 zoom 以上只畫個別成交
    pub detail: i32,
}

impl Default for ZoomBands {
    fn default() -> Self {
        Self {
            show: DEFAULT_SHOW_ZOOM,
            detail: DEFAULT_DETAIL_ZOOM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomBand {
    Hidden,
    Clustered(i32),
    Detail,
}

impl ZoomBands {
    /// zoom 先四捨五入成整數；非有限值視為隱藏
    pub fn band(&self, zoom: f64) -> ZoomBand {
        if !zoom.is_finite() {
            return ZoomBand::Hidden;
        }
        let z = zoom.round() as i32;
        if z < self.show {
            ZoomBand::Hidden
        } else if z < self.detail {
            ZoomBand::Clustered(z)
        } else {
            ZoomBand::Detail
        }
    }
}

/// 對一份索引做一次查詢。純函式：結果只取決於 (index, view, buyer)。
pub fn query_index(
    index: &SpatialIndex,
    model: &AffordabilityModel,
    bands: &ZoomBands,
    view: &ViewState,
    buyer: &BuyerState,
) -> Vec<MarkerDescriptor> {
    match bands.band(view.zoom) {
        ZoomBand::Hidden => {
            tracing::debug!("Zoom {} below show threshold {}, layer hidden", view.zoom, bands.show);
            Vec::new()
        }
        ZoomBand::Clustered(zoom) => {
            let entries = index.clusters(&view.bbox, zoom);
            let markers: Vec<MarkerDescriptor> = entries
                .into_iter()
                .filter_map(|entry| match entry {
                    IndexEntry::Cluster {
                        id,
                        lat,
                        lon,
                        count,
                        price_sum,
                    } => cluster_marker(model, buyer, id, lat, lon, count, price_sum),
                    IndexEntry::Leaf(record) => point_marker(model, buyer, record),
                })
                .collect();
            tracing::debug!("Zoom {} (clustered): {} markers", zoom, markers.len());
            markers
        }
        ZoomBand::Detail => {
            let markers: Vec<MarkerDescriptor> = index
                .points(&view.bbox)
                .into_iter()
                .filter_map(|record| point_marker(model, buyer, record))
                .collect();
            tracing::debug!("Zoom {} (detail): {} markers", view.zoom, markers.len());
            markers
        }
    }
}

fn cluster_marker(
    model: &AffordabilityModel,
    buyer: &BuyerState,
    id: u64,
    lat: f64,
    lon: f64,
    count: usize,
    price_sum: f64,
) -> Option<MarkerDescriptor> {
    if count == 0 {
        return None;
    }
    let mean_price = price_sum / count as f64;

    // 聚合節點沒有單一面積，只套用價格門檻
    match model.assess(mean_price, None, buyer) {
        Ok(result) if result.covers(mean_price) => Some(MarkerDescriptor::Cluster(ClusterMarker {
            id,
            lat,
            lon,
            count,
            mean_price,
            tier: result.tier,
        })),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Skipping cluster {}: {}", id, e);
            None
        }
    }
}

fn point_marker(model: &AffordabilityModel, buyer: &BuyerState, record: &Arc<Record>) -> Option<MarkerDescriptor> {
    let result = match model.assess_record(record, buyer) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Skipping record {}: {}", record.id, e);
            return None;
        }
    };

    if !result.covers(record.price) {
        return None;
    }

    Some(MarkerDescriptor::Point(PointMarker {
        lat: record.lat,
        lon: record.lon,
        record: Arc::clone(record),
        tier: result.tier,
        is_loan_dependent: AffordabilityModel::loan_dependent(record.price, buyer.cash, &result),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    Built,
}

/// 持有目前的索引。重新 build 時整份替換，舊索引不會被原地修改，
/// 仍持有舊 `Arc` 的查詢可以照常完成。
#[derive(Debug, Clone, Default)]
pub struct SpatialAggregator {
    model: AffordabilityModel,
    bands: ZoomBands,
    options: ClusterOptions,
    index: Option<Arc<SpatialIndex>>,
}

impl SpatialAggregator {
    pub fn new(model: AffordabilityModel, bands: ZoomBands, options: ClusterOptions) -> Self {
        Self {
            model,
            bands,
            options,
            index: None,
        }
    }

    pub fn model(&self) -> &AffordabilityModel {
        &self.model
    }

    pub fn bands(&self) -> &ZoomBands {
        &self.bands
    }

    pub fn state(&self) -> AggregatorState {
        if self.index.is_some() {
            AggregatorState::Built
        } else {
            AggregatorState::Idle
        }
    }

    pub fn build<I>(&mut self, records: I) -> Arc<SpatialIndex>
    where
        I: IntoIterator<Item = Record>,
    {
        let index = Arc::new(SpatialIndex::build(records, self.options));
        tracing::info!("🗺️ Spatial index built with {} records", index.len());
        self.index = Some(Arc::clone(&index));
        index
    }

    pub fn index(&self) -> Result<&Arc<SpatialIndex>> {
        self.index.as_ref().ok_or(MapError::EmptyIndex)
    }

    /// 尚未 build 時回傳空集合
    pub fn query(&self, view: &ViewState, buyer: &BuyerState) -> Vec<MarkerDescriptor> {
        match self.index() {
            Ok(index) => query_index(index, &self.model, &self.bands, view, buyer),
            Err(e) => {
                tracing::debug!("Query before build: {}", e);
                Vec::new()
            }
        }
    }
}

/// 目前選取的紀錄 id，由呼叫端持有
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected_id: Option<u64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_id(&self) -> Option<u64> {
        self.selected_id
    }

    /// cluster marker 沒有對應的單筆紀錄，不會觸發選取
    pub fn select_marker<S: SelectionSink + ?Sized>(&mut self, marker: &MarkerDescriptor, sink: &mut S) -> bool {
        match marker.record() {
            Some(record) => {
                self.select_record(record, sink);
                true
            }
            None => false,
        }
    }

    pub fn select_record<S: SelectionSink + ?Sized>(&mut self, record: &Record, sink: &mut S) {
        self.selected_id = Some(record.id);
        sink.on_select(record);
    }

    pub fn clear(&mut self) {
        self.selected_id = None;
    }
}
