//! 多解析度的點聚合索引。
//!
//! 建立時從最大 zoom 往下逐層做貪婪半徑聚合：每一層以上一層的節點為輸入，
//! 依插入順序掃描，把半徑內尚未處理的鄰居合併成一個 cluster 節點。
//! 每個節點都帶著 `count` 與 `price_sum`，查詢時直接讀出平均價格，
//! 不需要回頭掃描葉節點。分級 (tier) 不在這裡計算。

use crate::core::kd_index::KdIndex;
use crate::domain::model::{BoundingBox, Record};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_points: usize,
    /// 聚合半徑 (像素，以 `extent` 為一個 tile 的寬度)
    pub radius: f64,
    pub extent: f64,
    pub node_size: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 18,
            min_points: 2,
            radius: 60.0,
            extent: 512.0,
            node_size: 64,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(usize),
    Cluster(u64),
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    count: usize,
    price_sum: f64,
    kind: NodeKind,
}

#[derive(Debug)]
struct Level {
    nodes: Vec<Node>,
    tree: KdIndex,
}

impl Level {
    fn new(nodes: Vec<Node>, node_size: usize) -> Self {
        let tree = KdIndex::new(nodes.iter().map(|n| (n.x, n.y)), node_size);
        Self { nodes, tree }
    }
}

/// 查詢結果：聚合節點或單一紀錄
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry<'a> {
    Cluster {
        id: u64,
        lat: f64,
        lon: f64,
        count: usize,
        price_sum: f64,
    },
    Leaf(&'a Arc<Record>),
}

impl IndexEntry<'_> {
    pub fn count(&self) -> usize {
        match self {
            IndexEntry::Cluster { count, .. } => *count,
            IndexEntry::Leaf(_) => 1,
        }
    }
}

#[derive(Debug)]
pub struct SpatialIndex {
    options: ClusterOptions,
    records: Vec<Arc<Record>>,
    /// `levels[z - min_zoom]`，最後一層 (max_zoom + 1) 只有葉節點
    levels: Vec<Level>,
}

impl SpatialIndex {
    /// 只收 price / lat / lon 皆為有限值的紀錄；相同輸入必定得到相同的樹
    pub fn build<I>(records: I, options: ClusterOptions) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut skipped = 0usize;
        let records: Vec<Arc<Record>> = records
            .into_iter()
            .filter(|r| {
                let ok = r.is_indexable();
                if !ok {
                    skipped += 1;
                }
                ok
            })
            .map(Arc::new)
            .collect();

        if skipped > 0 {
            tracing::warn!("⚠️ Skipped {} records with non-finite price or coordinates", skipped);
        }

        let leaves: Vec<Node> = records
            .iter()
            .enumerate()
            .map(|(i, r)| Node {
                x: lng_x(r.lon),
                y: lat_y(r.lat),
                count: 1,
                price_sum: r.price,
                kind: NodeKind::Leaf(i),
            })
            .collect();

        let min_zoom = options.min_zoom.min(options.max_zoom);
        let mut levels = Vec::with_capacity((options.max_zoom - min_zoom) as usize + 2);
        let mut current = Level::new(leaves, options.node_size);

        for zoom in (min_zoom..=options.max_zoom).rev() {
            let nodes = cluster_level(&current, zoom, &options);
            levels.push(std::mem::replace(&mut current, Level::new(nodes, options.node_size)));
        }
        levels.push(current);
        levels.reverse();

        tracing::debug!(
            "Built spatial index: {} points, {} levels, {} nodes at zoom {}",
            records.len(),
            levels.len(),
            levels.first().map(|l| l.nodes.len()).unwrap_or(0),
            min_zoom
        );

        Self {
            options: ClusterOptions { min_zoom, ..options },
            records,
            levels,
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    /// bbox 內、指定 zoom 的節點。zoom 超過 max_zoom 時回傳葉節點
    pub fn clusters(&self, bbox: &BoundingBox, zoom: i32) -> Vec<IndexEntry<'_>> {
        let level = self.level(zoom);
        self.search(level, bbox)
            .into_iter()
            .map(|i| self.entry(&level.nodes[i]))
            .collect()
    }

    /// bbox 內的所有原始紀錄，不經過任何聚合層
    pub fn points(&self, bbox: &BoundingBox) -> Vec<&Arc<Record>> {
        let level = self.leaf_level();
        self.search(level, bbox)
            .into_iter()
            .filter_map(|i| match level.nodes[i].kind {
                NodeKind::Leaf(r) => Some(&self.records[r]),
                NodeKind::Cluster(_) => None,
            })
            .collect()
    }

    fn level(&self, zoom: i32) -> &Level {
        let min = self.options.min_zoom as i32;
        let max = self.options.max_zoom as i32 + 1;
        let z = zoom.clamp(min, max);
        &self.levels[(z - min) as usize]
    }

    fn leaf_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    fn search(&self, level: &Level, bbox: &BoundingBox) -> Vec<usize> {
        if !bbox.is_finite() {
            return Vec::new();
        }

        let min_lat = bbox.south.clamp(-90.0, 90.0);
        let max_lat = bbox.north.clamp(-90.0, 90.0);

        let (min_lng, max_lng) = if bbox.east - bbox.west >= 360.0 {
            (-180.0, 180.0)
        } else {
            let west = wrap_lng(bbox.west);
            let east = if bbox.east == 180.0 { 180.0 } else { wrap_lng(bbox.east) };
            (west, east)
        };

        if min_lng > max_lng {
            // 跨越換日線：拆成東西兩段
            let mut ids = level.tree.range(lng_x(min_lng), lat_y(max_lat), lng_x(180.0), lat_y(min_lat));
            ids.extend(level.tree.range(lng_x(-180.0), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat)));
            ids.sort_unstable();
            ids.dedup();
            return ids;
        }

        level.tree.range(lng_x(min_lng), lat_y(max_lat), lng_x(max_lng), lat_y(min_lat))
    }

    fn entry(&self, node: &Node) -> IndexEntry<'_> {
        match node.kind {
            NodeKind::Leaf(r) => IndexEntry::Leaf(&self.records[r]),
            NodeKind::Cluster(id) => IndexEntry::Cluster {
                id,
                lat: y_lat(node.y),
                lon: x_lng(node.x),
                count: node.count,
                price_sum: node.price_sum,
            },
        }
    }
}

fn cluster_level(previous: &Level, zoom: u8, options: &ClusterOptions) -> Vec<Node> {
    let radius = options.radius / (options.extent * 2f64.powi(zoom as i32));
    let nodes = &previous.nodes;
    let mut processed = vec![false; nodes.len()];
    let mut next = Vec::new();

    for i in 0..nodes.len() {
        if processed[i] {
            continue;
        }
        processed[i] = true;

        let p = &nodes[i];
        let neighbors = previous.tree.within(p.x, p.y, radius);

        let origin = p.count;
        let total: usize = origin
            + neighbors
                .iter()
                .filter(|&&j| !processed[j])
                .map(|&j| nodes[j].count)
                .sum::<usize>();

        if total > origin && total >= options.min_points {
            let mut wx = p.x * origin as f64;
            let mut wy = p.y * origin as f64;
            let mut price_sum = p.price_sum;

            for &j in &neighbors {
                if processed[j] {
                    continue;
                }
                processed[j] = true;
                let b = &nodes[j];
                wx += b.x * b.count as f64;
                wy += b.y * b.count as f64;
                price_sum += b.price_sum;
            }

            next.push(Node {
                x: wx / total as f64,
                y: wy / total as f64,
                count: total,
                price_sum,
                kind: NodeKind::Cluster(cluster_id(i, zoom)),
            });
        } else {
            next.push(p.clone());

            if total > 1 {
                // 數量不足 min_points：鄰居原樣帶到下一層
                for &j in &neighbors {
                    if processed[j] {
                        continue;
                    }
                    processed[j] = true;
                    next.push(nodes[j].clone());
                }
            }
        }
    }

    next
}

/// 由層級與該層的位置編出穩定的 id
fn cluster_id(position: usize, zoom: u8) -> u64 {
    ((position as u64) << 5) + zoom as u64 + 1
}

fn wrap_lng(lng: f64) -> f64 {
    ((lng + 180.0) % 360.0 + 360.0) % 360.0 - 180.0
}

// Web Mercator，投影到 [0, 1]
fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

fn lat_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}
