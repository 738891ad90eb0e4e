//! 靜態 2-D KD 索引 (建立後不可變)。節點以隱式二元樹存在陣列中：
//! 區間 `[left, right]` 的中位數位於 `(left + right) / 2`，左右子樹交替以 x / y 分割。

#[derive(Debug, Clone, Copy)]
struct KdItem {
    id: usize,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone)]
pub struct KdIndex {
    node_size: usize,
    items: Vec<KdItem>,
}

impl KdIndex {
    pub fn new<I>(points: I, node_size: usize) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let node_size = node_size.max(1);
        let mut items: Vec<KdItem> = points
            .into_iter()
            .enumerate()
            .map(|(id, (x, y))| KdItem { id, x, y })
            .collect();
        sort_kd(&mut items, node_size, 0);
        Self { node_size, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 矩形範圍查詢 (含邊界)，回傳以插入順序排序的 id
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let inside = |item: &KdItem| item.x >= min_x && item.x <= max_x && item.y >= min_y && item.y <= max_y;
        self.search(inside, |axis, value| {
            if axis == 0 {
                (min_x <= value, max_x >= value)
            } else {
                (min_y <= value, max_y >= value)
            }
        })
    }

    /// 半徑查詢 (含邊界)，回傳以插入順序排序的 id
    pub fn within(&self, qx: f64, qy: f64, radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        let inside = |item: &KdItem| {
            let dx = item.x - qx;
            let dy = item.y - qy;
            dx * dx + dy * dy <= r2
        };
        self.search(inside, |axis, value| {
            let q = if axis == 0 { qx } else { qy };
            (q - radius <= value, q + radius >= value)
        })
    }

    fn search<F, G>(&self, inside: F, descend: G) -> Vec<usize>
    where
        F: Fn(&KdItem) -> bool,
        G: Fn(usize, f64) -> (bool, bool),
    {
        let mut result = Vec::new();
        if self.items.is_empty() {
            return result;
        }

        let mut stack = vec![(0usize, self.items.len() - 1, 0usize)];
        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                result.extend(self.items[left..=right].iter().filter(|i| inside(*i)).map(|i| i.id));
                continue;
            }

            let m = (left + right) / 2;
            let item = &self.items[m];
            if inside(item) {
                result.push(item.id);
            }

            let value = if axis == 0 { item.x } else { item.y };
            let (go_left, go_right) = descend(axis, value);
            if go_left {
                stack.push((left, m - 1, 1 - axis));
            }
            if go_right {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result.sort_unstable();
        result
    }
}

fn sort_kd(items: &mut [KdItem], node_size: usize, axis: usize) {
    if items.len() <= node_size + 1 {
        return;
    }

    let m = (items.len() - 1) / 2;
    items.select_nth_unstable_by(m, |a, b| {
        let (ka, kb) = if axis == 0 { (a.x, b.x) } else { (a.y, b.y) };
        ka.total_cmp(&kb).then(a.id.cmp(&b.id))
    });

    let (lower, upper) = items.split_at_mut(m);
    sort_kd(lower, node_size, 1 - axis);
    sort_kd(&mut upper[1..], node_size, 1 - axis);
}
