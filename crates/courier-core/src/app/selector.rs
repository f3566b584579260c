//! QueueSelector - 重み付きでキューの参照順を決める
//!
//! Every dequeue looks at the lanes in an order drawn at random, each lane
//! weighted by its configured priority. Higher-weight lanes are looked at
//! first more often, while lower-weight lanes still get their turn. In
//! strict mode the order is fixed: highest weight first.

use rand::Rng;

use crate::domain::QueueName;

#[derive(Debug, Clone)]
pub struct QueueSelector {
    /// Sorted by weight, highest first.
    lanes: Vec<(QueueName, u32)>,
    strict: bool,
}

impl QueueSelector {
    pub fn new(lanes: impl IntoIterator<Item = (QueueName, u32)>, strict: bool) -> Self {
        let mut lanes: Vec<_> = lanes.into_iter().collect();
        lanes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self { lanes, strict }
    }

    pub fn lanes(&self) -> &[(QueueName, u32)] {
        &self.lanes
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Order in which lanes are looked at for the next dequeue.
    ///
    /// Weighted sampling without replacement: the first lane is picked with
    /// probability proportional to its weight, the second among the rest,
    /// and so on.
    pub fn order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<QueueName> {
        if self.strict {
            return self.lanes.iter().map(|(name, _)| name.clone()).collect();
        }

        let mut remaining: Vec<&(QueueName, u32)> = self.lanes.iter().collect();
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let total: u64 = remaining.iter().map(|(_, w)| u64::from(*w)).sum();
            let idx = if total == 0 {
                0
            } else {
                let mut pick = rng.gen_range(0..total);
                remaining
                    .iter()
                    .position(|(_, w)| {
                        let w = u64::from(*w);
                        if pick < w {
                            true
                        } else {
                            pick -= w;
                            false
                        }
                    })
                    .unwrap_or(0)
            };
            order.push(remaining.remove(idx).0.clone());
        }
        order
    }
}
