use std::collections::HashMap;

use crate::runner::executor::SkipSet;

/// How the runner walks the run list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderPolicy {
    /// List order, from the resume position to the end.
    #[default]
    InOrder,
    /// Keep feeding the tag with the best running mean while it has configs left.
    BestFirst,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Hands out config positions one at a time, each exactly once.
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: OrderPolicy,
    /// Positions not yet handed out, ascending.
    pending: Vec<usize>,
    /// Tag of every position in the run list.
    tags: Vec<String>,
    /// Distinct tags in first-seen order; ties resolve to the earliest.
    tag_order: Vec<String>,
    means: HashMap<String, RunningMean>,
}

impl Scheduler {
    pub fn new(policy: OrderPolicy, tags: Vec<String>, start: usize) -> Self {
        let mut tag_order: Vec<String> = Vec::new();
        for tag in &tags {
            if !tag_order.contains(tag) {
                tag_order.push(tag.clone());
            }
        }

        Self {
            policy,
            pending: (start.min(tags.len())..tags.len()).collect(),
            tags,
            tag_order,
            means: HashMap::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Record a main-metric observation for `tag`.
    pub fn record(&mut self, tag: &str, value: f64) {
        self.means.entry(tag.to_string()).or_default().push(value);
    }

    /// Next position to run, or `None` once everything was handed out.
    pub fn next(&mut self, skip_set: &SkipSet) -> Option<usize> {
        if self.pending.is_empty() {
            return None;
        }

        let slot = match self.policy {
            OrderPolicy::InOrder => 0,
            OrderPolicy::BestFirst => self
                .best_tag(skip_set)
                .and_then(|tag| self.pending.iter().position(|&i| self.tags[i] == tag))
                .unwrap_or(0),
        };

        Some(self.pending.remove(slot))
    }

    fn best_tag(&self, skip_set: &SkipSet) -> Option<String> {
        let mut best: Option<(&str, f64)> = None;

        for tag in &self.tag_order {
            if skip_set.contains(tag) {
                continue;
            }
            let Some(mean) = self.means.get(tag).and_then(RunningMean::mean) else {
                continue;
            };
            if !self.pending.iter().any(|&i| &self.tags[i] == tag) {
                continue;
            }
            // Strictly greater keeps the earliest tag on ties.
            if best.is_none_or(|(_, current)| mean > current) {
                best = Some((tag, mean));
            }
        }

        best.map(|(tag, _)| tag.to_string())
    }

    /// Running means per tag, in first-seen order.
    pub fn summary(&self) -> Vec<(&str, f64, usize)> {
        self.tag_order
            .iter()
            .filter_map(|tag| {
                let stats = self.means.get(tag)?;
                Some((tag.as_str(), stats.mean()?, stats.count))
            })
            .collect()
    }
}
