//! Portfolio construction: raw per-symbol intent to long-only weights.
//!
//! Allocators never fail. Garbage input (NaN, infinities, negatives) is
//! sanitized to zero and a non-positive budget yields all-zero weights, so a
//! misbehaving strategy can only ever push the portfolio into cash.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TradesimError;

pub const DEFAULT_ALLOCATION_EPS: f64 = 1e-12;

/// Upper bound on water-filling passes.
const MAX_REDISTRIBUTION_PASSES: usize = 10_000;

pub type Weights = BTreeMap<String, f64>;

pub trait Allocator: Send + Sync {
    fn allocate(&self, raw: &BTreeMap<String, f64>, budget: f64) -> Weights;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    Proportional,
    EqualWeight,
}

impl FromStr for AllocationPolicy {
    type Err = TradesimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proportional" => Ok(AllocationPolicy::Proportional),
            "equal_weight" | "equal" => Ok(AllocationPolicy::EqualWeight),
            other => Err(TradesimError::config_invalid(
                "allocation",
                "policy",
                format!("unknown allocation policy '{other}', expected proportional or equal_weight"),
            )),
        }
    }
}

impl fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationPolicy::Proportional => write!(f, "proportional"),
            AllocationPolicy::EqualWeight => write!(f, "equal_weight"),
        }
    }
}

impl AllocationPolicy {
    pub fn build(self, cap: Option<f64>) -> Box<dyn Allocator> {
        match self {
            AllocationPolicy::Proportional => Box::new(ProportionalAllocator::new(cap)),
            AllocationPolicy::EqualWeight => Box::new(EqualWeightAllocator::new(cap)),
        }
    }
}

/// The `[allocation]` section: which policy, how much of equity to deploy,
/// and an optional per-symbol ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationConfig {
    pub policy: AllocationPolicy,
    pub budget: f64,
    pub cap: Option<f64>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        AllocationConfig {
            policy: AllocationPolicy::Proportional,
            budget: 1.0,
            cap: None,
        }
    }
}

impl AllocationConfig {
    pub fn allocator(&self) -> Box<dyn Allocator> {
        self.policy.build(self.cap)
    }
}

/// Weights proportional to signal strength, summing to the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ProportionalAllocator {
    pub cap: Option<f64>,
    pub eps: f64,
}

impl ProportionalAllocator {
    pub fn new(cap: Option<f64>) -> Self {
        Self {
            cap,
            eps: DEFAULT_ALLOCATION_EPS,
        }
    }
}

impl Allocator for ProportionalAllocator {
    fn allocate(&self, raw: &BTreeMap<String, f64>, budget: f64) -> Weights {
        if !valid_budget(budget) {
            return zeros(raw);
        }

        let clean = sanitize_long_only(raw);
        let total: f64 = clean.values().sum();
        if total <= self.eps {
            return zeros(&clean);
        }

        let weights: Weights = clean
            .into_iter()
            .map(|(k, v)| (k, v / total * budget))
            .collect();

        match self.cap {
            Some(cap) => cap_and_redistribute(weights, cap, budget, self.eps),
            None => renormalize(weights, budget, self.eps),
        }
    }
}

/// Equal weight across every symbol with positive intent.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualWeightAllocator {
    pub cap: Option<f64>,
    pub eps: f64,
}

impl EqualWeightAllocator {
    pub fn new(cap: Option<f64>) -> Self {
        Self {
            cap,
            eps: DEFAULT_ALLOCATION_EPS,
        }
    }
}

impl Allocator for EqualWeightAllocator {
    fn allocate(&self, raw: &BTreeMap<String, f64>, budget: f64) -> Weights {
        if !valid_budget(budget) {
            return zeros(raw);
        }

        let clean = sanitize_long_only(raw);
        let active = clean.values().filter(|&&v| v > self.eps).count();
        if active == 0 {
            return zeros(&clean);
        }

        let each = budget / active as f64;
        let weights: Weights = clean
            .into_iter()
            .map(|(k, v)| (k, if v > self.eps { each } else { 0.0 }))
            .collect();

        match self.cap {
            Some(cap) => cap_and_redistribute(weights, cap, budget, self.eps),
            None => weights,
        }
    }
}

fn valid_budget(budget: f64) -> bool {
    budget.is_finite() && budget > 0.0
}

fn zeros(raw: &BTreeMap<String, f64>) -> Weights {
    raw.keys().map(|k| (k.clone(), 0.0)).collect()
}

/// NaN, infinities and negatives become 0.
pub fn sanitize_long_only(raw: &BTreeMap<String, f64>) -> Weights {
    raw.iter()
        .map(|(k, &v)| {
            let x = if v.is_finite() && v > 0.0 { v } else { 0.0 };
            (k.clone(), x)
        })
        .collect()
}

fn renormalize(weights: Weights, budget: f64, eps: f64) -> Weights {
    let total: f64 = weights.values().sum();
    if total > budget + eps {
        let scale = budget / total;
        weights.into_iter().map(|(k, v)| (k, v * scale)).collect()
    } else {
        weights
    }
}

/// Capped water-filling.
///
/// Clips every weight to `cap`, then repeatedly hands the shortfall
/// `budget - sum` to the symbols still below the cap, proportionally to their
/// current weight. When every under-cap symbol sits at (near) zero the
/// shortfall is split equally between them instead, so a zero-intent symbol can
/// pick up weight once all active symbols are saturated. Stops when the budget
/// is met, nothing can absorb more, a pass changes nothing, or the pass limit
/// is reached.
pub fn cap_and_redistribute(weights: Weights, cap: f64, budget: f64, eps: f64) -> Weights {
    if cap.is_nan() || cap <= 0.0 {
        return weights.into_keys().map(|k| (k, 0.0)).collect();
    }

    let mut w: Weights = weights.into_iter().map(|(k, v)| (k, v.min(cap))).collect();

    for _ in 0..MAX_REDISTRIBUTION_PASSES {
        let total: f64 = w.values().sum();
        if total >= budget - eps {
            break;
        }
        let leftover = budget - total;

        let eligible: Vec<String> = w
            .iter()
            .filter(|&(_, &v)| v < cap - eps)
            .map(|(k, _)| k.clone())
            .collect();
        if eligible.is_empty() {
            break;
        }

        let base: f64 = eligible.iter().map(|k| w[k]).sum();
        let equal_share = leftover / eligible.len() as f64;

        let mut changed = false;
        for k in &eligible {
            let current = w[k];
            let add = if base <= eps {
                equal_share
            } else {
                leftover * (current / base)
            };
            let next = cap.min(current + add);
            if (next - current).abs() > eps {
                changed = true;
            }
            w.insert(k.clone(), next);
        }
        if !changed {
            break;
        }
    }

    renormalize(w, budget, eps)
}
