//! State-value and policy tables owned by one training run

use rand::Rng;

use crate::error::{AcError, Result};

/// Floor applied to the perturbed probability before renormalisation
pub const MIN_PROBABILITY: f64 = 1e-8;

/// How policy rows are filled when a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyInit {
    /// Independent uniform draws per entry, rows left unnormalised until first updated.
    /// Sampling from such a row draws proportionally to the raw weights.
    #[default]
    Raw,
    /// Same draws, each row divided by its sum at construction
    Normalized,
}

impl std::str::FromStr for PolicyInit {
    type Err = AcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(PolicyInit::Raw),
            "normalized" | "normalised" => Ok(PolicyInit::Normalized),
            _ => Err(AcError::config(format!("unknown policy init '{}'", s))),
        }
    }
}

/// V(s) estimates, zero-initialised
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    values: Vec<f64>,
}

impl ValueTable {
    pub fn new(nb_states: usize) -> Self {
        Self {
            values: vec![0.0; nb_states],
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, state: usize) -> f64 {
        self.values[state]
    }

    pub fn add(&mut self, state: usize, amount: f64) {
        self.values[state] += amount;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Euclidean norm, used as the tuning objective
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// pi(a|s) stored row-major as `[nb_states][nb_actions]`
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    nb_states: usize,
    nb_actions: usize,
    probs: Vec<f64>,
}

impl PolicyTable {
    pub fn random<R: Rng + ?Sized>(
        nb_states: usize,
        nb_actions: usize,
        init: PolicyInit,
        rng: &mut R,
    ) -> Result<Self> {
        let probs = (0..nb_states * nb_actions)
            .map(|_| rng.random::<f64>())
            .collect();
        let mut table = Self {
            nb_states,
            nb_actions,
            probs,
        };

        if init == PolicyInit::Normalized {
            for state in 0..nb_states {
                table.normalize_row(state)?;
            }
        }

        Ok(table)
    }

    /// Build from explicit rows; all rows must have the same non-zero length
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let nb_actions = rows.first().map(Vec::len).unwrap_or(0);
        if nb_actions == 0 {
            return Err(AcError::config("policy table needs at least one action"));
        }
        if let Some((state, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != nb_actions) {
            return Err(AcError::config(format!(
                "policy row {} has {} actions, expected {}",
                state,
                row.len(),
                nb_actions
            )));
        }

        Ok(Self {
            nb_states: rows.len(),
            nb_actions,
            probs: rows.into_iter().flatten().collect(),
        })
    }

    pub fn nb_states(&self) -> usize {
        self.nb_states
    }

    pub fn nb_actions(&self) -> usize {
        self.nb_actions
    }

    pub fn row(&self, state: usize) -> &[f64] {
        let start = state * self.nb_actions;
        &self.probs[start..start + self.nb_actions]
    }

    pub fn row_mut(&mut self, state: usize) -> &mut [f64] {
        let start = state * self.nb_actions;
        &mut self.probs[start..start + self.nb_actions]
    }

    /// Divide every entry of the row by the row sum
    pub fn normalize_row(&mut self, state: usize) -> Result<()> {
        let row = self.row_mut(state);
        let sum: f64 = row.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(AcError::NumericDegeneracy { state, value: sum });
        }
        for p in row.iter_mut() {
            *p /= sum;
        }
        Ok(())
    }

    /// Categorical draw proportional to the row weights (normalised or not)
    pub fn sample<R: Rng + ?Sized>(&self, state: usize, rng: &mut R) -> Result<usize> {
        let row = self.row(state);
        let total: f64 = row.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(AcError::NumericDegeneracy {
                state,
                value: total,
            });
        }

        let threshold = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        let mut last_positive = 0;
        for (action, &weight) in row.iter().enumerate() {
            if weight > 0.0 {
                last_positive = action;
            }
            cumulative += weight;
            if threshold < cumulative {
                return Ok(action);
            }
        }

        // Rounding left the threshold past the last bucket
        Ok(last_positive)
    }

    /// Most probable action, lowest index on ties
    pub fn greedy_action(&self, state: usize) -> usize {
        let row = self.row(state);
        let mut best = 0;
        for (action, &p) in row.iter().enumerate().skip(1) {
            if p > row[best] {
                best = action;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_value_table_norm() {
        let values = ValueTable::from_values(vec![3.0, 4.0]);
        assert!((values.norm() - 5.0).abs() < 1e-12);
        assert_eq!(ValueTable::new(3).as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_raw_init_is_not_normalized() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = PolicyTable::random(20, 4, PolicyInit::Raw, &mut rng).unwrap();
        let unnormalized = (0..20)
            .filter(|&s| (policy.row(s).iter().sum::<f64>() - 1.0).abs() > 1e-9)
            .count();
        assert!(unnormalized > 0);
        assert!(policy.row(0).iter().all(|&p| (0.0..1.0).contains(&p)));
    }

    #[test]
    fn test_normalized_init_rows_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = PolicyTable::random(20, 4, PolicyInit::Normalized, &mut rng).unwrap();
        for state in 0..20 {
            assert!((policy.row(state).iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sample_follows_weights() {
        let policy = PolicyTable::from_rows(vec![vec![0.0, 3.0, 0.0, 1.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[policy.sample(0, &mut rng).unwrap()] += 1;
        }
        assert_eq!(counts[0], 0);
        assert_eq!(counts[2], 0);
        let share = counts[1] as f64 / 4000.0;
        assert!((share - 0.75).abs() < 0.05, "share = {}", share);
    }

    #[test]
    fn test_sample_rejects_zero_row() {
        let policy = PolicyTable::from_rows(vec![vec![0.0, 0.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            policy.sample(0, &mut rng),
            Err(AcError::NumericDegeneracy { state: 0, .. })
        ));
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(PolicyTable::from_rows(vec![vec![0.5, 0.5], vec![1.0]]).is_err());
        assert!(PolicyTable::from_rows(vec![]).is_err());
    }

    #[test]
    fn test_greedy_action() {
        let policy =
            PolicyTable::from_rows(vec![vec![0.1, 0.6, 0.3], vec![0.4, 0.4, 0.2]]).unwrap();
        assert_eq!(policy.greedy_action(0), 1);
        assert_eq!(policy.greedy_action(1), 0);
    }
}
