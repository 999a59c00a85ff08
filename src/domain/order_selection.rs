//! Model-order search by information criterion.
//!
//! Candidates are (p, d, q) triples drawn from an explicit grid. The stepwise
//! strategy starts from a handful of small orders and repeatedly moves to the
//! best neighbour (p or q changed by one, or both together) until no
//! neighbour improves the score. Each batch of candidates is independent and
//! may be fitted in parallel; results are reduced in candidate order so the
//! outcome does not depend on scheduling.

use crate::domain::engine::{FitStatistics, FittedModel, ForecastEngine};
use crate::domain::error::ArimaTraderError;
use crate::domain::series::{ModelOrder, PriceSeries};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const TIE_TOLERANCE: f64 = 1e-9;

/// Scores a fitted model; lower is better.
pub trait InformationCriterion: Sync {
    fn name(&self) -> &'static str;
    fn score(&self, stats: &FitStatistics) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criterion {
    #[default]
    Aic,
    Bic,
}

impl InformationCriterion for Criterion {
    fn name(&self) -> &'static str {
        match self {
            Criterion::Aic => "aic",
            Criterion::Bic => "bic",
        }
    }

    fn score(&self, stats: &FitStatistics) -> f64 {
        match self {
            Criterion::Aic => stats.aic(),
            Criterion::Bic => stats.bic(),
        }
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aic" => Ok(Criterion::Aic),
            "bic" => Ok(Criterion::Bic),
            other => Err(format!("unknown criterion '{}'", other)),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    #[default]
    Stepwise,
    Exhaustive,
}

/// Bounds of the candidate grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpace {
    pub max_p: usize,
    pub max_q: usize,
    pub d_values: Vec<usize>,
}

impl SearchSpace {
    pub fn new(max_p: usize, max_q: usize, d_values: Vec<usize>) -> Self {
        Self {
            max_p,
            max_q,
            d_values,
        }
    }

    pub fn contains(&self, order: ModelOrder) -> bool {
        order.p <= self.max_p && order.q <= self.max_q && self.d_values.contains(&order.d)
    }

    /// Every candidate, ordered by d, then p, then q.
    pub fn grid(&self) -> Vec<ModelOrder> {
        let mut out = Vec::new();
        for &d in &self.d_values {
            for p in 0..=self.max_p {
                for q in 0..=self.max_q {
                    out.push(ModelOrder::new(p, d, q));
                }
            }
        }
        out
    }
}

/// Score of one candidate; `None` when the fit failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub order: ModelOrder,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub order: ModelOrder,
    pub score: f64,
    pub criterion: &'static str,
    /// Every candidate evaluated, in evaluation order.
    pub evaluated: Vec<CandidateScore>,
}

/// True when `a` should be preferred over `b`: lower score, then fewer ARMA
/// parameters, then smaller d, then smaller p.
pub fn is_better(a: (ModelOrder, f64), b: (ModelOrder, f64)) -> bool {
    let (order_a, score_a) = a;
    let (order_b, score_b) = b;
    let tolerance = TIE_TOLERANCE * score_a.abs().max(score_b.abs()).max(1.0);
    if (score_a - score_b).abs() > tolerance {
        return score_a < score_b;
    }
    (order_a.arma_params(), order_a.d, order_a.p) < (order_b.arma_params(), order_b.d, order_b.p)
}

pub struct OrderSelector<'a, E> {
    engine: &'a E,
    criterion: &'a dyn InformationCriterion,
    space: SearchSpace,
    strategy: SearchStrategy,
    parallel: bool,
}

impl<'a, E> OrderSelector<'a, E>
where
    E: ForecastEngine + Sync,
{
    pub fn new(engine: &'a E, criterion: &'a dyn InformationCriterion, space: SearchSpace) -> Self {
        Self {
            engine,
            criterion,
            space,
            strategy: SearchStrategy::Stepwise,
            parallel: true,
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn select(&self, series: &PriceSeries) -> Result<Selection, ArimaTraderError> {
        let mut evaluated = Vec::new();
        let mut best: Option<(ModelOrder, f64)> = None;

        match self.strategy {
            SearchStrategy::Exhaustive => {
                let scores = self.evaluate(series, &self.space.grid());
                best = reduce(best, &scores);
                evaluated.extend(scores);
            }
            SearchStrategy::Stepwise => {
                for &d in &self.space.d_values {
                    let scores = self.stepwise(series, d);
                    best = reduce(best, &scores);
                    evaluated.extend(scores);
                }
            }
        }

        let (order, score) = best.ok_or_else(|| ArimaTraderError::ModelSelection {
            window_end: series.last_date(),
            window_len: series.len(),
            reason: format!("none of {} candidate orders could be fitted", evaluated.len()),
        })?;

        tracing::info!(
            %order,
            criterion = self.criterion.name(),
            score,
            candidates = evaluated.len(),
            "selected model order"
        );

        Ok(Selection {
            order,
            score,
            criterion: self.criterion.name(),
            evaluated,
        })
    }

    fn stepwise(&self, series: &PriceSeries, d: usize) -> Vec<CandidateScore> {
        let mut seen: HashSet<ModelOrder> = HashSet::new();
        let mut evaluated = Vec::new();

        let initial: Vec<ModelOrder> = [(2, 2), (0, 0), (1, 0), (0, 1)]
            .into_iter()
            .map(|(p, q)| ModelOrder::new(p, d, q))
            .filter(|o| self.space.contains(*o) && seen.insert(*o))
            .collect();
        let scores = self.evaluate(series, &initial);
        let mut best = reduce(None, &scores);
        evaluated.extend(scores);

        while let Some((current, current_score)) = best {
            let neighbours: Vec<ModelOrder> = neighbours(current)
                .into_iter()
                .filter(|o| self.space.contains(*o) && seen.insert(*o))
                .collect();
            if neighbours.is_empty() {
                break;
            }
            let scores = self.evaluate(series, &neighbours);
            let next = reduce(best, &scores);
            evaluated.extend(scores);
            match next {
                Some(candidate) if candidate.0 != current => {
                    tracing::debug!(from = %current, to = %candidate.0, score = candidate.1, "stepwise move");
                    best = Some(candidate);
                }
                _ => {
                    tracing::debug!(order = %current, score = current_score, "stepwise search settled");
                    break;
                }
            }
        }

        evaluated
    }

    fn evaluate(&self, series: &PriceSeries, orders: &[ModelOrder]) -> Vec<CandidateScore> {
        let score_one = |order: &ModelOrder| CandidateScore {
            order: *order,
            score: self.score(series, *order),
        };
        if self.parallel && orders.len() > 1 {
            orders.par_iter().map(score_one).collect()
        } else {
            orders.iter().map(score_one).collect()
        }
    }

    fn score(&self, series: &PriceSeries, order: ModelOrder) -> Option<f64> {
        match self.engine.fit(series, order) {
            Ok(model) => {
                let score = self.criterion.score(&model.statistics());
                tracing::debug!(%order, score, "candidate fitted");
                score.is_finite().then_some(score)
            }
            Err(e) => {
                tracing::debug!(%order, error = %e, "candidate rejected");
                None
            }
        }
    }
}

fn neighbours(order: ModelOrder) -> Vec<ModelOrder> {
    let ModelOrder { p, d, q } = order;
    let mut out = Vec::with_capacity(6);
    let mut push = |p: Option<usize>, q: Option<usize>| {
        if let (Some(p), Some(q)) = (p, q) {
            out.push(ModelOrder::new(p, d, q));
        }
    };
    push(p.checked_sub(1), Some(q));
    push(Some(p + 1), Some(q));
    push(Some(p), q.checked_sub(1));
    push(Some(p), Some(q + 1));
    push(p.checked_sub(1), q.checked_sub(1));
    push(Some(p + 1), Some(q + 1));
    out
}

fn reduce(
    best: Option<(ModelOrder, f64)>,
    scores: &[CandidateScore],
) -> Option<(ModelOrder, f64)> {
    scores
        .iter()
        .filter_map(|c| c.score.map(|s| (c.order, s)))
        .fold(best, |acc, candidate| match acc {
            Some(current) if !is_better(candidate, current) => Some(current),
            _ => Some(candidate),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::IntervalForecast;
    use crate::domain::series::TimePoint;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// Engine whose log-likelihood per order is looked up from a table.
    struct TableEngine {
        loglik: HashMap<ModelOrder, f64>,
    }

    struct TableModel {
        order: ModelOrder,
        loglik: f64,
    }

    impl FittedModel for TableModel {
        fn order(&self) -> ModelOrder {
            self.order
        }

        fn statistics(&self) -> FitStatistics {
            FitStatistics {
                log_likelihood: self.loglik,
                parameters: self.order.p + self.order.q + 1,
                observations: 100,
            }
        }

        fn forecast(&self, horizon: usize) -> Result<Vec<f64>, ArimaTraderError> {
            Ok(vec![0.0; horizon])
        }

        fn forecast_intervals(
            &self,
            _horizon: usize,
            _level: f64,
        ) -> Result<Vec<IntervalForecast>, ArimaTraderError> {
            Ok(Vec::new())
        }
    }

    impl ForecastEngine for TableEngine {
        type Model = TableModel;

        fn fit(&self, _: &PriceSeries, order: ModelOrder) -> Result<TableModel, ArimaTraderError> {
            self.loglik
                .get(&order)
                .map(|&loglik| TableModel { order, loglik })
                .ok_or_else(|| ArimaTraderError::Convergence {
                    order,
                    window_end: None,
                    window_len: 0,
                    reason: "not in table".into(),
                })
        }
    }

    fn series() -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            (0..10)
                .map(|i| TimePoint::new(start + chrono::Duration::days(i), 100.0 + i as f64))
                .collect(),
        )
        .unwrap()
    }

    fn engine(entries: &[((usize, usize, usize), f64)]) -> TableEngine {
        TableEngine {
            loglik: entries
                .iter()
                .map(|&((p, d, q), ll)| (ModelOrder::new(p, d, q), ll))
                .collect(),
        }
    }

    #[test]
    fn stepwise_walks_to_better_neighbour() {
        // aic = -2 ll + 2 (p + q + 1)
        let engine = engine(&[
            ((0, 1, 0), -50.0),
            ((1, 1, 0), -45.0),
            ((0, 1, 1), -49.0),
            ((2, 1, 2), -48.0),
            ((2, 1, 0), -40.0),
            ((3, 1, 0), -39.5),
            ((1, 1, 1), -44.0),
        ]);
        let space = SearchSpace::new(3, 2, vec![1]);
        let selection = OrderSelector::new(&engine, &Criterion::Aic, space)
            .with_parallel(false)
            .select(&series())
            .unwrap();
        assert_eq!(selection.order, ModelOrder::new(2, 1, 0));
        assert!((selection.score - 86.0).abs() < 1e-12);
    }

    #[test]
    fn exhaustive_and_parallel_agree() {
        let engine = engine(&[
            ((0, 1, 0), -50.0),
            ((1, 1, 0), -45.0),
            ((0, 1, 1), -46.0),
            ((1, 1, 1), -40.0),
        ]);
        let space = SearchSpace::new(1, 1, vec![1]);
        let sequential = OrderSelector::new(&engine, &Criterion::Aic, space.clone())
            .with_strategy(SearchStrategy::Exhaustive)
            .with_parallel(false)
            .select(&series())
            .unwrap();
        let parallel = OrderSelector::new(&engine, &Criterion::Aic, space)
            .with_strategy(SearchStrategy::Exhaustive)
            .select(&series())
            .unwrap();
        assert_eq!(sequential.order, ModelOrder::new(1, 1, 1));
        assert_eq!(sequential.order, parallel.order);
        assert_eq!(sequential.evaluated, parallel.evaluated);
    }

    #[test]
    fn tie_prefers_fewer_parameters_then_smaller_d() {
        let a = (ModelOrder::new(1, 1, 1), 10.0);
        let b = (ModelOrder::new(1, 1, 0), 10.0);
        assert!(is_better(b, a));
        let c = (ModelOrder::new(1, 0, 0), 10.0);
        assert!(is_better(c, b));
        assert!(is_better((ModelOrder::new(3, 1, 3), 9.0), b));
    }

    #[test]
    fn criterion_is_injectable() {
        // bic penalizes the extra parameter harder than aic at n = 100
        let engine = engine(&[((0, 0, 0), -100.0), ((1, 0, 0), -98.5)]);
        let space = SearchSpace::new(1, 0, vec![0]);
        let by_aic = OrderSelector::new(&engine, &Criterion::Aic, space.clone())
            .select(&series())
            .unwrap();
        let by_bic = OrderSelector::new(&engine, &Criterion::Bic, space)
            .select(&series())
            .unwrap();
        assert_eq!(by_aic.order, ModelOrder::new(1, 0, 0));
        assert_eq!(by_bic.order, ModelOrder::new(0, 0, 0));
        assert_eq!(by_bic.criterion, "bic");
    }

    #[test]
    fn no_viable_candidate_is_selection_error() {
        let engine = engine(&[]);
        let space = SearchSpace::new(2, 2, vec![1]);
        let err = OrderSelector::new(&engine, &Criterion::Aic, space)
            .select(&series())
            .unwrap_err();
        assert!(matches!(err, ArimaTraderError::ModelSelection { window_len: 10, .. }));
    }

    #[test]
    fn grid_covers_bounds() {
        let grid = SearchSpace::new(1, 2, vec![0, 1]).grid();
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[0], ModelOrder::new(0, 0, 0));
        assert_eq!(grid[11], ModelOrder::new(1, 1, 2));
    }

    #[test]
    fn neighbours_skip_negative_orders() {
        let n = neighbours(ModelOrder::new(0, 1, 0));
        assert_eq!(
            n,
            vec![
                ModelOrder::new(1, 1, 0),
                ModelOrder::new(0, 1, 1),
                ModelOrder::new(1, 1, 1)
            ]
        );
    }
}
