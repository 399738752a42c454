//! Pipeline execution engine
//!
//! A pipeline is a declarative list of stages. Each stage derives new columns
//! from a single stock's series; the engine orders stages by their declared
//! dependencies, runs them, and hands the derived series to the aggregator.

use crate::config::PipelineConfig;
use crate::error::{FeatureError, Result};
use crate::features::StockFeatureVector;
use crate::pipeline::aggregate::Aggregator;
use crate::series::StockSeries;
use crate::types::{Column, DailyRecord};
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

/// Columns produced by one stage run
pub type StageOutput = Vec<(String, Column)>;

/// Base trait for all per-stock stages
pub trait Stage: Send + Sync {
    /// Stage name, used for dependency resolution
    fn name(&self) -> &str;

    /// Stages whose columns this stage reads
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Columns this stage introduces under the given configuration
    fn columns(&self, config: &PipelineConfig) -> Vec<String>;

    /// Derive this stage's columns from a series
    fn compute(&self, series: &StockSeries, config: &PipelineConfig) -> Result<StageOutput>;
}

/// Pipeline definition
pub struct Pipeline {
    config: PipelineConfig,
    /// Registered stages
    stages: HashMap<String, Box<dyn Stage>>,
    /// Stage names in registration order
    registration: Vec<String>,
    /// Dependency-ordered stage names
    execution_order: Vec<String>,
    aggregator: Aggregator,
}

impl Pipeline {
    /// Create a pipeline with no stages
    ///
    /// The configuration is validated here, so stages never see a zero window.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let aggregator = Aggregator::new(config.clone());
        Ok(Self {
            config,
            stages: HashMap::new(),
            registration: Vec::new(),
            execution_order: Vec::new(),
            aggregator,
        })
    }

    /// Create a pipeline with every standard stage registered
    pub fn with_default_stages(config: PipelineConfig) -> Result<Self> {
        let mut pipeline = Self::new(config)?;
        for stage in super::default_stages() {
            pipeline.add_stage(stage);
        }
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Add a stage; a stage registered under an existing name replaces it
    pub fn add_stage(&mut self, stage: Box<dyn Stage>) -> &mut Self {
        let name = stage.name().to_string();
        if self.stages.insert(name.clone(), stage).is_none() {
            self.registration.push(name);
        }
        self.rebuild_execution_order();
        self
    }

    /// Rebuild execution order based on dependencies
    fn rebuild_execution_order(&mut self) {
        let mut order = Vec::new();
        let mut visited = HashSet::new();

        for name in &self.registration {
            self.visit_stage(name, &mut order, &mut visited);
        }

        self.execution_order = order;
    }

    /// Depth-first visit for topological sort
    fn visit_stage(&self, name: &str, order: &mut Vec<String>, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }

        if let Some(stage) = self.stages.get(name) {
            for dep in stage.dependencies() {
                self.visit_stage(&dep, order, visited);
            }
            order.push(name.to_string());
        }
    }

    /// Check every dependency is registered and no two stages claim a column
    pub fn validate(&self) -> Result<()> {
        let mut owners: HashMap<String, &str> = HashMap::new();

        for name in &self.execution_order {
            let Some(stage) = self.stages.get(name) else {
                continue;
            };
            for dep in stage.dependencies() {
                if !self.stages.contains_key(&dep) {
                    return Err(FeatureError::ConfigError(format!(
                        "Stage '{}' depends on unregistered stage '{}'",
                        name, dep
                    )));
                }
            }
            for column in stage.columns(&self.config) {
                if let Some(owner) = owners.insert(column.clone(), stage.name()) {
                    return Err(FeatureError::ConfigError(format!(
                        "Column '{}' produced by both '{}' and '{}'",
                        column, owner, name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stage names in the order they run
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Every derived column the registered stages will produce
    pub fn produced_columns(&self) -> Vec<String> {
        self.execution_order
            .iter()
            .filter_map(|name| self.stages.get(name))
            .flat_map(|stage| stage.columns(&self.config))
            .collect()
    }

    /// Aggregator inputs no registered stage produces (these aggregates use defaults)
    pub fn missing_source_columns(&self) -> Vec<String> {
        let produced: HashSet<String> = self.produced_columns().into_iter().collect();
        self.aggregator
            .source_columns()
            .into_iter()
            .filter(|c| !produced.contains(c))
            .collect()
    }

    /// Run every stage over one stock's series
    pub fn derive(&self, mut series: StockSeries) -> Result<StockSeries> {
        for name in &self.execution_order {
            if let Some(stage) = self.stages.get(name) {
                let output = stage.compute(&series, &self.config)?;
                for (column, values) in output {
                    series.insert_column(column, values)?;
                }
            }
        }
        Ok(series)
    }

    /// Derive and aggregate one stock; `None` when it lacks trading activity
    pub fn run_series(&self, series: StockSeries) -> Result<Option<StockFeatureVector>> {
        let derived = self.derive(series)?;
        Ok(self.aggregator.aggregate(&derived))
    }

    /// Run the pipeline over a universe of stocks in parallel
    ///
    /// Output rows keep the input order of the surviving stocks.
    pub fn run_universe(&self, universe: Vec<StockSeries>) -> Result<PipelineOutput> {
        let stocks_in = universe.len();
        log::info!(
            "Running {} stages over {} stocks",
            self.execution_order.len(),
            stocks_in
        );

        let results: Vec<(String, Option<StockFeatureVector>)> = universe
            .into_par_iter()
            .map(|series| {
                let code = series.stock_code().to_string();
                self.run_series(series).map(|features| (code, features))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut features = Vec::with_capacity(results.len());
        let mut excluded = Vec::new();
        for (code, result) in results {
            match result {
                Some(vector) => features.push(vector),
                None => excluded.push(code),
            }
        }

        log::info!(
            "Pipeline complete: {} stocks aggregated, {} excluded",
            features.len(),
            excluded.len()
        );

        Ok(PipelineOutput {
            features,
            summary: RunSummary {
                stocks_in,
                excluded,
            },
        })
    }

    /// Group raw rows by stock and run the pipeline over them
    pub fn run_records(&self, records: Vec<DailyRecord>) -> Result<PipelineOutput> {
        let universe = group_records(records)?;
        self.run_universe(universe)
    }
}

/// Group rows into one series per stock, in first-seen stock order
pub fn group_records(records: Vec<DailyRecord>) -> Result<Vec<StockSeries>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<DailyRecord>> = Vec::new();

    for record in records {
        let slot = *index.entry(record.stock_code.clone()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    groups.into_iter().map(StockSeries::from_records).collect()
}

/// Counts describing one universe run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stocks_in: usize,
    /// Stocks dropped for insufficient trading activity
    pub excluded: Vec<String>,
}

/// Pipeline execution output
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub features: Vec<StockFeatureVector>,
    pub summary: RunSummary,
}

impl PipelineOutput {
    /// Feature vector for a stock, if it survived
    pub fn get(&self, stock_code: &str) -> Option<&StockFeatureVector> {
        self.features.iter().find(|f| f.stock_code == stock_code)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct ConstantStage {
        name: String,
        column: String,
        deps: Vec<String>,
        value: f64,
    }

    impl ConstantStage {
        fn boxed(name: &str, column: &str, deps: &[&str], value: f64) -> Box<dyn Stage> {
            Box::new(Self {
                name: name.to_string(),
                column: column.to_string(),
                deps: deps.iter().map(|d| d.to_string()).collect(),
                value,
            })
        }
    }

    impl Stage for ConstantStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        fn columns(&self, _config: &PipelineConfig) -> Vec<String> {
            vec![self.column.clone()]
        }

        fn compute(&self, series: &StockSeries, _config: &PipelineConfig) -> Result<StageOutput> {
            for dep in &self.deps {
                series.require_column(&format!("{}_col", dep))?;
            }
            Ok(vec![(self.column.clone(), vec![Some(self.value); series.len()])])
        }
    }

    fn series(code: &str, days: u32) -> StockSeries {
        let records = (1..=days)
            .map(|d| {
                DailyRecord::new(
                    code,
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d as i64),
                    100.0 + d as f64,
                    Some(1000.0),
                )
            })
            .collect();
        StockSeries::from_records(records).unwrap()
    }

    #[test]
    fn test_pipeline_creation() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.stage_count(), 0);
        assert!(pipeline.execution_order().is_empty());
    }

    #[test]
    fn test_zero_window_rejected_at_construction() {
        let config = PipelineConfig {
            rsi_period: 0,
            ..PipelineConfig::default()
        };

        let err = Pipeline::new(config.clone()).err().unwrap();
        assert!(matches!(err, FeatureError::ConfigError(_)));
        assert!(err.to_string().contains("rsi_period"));

        assert!(matches!(
            Pipeline::with_default_stages(config),
            Err(FeatureError::ConfigError(_))
        ));
    }

    #[test]
    fn test_dependencies_run_first() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.add_stage(ConstantStage::boxed("b", "b_col", &["a"], 2.0));
        pipeline.add_stage(ConstantStage::boxed("a", "a_col", &[], 1.0));

        assert_eq!(pipeline.execution_order(), &["a".to_string(), "b".to_string()]);

        let derived = pipeline.derive(series("X", 3)).unwrap();
        assert_eq!(derived.column_names(), &["a_col".to_string(), "b_col".to_string()]);
    }

    #[test]
    fn test_unregistered_dependency_rejected() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.add_stage(ConstantStage::boxed("b", "b_col", &["missing"], 2.0));

        assert!(matches!(pipeline.validate(), Err(FeatureError::ConfigError(_))));
    }

    #[test]
    fn test_column_claimed_twice_rejected() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.add_stage(ConstantStage::boxed("a", "shared", &[], 1.0));
        pipeline.add_stage(ConstantStage::boxed("b", "shared", &[], 2.0));

        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("shared"));
    }

    #[test]
    fn test_default_pipeline_produces_every_aggregator_input() {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();

        assert_eq!(pipeline.execution_order()[0], "returns");
        assert!(pipeline.missing_source_columns().is_empty());
    }

    #[test]
    fn test_run_universe_excludes_and_keeps_order() {
        let pipeline = Pipeline::with_default_stages(PipelineConfig::default()).unwrap();
        let universe = vec![series("LONG_A", 40), series("SHORT", 10), series("LONG_B", 25)];

        let output = pipeline.run_universe(universe).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output.features[0].stock_code, "LONG_A");
        assert_eq!(output.features[1].stock_code, "LONG_B");
        assert_eq!(output.summary.stocks_in, 3);
        assert_eq!(output.summary.excluded, vec!["SHORT".to_string()]);
        assert!(output.get("SHORT").is_none());
    }

    #[test]
    fn test_group_records_first_seen_order() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let records = vec![
            DailyRecord::new("B", date, 1.0, None),
            DailyRecord::new("A", date, 1.0, None),
            DailyRecord::new("B", date.succ_opt().unwrap(), 2.0, None),
        ];

        let grouped = group_records(records).unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].stock_code(), "B");
        assert_eq!(grouped[0].len(), 2);
        assert_eq!(grouped[1].stock_code(), "A");
    }
}
