//! Pipeline configuration
//!
//! The configuration is a plain structured record. [`PipelineConfig::load`]
//! layers a config file and `VFL_`-prefixed environment variables, then
//! runs [`PipelineConfig::validate`]; no stage ever looks up settings
//! dynamically.

use crate::error::ConfigError;
use crate::ids::PartyName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Which party this process acts for ("alice" or "bob")
    pub role: String,

    pub cluster: ClusterConfig,

    pub secure_unit: SecureUnitConfig,

    #[serde(default)]
    pub matching: MatchConfig,

    pub data: DataConfig,

    #[serde(default)]
    pub preprocess: PreprocessConfig,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub train: TrainConfig,

    #[serde(default)]
    pub eval: EvalConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network identity of one party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyConfig {
    pub address: String,
    pub listen_addr: String,
}

/// Cluster topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub parties: BTreeMap<PartyName, PartyConfig>,

    pub self_party: PartyName,

    /// Address of the distributed runtime head
    #[serde(default = "default_runtime_address")]
    pub runtime_address: String,

    #[serde(default = "default_true")]
    pub log_to_driver: bool,

    /// Run the runtime in multi-process cluster mode
    #[serde(default = "default_true")]
    pub cluster_mode: bool,
}

/// One node of the secure compute unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureNodeConfig {
    pub party: PartyName,
    pub address: String,
}

/// Protocol and field parameters of the secure unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureRuntimeConfig {
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_field")]
    pub field: String,
}

impl Default for SecureRuntimeConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            field: default_field(),
        }
    }
}

/// Link retry parameters between secure unit nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_retry_times")]
    pub connect_retry_times: u32,

    #[serde(default = "default_retry_interval_ms")]
    pub connect_retry_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_retry_times: default_retry_times(),
            connect_retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// Secure unit topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureUnitConfig {
    pub nodes: Vec<SecureNodeConfig>,

    #[serde(default)]
    pub runtime: SecureRuntimeConfig,

    #[serde(default)]
    pub link: LinkConfig,
}

/// Private set intersection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_key")]
    pub key: String,

    #[serde(default = "default_receiver")]
    pub receiver: PartyName,

    #[serde(default = "default_psi_protocol")]
    pub protocol: String,

    #[serde(default = "default_true")]
    pub sort: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: default_key(),
            receiver: default_receiver(),
            protocol: default_psi_protocol(),
            sort: true,
            output_dir: default_output_dir(),
        }
    }
}

/// A column list given either as one name or as a sequence of names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnList {
    One(String),
    Many(Vec<String>),
}

impl ColumnList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ColumnList::One(c) => vec![c.clone()],
            ColumnList::Many(cs) => cs.clone(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        match self {
            ColumnList::One(c) => c == column,
            ColumnList::Many(cs) => cs.iter().any(|c| c == column),
        }
    }
}

impl Default for ColumnList {
    fn default() -> Self {
        ColumnList::One(default_key())
    }
}

/// Per-party input data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV path per party, local to that party's machine
    pub inputs: BTreeMap<PartyName, PathBuf>,

    #[serde(default)]
    pub keys: ColumnList,

    #[serde(default)]
    pub drop_keys: ColumnList,
}

/// Two-valued lookup used by binary mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMapping {
    #[serde(default = "default_negative")]
    pub negative: String,

    #[serde(default = "default_positive")]
    pub positive: String,
}

impl Default for BinaryMapping {
    fn default() -> Self {
        Self {
            negative: default_negative(),
            positive: default_positive(),
        }
    }
}

/// Column lists for each preprocessing step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub fill_unknown_cols: Vec<String>,

    #[serde(default = "default_unknown_token")]
    pub unknown_token: String,

    #[serde(default)]
    pub binary_cols: Vec<String>,

    #[serde(default)]
    pub binary_mapping: BinaryMapping,

    #[serde(default)]
    pub ordinal_cols: Vec<String>,

    #[serde(default)]
    pub onehot_cols: Vec<String>,

    #[serde(default = "default_label_col")]
    pub label_col: String,

    /// Standardize every non-label column after encoding
    #[serde(default = "default_true")]
    pub standardize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            fill_unknown_cols: Vec::new(),
            unknown_token: default_unknown_token(),
            binary_cols: Vec::new(),
            binary_mapping: BinaryMapping::default(),
            ordinal_cols: Vec::new(),
            onehot_cols: Vec::new(),
            label_col: default_label_col(),
            standardize: true,
        }
    }
}

/// Train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_train_size")]
    pub train_size: f64,

    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_size: default_train_size(),
            random_state: default_random_state(),
        }
    }
}

/// Boosting objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Logistic,
    Linear,
}

/// Training hyperparameters plus the party predictions are revealed to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    #[serde(default = "default_rounds")]
    pub num_boost_round: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_sketch_eps")]
    pub sketch_eps: f64,

    #[serde(default = "default_objective")]
    pub objective: Objective,

    #[serde(default = "default_reg_lambda")]
    pub reg_lambda: f64,

    #[serde(default = "default_subsample")]
    pub subsample: f64,

    #[serde(default = "default_base_score")]
    pub base_score: f64,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_reveal_party")]
    pub predict_to: PartyName,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_boost_round: default_rounds(),
            max_depth: default_max_depth(),
            sketch_eps: default_sketch_eps(),
            objective: default_objective(),
            reg_lambda: default_reg_lambda(),
            subsample: default_subsample(),
            base_score: default_base_score(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
            predict_to: default_reveal_party(),
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_bucket_size")]
    pub bucket_size: usize,

    /// Decision threshold for the confusion table; `None` skips it
    #[serde(default = "default_threshold")]
    pub threshold: Option<f64>,

    /// Party that sees revealed labels and scores for the confusion table
    #[serde(default = "default_reveal_party")]
    pub confusion_to: PartyName,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            bucket_size: default_bucket_size(),
            threshold: default_threshold(),
            confusion_to: default_reveal_party(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_runtime_address() -> String {
    "local".to_string()
}

fn default_protocol() -> String {
    "SEMI2K".to_string()
}

fn default_field() -> String {
    "FM128".to_string()
}

fn default_retry_times() -> u32 {
    60
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_key() -> String {
    "uid".to_string()
}

fn default_receiver() -> PartyName {
    PartyName::new("alice")
}

fn default_psi_protocol() -> String {
    "ECDH_PSI_2PC".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("psi_results")
}

fn default_negative() -> String {
    "no".to_string()
}

fn default_positive() -> String {
    "yes".to_string()
}

fn default_unknown_token() -> String {
    "unknown".to_string()
}

fn default_label_col() -> String {
    "y".to_string()
}

fn default_train_size() -> f64 {
    0.8
}

fn default_random_state() -> u64 {
    1234
}

fn default_rounds() -> usize {
    3
}

fn default_max_depth() -> usize {
    5
}

fn default_sketch_eps() -> f64 {
    0.05
}

fn default_objective() -> Objective {
    Objective::Logistic
}

fn default_reg_lambda() -> f64 {
    0.5
}

fn default_subsample() -> f64 {
    0.4
}

fn default_base_score() -> f64 {
    0.11
}

fn default_learning_rate() -> f64 {
    0.3
}

fn default_seed() -> u64 {
    42
}

fn default_reveal_party() -> PartyName {
    PartyName::new("bob")
}

fn default_bucket_size() -> usize {
    20
}

fn default_threshold() -> Option<f64> {
    Some(0.17)
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Matching protocols the pipeline knows how to request
pub const PSI_PROTOCOLS: [&str; 3] = ["ECDH_PSI_2PC", "KKRT_PSI_2PC", "BC22_PSI_2PC"];

impl PipelineConfig {
    /// Load configuration from a file, overlay `VFL_*` environment
    /// variables (`__` separates nested keys), and validate the result.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::File::with_name(path));

        // Environment variables with VFL_ prefix, e.g. VFL_SPLIT__TRAIN_SIZE
        builder = builder.add_source(
            config::Environment::with_prefix("VFL")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let cfg: PipelineConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check ranges and cross-references between sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role != "alice" && self.role != "bob" {
            return Err(ConfigError::invalid(
                "role",
                format!("expected \"alice\" or \"bob\", got \"{}\"", self.role),
            ));
        }
        if self.cluster.parties.is_empty() {
            return Err(ConfigError::MissingField("cluster.parties".into()));
        }
        if self.cluster.self_party.as_str() != self.role {
            return Err(ConfigError::invalid(
                "cluster.self_party",
                format!(
                    "self party '{}' does not match role '{}'",
                    self.cluster.self_party, self.role
                ),
            ));
        }
        self.require_party("cluster.self_party", &self.cluster.self_party)?;

        if self.secure_unit.nodes.is_empty() {
            return Err(ConfigError::MissingField("secure_unit.nodes".into()));
        }

        if self.data.inputs.is_empty() {
            return Err(ConfigError::MissingField("data.inputs".into()));
        }
        if self.data.inputs.len() < 2 {
            return Err(ConfigError::invalid(
                "data.inputs",
                "a vertical join needs inputs from at least two parties",
            ));
        }
        for party in self.data.inputs.keys() {
            self.require_party("data.inputs", party)?;
        }
        if self.data.drop_keys.contains(&self.preprocess.label_col) {
            return Err(ConfigError::invalid(
                "data.drop_keys",
                format!("label column '{}' cannot be dropped", self.preprocess.label_col),
            ));
        }

        if self.matching.enabled {
            self.require_party("matching.receiver", &self.matching.receiver)?;
            if !PSI_PROTOCOLS.contains(&self.matching.protocol.to_uppercase().as_str()) {
                return Err(ConfigError::invalid(
                    "matching.protocol",
                    format!("unknown protocol '{}'", self.matching.protocol),
                ));
            }
        }

        let split = &self.split;
        if !(split.train_size > 0.0 && split.train_size < 1.0) {
            return Err(ConfigError::invalid(
                "split.train_size",
                "must lie strictly between 0 and 1",
            ));
        }

        let train = &self.train;
        if train.num_boost_round == 0 {
            return Err(ConfigError::invalid("train.num_boost_round", "must be at least 1"));
        }
        if train.max_depth == 0 {
            return Err(ConfigError::invalid("train.max_depth", "must be at least 1"));
        }
        if !(train.sketch_eps > 0.0 && train.sketch_eps <= 1.0) {
            return Err(ConfigError::invalid("train.sketch_eps", "must lie in (0, 1]"));
        }
        if !(train.subsample > 0.0 && train.subsample <= 1.0) {
            return Err(ConfigError::invalid("train.subsample", "must lie in (0, 1]"));
        }
        if !(train.reg_lambda >= 0.0 && train.reg_lambda.is_finite()) {
            return Err(ConfigError::invalid("train.reg_lambda", "must be non-negative"));
        }
        if !(train.learning_rate > 0.0 && train.learning_rate.is_finite()) {
            return Err(ConfigError::invalid("train.learning_rate", "must be positive"));
        }
        if train.objective == Objective::Logistic
            && !(train.base_score > 0.0 && train.base_score < 1.0)
        {
            return Err(ConfigError::invalid(
                "train.base_score",
                "logistic objective needs a base score strictly between 0 and 1",
            ));
        }
        self.require_party("train.predict_to", &train.predict_to)?;

        if self.eval.bucket_size == 0 {
            return Err(ConfigError::invalid("eval.bucket_size", "must be at least 1"));
        }
        if let Some(threshold) = self.eval.threshold {
            if !threshold.is_finite() {
                return Err(ConfigError::invalid("eval.threshold", "must be finite"));
            }
            self.require_party("eval.confusion_to", &self.eval.confusion_to)?;
            if self.eval.confusion_to != train.predict_to {
                return Err(ConfigError::invalid(
                    "eval.confusion_to",
                    format!(
                        "scores are revealed only to '{}' (train.predict_to)",
                        train.predict_to
                    ),
                ));
            }
        }

        Ok(())
    }

    fn require_party(&self, field: &str, party: &PartyName) -> Result<(), ConfigError> {
        if self.cluster.parties.contains_key(party) {
            Ok(())
        } else {
            Err(ConfigError::invalid(
                field,
                format!("party '{}' is not registered in cluster.parties", party),
            ))
        }
    }
}
