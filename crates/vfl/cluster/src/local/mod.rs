//! In-process local backend
//!
//! Simulates every party and the secure unit inside one process. Party
//! partitions stay separate inside each [`Frame`] and every cross-party
//! computation runs through [`LocalSecureUnit`]. No cryptography is
//! performed; this backend exists for development and tests.

pub mod boost;
pub mod csv;
pub mod frame;
pub mod metrics;
pub mod psi;
pub mod transforms;

use crate::arena::HandleArena;
use crate::party::PartyRegistry;
use crate::runtime::{ClusterBackend, ClusterRuntime};
use crate::unit::{BoostParams, DatasetShape, PsiRequest, SecureUnit, SecureUnitSettings};
use async_trait::async_trait;
use boost::{BoostModel, Features};
use csv::RawTable;
use frame::{Column, Frame, Partition, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vfl_types::{
    BiClassificationMetrics, BinaryMapping, ClusterConfig, ClusterInitError, DatasetHandle,
    DistributedHandle, MatchReport, ModelHandle, ObjectRef, PartyName, PredictionHandle,
    ShutdownError, UnitError, UnitId, UnitResult,
};

/// Backend that runs everything in the current process
#[derive(Default)]
pub struct LocalBackend {
    runtime_started: AtomicBool,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn start_runtime(
        &self,
        registry: &PartyRegistry,
        config: &ClusterConfig,
    ) -> Result<Arc<dyn ClusterRuntime>, ClusterInitError> {
        if self.runtime_started.swap(true, Ordering::SeqCst) {
            return Err(ClusterInitError::AlreadyInitialized);
        }
        tracing::info!(
            address = %config.runtime_address,
            cluster_mode = config.cluster_mode,
            log_to_driver = config.log_to_driver,
            parties = registry.len(),
            "Local runtime started"
        );
        Ok(Arc::new(LocalRuntime {
            running: AtomicBool::new(true),
        }))
    }

    async fn start_unit(
        &self,
        registry: &PartyRegistry,
        settings: &SecureUnitSettings,
    ) -> Result<Arc<dyn SecureUnit>, ClusterInitError> {
        for party in settings.parties() {
            if !registry.contains(party) {
                return Err(ClusterInitError::UnknownParty(party.to_string()));
            }
        }
        Ok(Arc::new(LocalSecureUnit::new(settings.clone())))
    }
}

/// Runtime layer of the local backend
pub struct LocalRuntime {
    running: AtomicBool,
}

#[async_trait]
impl ClusterRuntime for LocalRuntime {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Local runtime stopped");
        }
        Ok(())
    }
}

/// Objects held by the local unit
#[derive(Debug)]
enum RemoteObject {
    Dataset(Frame),
    Model(BoostModel),
    Prediction { owner: PartyName, scores: Vec<f64> },
}

impl RemoteObject {
    fn kind(&self) -> &'static str {
        match self {
            RemoteObject::Dataset(_) => DatasetHandle::KIND,
            RemoteObject::Model(_) => ModelHandle::KIND,
            RemoteObject::Prediction { .. } => PredictionHandle::KIND,
        }
    }
}

/// Secure unit of the local backend
pub struct LocalSecureUnit {
    id: UnitId,
    settings: SecureUnitSettings,
    alive: AtomicBool,
    arena: HandleArena<RemoteObject>,
}

impl LocalSecureUnit {
    pub fn new(settings: SecureUnitSettings) -> Self {
        let id = UnitId::generate();
        tracing::info!(
            unit = %id,
            protocol = %settings.protocol,
            field = %settings.field,
            retry_times = settings.link.connect_retry_times,
            retry_interval_ms = settings.link.connect_retry_interval_ms,
            "Secure unit started"
        );
        Self {
            id,
            settings,
            alive: AtomicBool::new(true),
            arena: HandleArena::new(id),
        }
    }

    fn ensure_alive(&self) -> UnitResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(UnitError::ShutDown)
        }
    }

    fn ensure_party(&self, party: &PartyName) -> UnitResult<()> {
        if self.settings.parties().any(|p| p == party) {
            Ok(())
        } else {
            Err(UnitError::UnknownParty(party.clone()))
        }
    }

    fn frame(&self, handle: &DatasetHandle) -> UnitResult<Frame> {
        self.ensure_alive()?;
        let object = handle.object_ref();
        let entry = self.arena.get(&object)?;
        match entry.value() {
            RemoteObject::Dataset(frame) => Ok(frame.clone()),
            other => Err(wrong_kind(object, other, DatasetHandle::KIND)),
        }
    }

    fn store_frame(&self, frame: Frame) -> DatasetHandle {
        DatasetHandle::from_ref(self.arena.insert(RemoteObject::Dataset(frame)))
    }

    fn transform(
        &self,
        dataset: &DatasetHandle,
        op: impl FnOnce(&Frame) -> UnitResult<Frame>,
    ) -> UnitResult<DatasetHandle> {
        let frame = self.frame(dataset)?;
        let out = op(&frame)?;
        Ok(self.store_frame(out))
    }

    fn features(frame: &Frame) -> UnitResult<Features> {
        let mut names = Vec::with_capacity(frame.column_count());
        let mut columns = Vec::with_capacity(frame.column_count());
        for partition in frame.partitions() {
            for column in &partition.columns {
                names.push(column.name.clone());
                columns.push(column.numbers()?);
            }
        }
        Ok(Features { names, columns })
    }

    fn single_column(frame: &Frame) -> UnitResult<Vec<f64>> {
        let mut columns = frame.partitions().iter().flat_map(|p| p.columns.iter());
        match (columns.next(), columns.next()) {
            (Some(column), None) => column.numbers(),
            _ => Err(UnitError::Invalid(format!(
                "expected a single label column, found {}",
                frame.column_count()
            ))),
        }
    }

    /// Party holding the only non-empty partition of `frame`
    fn single_owner(frame: &Frame) -> UnitResult<&PartyName> {
        let mut owners = frame
            .partitions()
            .iter()
            .filter(|p| !p.columns.is_empty())
            .map(|p| &p.party);
        match (owners.next(), owners.next()) {
            (Some(owner), None) => Ok(owner),
            _ => Err(UnitError::Invalid(format!(
                "expected a single label column, found {}",
                frame.column_count()
            ))),
        }
    }

    fn scores(&self, handle: &PredictionHandle) -> UnitResult<(PartyName, Vec<f64>)> {
        self.ensure_alive()?;
        let object = handle.object_ref();
        let entry = self.arena.get(&object)?;
        match entry.value() {
            RemoteObject::Prediction { owner, scores } => Ok((owner.clone(), scores.clone())),
            other => Err(wrong_kind(object, other, PredictionHandle::KIND)),
        }
    }
}

fn wrong_kind(object: ObjectRef, found: &RemoteObject, expected: &'static str) -> UnitError {
    tracing::debug!(object = %object, found = found.kind(), expected, "Handle kind mismatch");
    UnitError::WrongKind { object, expected }
}

/// Values leave the unit only towards the party that holds them
fn ensure_owner(object: ObjectRef, owner: &PartyName, to: &PartyName) -> UnitResult<()> {
    if owner == to {
        return Ok(());
    }
    tracing::warn!(object = %object, owner = %owner, to = %to, "Reveal refused");
    Err(UnitError::RevealDenied {
        object,
        owner: owner.clone(),
        to: to.clone(),
    })
}

/// Read one party's CSV into a partition keyed by the join columns
fn read_partition(
    party: &PartyName,
    path: &Path,
    keys: &[String],
) -> UnitResult<(Vec<Vec<Value>>, HashMap<Vec<String>, usize>, RawTable)> {
    let table = RawTable::read(path)?;
    let key_idx = keys
        .iter()
        .map(|k| table.column_index(k))
        .collect::<UnitResult<Vec<_>>>()?;

    let mut index = HashMap::with_capacity(table.rows.len());
    let mut key_values = Vec::with_capacity(table.rows.len());
    for (row, record) in table.rows.iter().enumerate() {
        let key: Vec<String> = key_idx.iter().map(|&i| record[i].trim().to_string()).collect();
        if let Some(pos) = key.iter().position(|k| k.is_empty()) {
            return Err(UnitError::MissingValue {
                column: keys[pos].clone(),
                row,
            });
        }
        key_values.push(key.iter().map(|k| Value::parse(k)).collect());
        if index.insert(key.clone(), row).is_some() {
            return Err(UnitError::DuplicateKey {
                party: party.clone(),
                key: key.join(","),
            });
        }
    }
    Ok((key_values, index, table))
}

fn compare_keys(a: &[Value], b: &[Value]) -> std::cmp::Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.canonical_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(std::cmp::Ordering::Equal)
}

#[async_trait]
impl SecureUnit for LocalSecureUnit {
    fn id(&self) -> UnitId {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn settings(&self) -> &SecureUnitSettings {
        &self.settings
    }

    async fn psi_csv(&self, request: &PsiRequest) -> UnitResult<MatchReport> {
        self.ensure_alive()?;
        for party in request.inputs.keys() {
            self.ensure_party(party)?;
        }
        self.ensure_party(&request.receiver)?;
        tracing::debug!(
            protocol = %request.protocol,
            key = %request.key,
            receiver = %request.receiver,
            "Running key intersection"
        );
        psi::intersect(request)
    }

    async fn load_vertical(
        &self,
        inputs: &BTreeMap<PartyName, PathBuf>,
        keys: &[String],
        drop_keys: &[String],
    ) -> UnitResult<DatasetHandle> {
        self.ensure_alive()?;
        if inputs.is_empty() {
            return Err(UnitError::Invalid("no inputs to load".into()));
        }
        if keys.is_empty() {
            return Err(UnitError::Invalid("at least one join key is required".into()));
        }

        let mut loaded = Vec::with_capacity(inputs.len());
        for (party, path) in inputs {
            self.ensure_party(party)?;
            let (key_values, index, table) = read_partition(party, path, keys)?;
            loaded.push((party.clone(), key_values, index, table));
        }

        // Keys present in every party, ordered by key
        let (_, first_keys, _, first_table) = &loaded[0];
        let mut aligned: Vec<(Vec<Value>, Vec<String>)> = first_table
            .rows
            .iter()
            .zip(first_keys)
            .filter_map(|(record, key_values)| {
                let key: Vec<String> = keys
                    .iter()
                    .filter_map(|k| first_table.column_index(k).ok())
                    .map(|i| record[i].trim().to_string())
                    .collect();
                loaded[1..]
                    .iter()
                    .all(|(_, _, index, _)| index.contains_key(&key))
                    .then(|| (key_values.clone(), key))
            })
            .collect();
        if aligned.is_empty() {
            return Err(UnitError::EmptyIntersection);
        }
        aligned.sort_by(|a, b| compare_keys(&a.0, &b.0).then_with(|| a.1.cmp(&b.1)));

        let rows = aligned.len();
        let mut partitions = Vec::with_capacity(loaded.len());
        for (position, (party, _, index, table)) in loaded.iter().enumerate() {
            let mut partition = Partition::new(party.clone());
            for (ci, name) in table.header.iter().enumerate() {
                if drop_keys.contains(name) {
                    continue;
                }
                // A kept join key lives with the first party only
                if position > 0 && keys.contains(name) {
                    continue;
                }
                let values = aligned
                    .iter()
                    .map(|(_, key)| Value::parse(&table.rows[index[key]][ci]))
                    .collect();
                partition.columns.push(Column::new(name.clone(), values));
            }
            tracing::debug!(
                party = %party,
                rows,
                columns = partition.columns.len(),
                "Loaded partition"
            );
            partitions.push(partition);
        }

        let frame = Frame::new(rows, partitions)?;
        Ok(self.store_frame(frame))
    }

    async fn shape(&self, dataset: &DatasetHandle) -> UnitResult<DatasetShape> {
        let frame = self.frame(dataset)?;
        Ok(DatasetShape {
            rows: frame.rows(),
            partitions: frame
                .partitions()
                .iter()
                .map(|p| {
                    (
                        p.party.clone(),
                        p.columns.iter().map(|c| c.name.clone()).collect(),
                    )
                })
                .collect(),
        })
    }

    async fn replace_with_mode(
        &self,
        dataset: &DatasetHandle,
        column: &str,
        sentinel: &str,
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| transforms::fill_with_mode(f, column, sentinel))
    }

    async fn map_binary(
        &self,
        dataset: &DatasetHandle,
        column: &str,
        mapping: &BinaryMapping,
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| transforms::map_binary(f, column, mapping))
    }

    async fn ordinal_encode(
        &self,
        dataset: &DatasetHandle,
        column: &str,
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| transforms::ordinal_encode(f, column))
    }

    async fn one_hot_encode(
        &self,
        dataset: &DatasetHandle,
        column: &str,
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| transforms::one_hot_encode(f, column))
    }

    async fn standardize(
        &self,
        dataset: &DatasetHandle,
        exclude: &[String],
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| transforms::standardize(f, exclude))
    }

    async fn split(
        &self,
        dataset: &DatasetHandle,
        train_size: f64,
        random_state: u64,
    ) -> UnitResult<(DatasetHandle, DatasetHandle)> {
        let frame = self.frame(dataset)?;
        let (train, test) = transforms::split(&frame, train_size, random_state)?;
        Ok((self.store_frame(train), self.store_frame(test)))
    }

    async fn select_columns(
        &self,
        dataset: &DatasetHandle,
        columns: &[String],
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| f.select(columns))
    }

    async fn drop_columns(
        &self,
        dataset: &DatasetHandle,
        columns: &[String],
    ) -> UnitResult<DatasetHandle> {
        self.transform(dataset, |f| f.drop_columns(columns))
    }

    async fn train(
        &self,
        x: &DatasetHandle,
        y: &DatasetHandle,
        params: &BoostParams,
    ) -> UnitResult<ModelHandle> {
        let x_frame = self.frame(x)?;
        let y_frame = self.frame(y)?;
        let features = Self::features(&x_frame)?;
        let labels = Self::single_column(&y_frame)?;

        let model = boost::train(&features, &labels, params)?;
        tracing::debug!(
            rounds = model.rounds(),
            features = model.features().len(),
            rows = features.rows(),
            "Model trained"
        );
        Ok(ModelHandle::from_ref(
            self.arena.insert(RemoteObject::Model(model)),
        ))
    }

    async fn predict(
        &self,
        model: &ModelHandle,
        x: &DatasetHandle,
        reveal_to: &PartyName,
    ) -> UnitResult<PredictionHandle> {
        self.ensure_party(reveal_to)?;
        let x_frame = self.frame(x)?;
        let features = Self::features(&x_frame)?;

        let object = model.object_ref();
        let scores = {
            let entry = self.arena.get(&object)?;
            match entry.value() {
                RemoteObject::Model(m) => m.predict(&features)?,
                other => return Err(wrong_kind(object, other, ModelHandle::KIND)),
            }
        };

        Ok(PredictionHandle::from_ref(self.arena.insert(
            RemoteObject::Prediction {
                owner: reveal_to.clone(),
                scores,
            },
        )))
    }

    async fn biclassification_report(
        &self,
        labels: &DatasetHandle,
        scores: &PredictionHandle,
        bucket_size: usize,
    ) -> UnitResult<BiClassificationMetrics> {
        let y = Self::single_column(&self.frame(labels)?)?;
        let (_, scores) = self.scores(scores)?;
        metrics::biclassification(&y, &scores, bucket_size)
    }

    async fn reveal_labels(&self, labels: &DatasetHandle, to: &PartyName) -> UnitResult<Vec<f64>> {
        self.ensure_party(to)?;
        let frame = self.frame(labels)?;
        let owner = Self::single_owner(&frame)?;
        ensure_owner(labels.object_ref(), owner, to)?;
        let y = Self::single_column(&frame)?;
        tracing::debug!(to = %to, rows = y.len(), "Revealing labels");
        Ok(y)
    }

    async fn reveal_scores(
        &self,
        scores: &PredictionHandle,
        to: &PartyName,
    ) -> UnitResult<Vec<f64>> {
        self.ensure_party(to)?;
        let (owner, values) = self.scores(scores)?;
        ensure_owner(scores.object_ref(), &owner, to)?;
        tracing::debug!(to = %to, rows = values.len(), "Revealing scores");
        Ok(values)
    }

    fn release(&self, object: ObjectRef) {
        self.arena.release(object);
    }

    fn reclaim(&self) -> usize {
        let freed = self.arena.reclaim();
        if freed > 0 {
            tracing::debug!(freed, "Reclaimed released objects");
        }
        freed
    }

    fn live_objects(&self) -> usize {
        self.arena.live()
    }

    fn pending_objects(&self) -> usize {
        self.arena.pending()
    }

    async fn shutdown(&self) -> Result<(), ShutdownError> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let leaked = self.arena.clear();
        tracing::info!(unit = %self.id, "Secure unit stopped");
        if leaked > 0 {
            return Err(ShutdownError::LiveObjects(leaked));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FieldType, SecureProtocol};
    use crate::unit::ReleaseExt;
    use vfl_types::{LinkConfig, Objective};

    fn unit() -> LocalSecureUnit {
        LocalSecureUnit::new(SecureUnitSettings {
            nodes: vec![
                (PartyName::new("alice"), "127.0.0.1:9596".into()),
                (PartyName::new("bob"), "127.0.0.1:9597".into()),
            ],
            protocol: SecureProtocol::Semi2k,
            field: FieldType::Fm128,
            link: LinkConfig::default(),
        })
    }

    fn write_inputs(dir: &std::path::Path) -> BTreeMap<PartyName, PathBuf> {
        let alice = dir.join("alice.csv");
        let bob = dir.join("bob.csv");
        std::fs::write(&alice, "uid,age,job\n3,50,admin\n1,30,tech\n2,41,unknown\n9,20,tech\n")
            .unwrap();
        std::fs::write(&bob, "uid,y\n2,1\n1,0\n3,1\n").unwrap();
        let mut inputs = BTreeMap::new();
        inputs.insert(PartyName::new("alice"), alice);
        inputs.insert(PartyName::new("bob"), bob);
        inputs
    }

    fn uid() -> Vec<String> {
        vec!["uid".to_string()]
    }

    #[tokio::test]
    async fn test_load_aligns_on_keys() {
        let dir = tempfile::tempdir().unwrap();
        let unit = unit();
        let ds = unit
            .load_vertical(&write_inputs(dir.path()), &uid(), &uid())
            .await
            .unwrap();

        let shape = unit.shape(&ds).await.unwrap();
        assert_eq!(shape.rows, 3);
        assert_eq!(shape.columns(), 3);
        assert_eq!(shape.owner_of("y").unwrap().as_str(), "bob");

        let frame = unit.frame(&ds).unwrap();
        assert_eq!(
            frame.column("age").unwrap().numbers().unwrap(),
            vec![30.0, 41.0, 50.0]
        );
        assert_eq!(
            frame.column("y").unwrap().numbers().unwrap(),
            vec![0.0, 1.0, 1.0]
        );
    }

    #[tokio::test]
    async fn test_kept_key_stays_with_first_party() {
        let dir = tempfile::tempdir().unwrap();
        let unit = unit();
        let ds = unit
            .load_vertical(&write_inputs(dir.path()), &uid(), &[])
            .await
            .unwrap();
        let shape = unit.shape(&ds).await.unwrap();
        assert_eq!(shape.owner_of("uid").unwrap().as_str(), "alice");
        assert_eq!(shape.columns(), 4);
    }

    #[tokio::test]
    async fn test_wrong_handle_kind() {
        let dir = tempfile::tempdir().unwrap();
        let unit = unit();
        let ds = unit
            .load_vertical(&write_inputs(dir.path()), &uid(), &uid())
            .await
            .unwrap();
        let fake = PredictionHandle::from_ref(ds.object_ref());
        assert!(matches!(
            unit.reveal_scores(&fake, &PartyName::new("bob")).await,
            Err(UnitError::WrongKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_released_handle_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let unit = unit();
        let ds = unit
            .load_vertical(&write_inputs(dir.path()), &uid(), &uid())
            .await
            .unwrap();
        let copy = DatasetHandle::from_ref(ds.object_ref());
        unit.release_handle(ds);
        assert_eq!(unit.pending_objects(), 1);
        assert_eq!(unit.reclaim(), 1);
        assert!(matches!(
            unit.shape(&copy).await,
            Err(UnitError::UnknownObject(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_from_other_unit_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let first = unit();
        let second = unit();
        let ds = first
            .load_vertical(&write_inputs(dir.path()), &uid(), &uid())
            .await
            .unwrap();
        assert!(matches!(
            second.shape(&ds).await,
            Err(UnitError::StaleHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_labels_reveal_only_to_their_party() {
        let dir = tempfile::tempdir().unwrap();
        let unit = unit();
        let ds = unit
            .load_vertical(&write_inputs(dir.path()), &uid(), &uid())
            .await
            .unwrap();
        let y = unit.select_columns(&ds, &["y".to_string()]).await.unwrap();
        let age = unit.select_columns(&ds, &["age".to_string()]).await.unwrap();

        let alice = PartyName::new("alice");
        let bob = PartyName::new("bob");
        assert_eq!(unit.reveal_labels(&y, &bob).await.unwrap(), vec![0.0, 1.0, 1.0]);
        assert!(matches!(
            unit.reveal_labels(&y, &alice).await,
            Err(UnitError::RevealDenied { .. })
        ));
        assert_eq!(
            unit.reveal_labels(&age, &alice).await.unwrap(),
            vec![30.0, 41.0, 50.0]
        );
        assert!(matches!(
            unit.reveal_labels(&age, &bob).await,
            Err(UnitError::RevealDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_train_predict_report() {
        let dir = tempfile::tempdir().unwrap();
        let alice = dir.path().join("alice.csv");
        let bob = dir.path().join("bob.csv");
        let mut a = String::from("uid,x\n");
        let mut b = String::from("uid,y\n");
        for i in 0..40 {
            a.push_str(&format!("{i},{i}\n"));
            b.push_str(&format!("{i},{}\n", u8::from(i >= 20)));
        }
        std::fs::write(&alice, a).unwrap();
        std::fs::write(&bob, b).unwrap();
        let mut inputs = BTreeMap::new();
        inputs.insert(PartyName::new("alice"), alice);
        inputs.insert(PartyName::new("bob"), bob);

        let unit = unit();
        let ds = unit.load_vertical(&inputs, &uid(), &uid()).await.unwrap();
        let x = unit.drop_columns(&ds, &["y".to_string()]).await.unwrap();
        let y = unit.select_columns(&ds, &["y".to_string()]).await.unwrap();
        let params = BoostParams {
            num_boost_round: 5,
            max_depth: 3,
            sketch_eps: 0.05,
            objective: Objective::Logistic,
            reg_lambda: 0.5,
            subsample: 1.0,
            base_score: 0.5,
            learning_rate: 0.3,
            seed: 42,
        };
        let model = unit.train(&x, &y, &params).await.unwrap();
        let bob = PartyName::new("bob");
        let pred = unit.predict(&model, &x, &bob).await.unwrap();
        let report = unit.biclassification_report(&y, &pred, 20).await.unwrap();
        assert_eq!(report.positive_samples, 20);
        assert!(report.auc > 0.9);

        let scores = unit.reveal_scores(&pred, &bob).await.unwrap();
        assert_eq!(scores.len(), 40);
        assert!(matches!(
            unit.reveal_scores(&pred, &PartyName::new("alice")).await,
            Err(UnitError::RevealDenied { owner, to, .. })
                if owner.as_str() == "bob" && to.as_str() == "alice"
        ));

        for handle in [ds, x, y] {
            unit.release_handle(handle);
        }
        unit.release_handle(model);
        unit.release_handle(pred);
        assert_eq!(unit.reclaim(), 5);
        assert_eq!(unit.live_objects(), 0);
        assert!(unit.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_reports_live_objects() {
        let dir = tempfile::tempdir().unwrap();
        let unit = unit();
        let _ds = unit
            .load_vertical(&write_inputs(dir.path()), &uid(), &uid())
            .await
            .unwrap();
        assert!(matches!(
            unit.shutdown().await,
            Err(ShutdownError::LiveObjects(1))
        ));
        // Second shutdown is quiet
        assert!(unit.shutdown().await.is_ok());
    }
}
