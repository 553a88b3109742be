mod common;

use vfl_cluster::BoostParams;
use vfl_engine::{CleanupCoordinator, RunState, SecurePipeline, StateMachine};
use vfl_stages::{LoadStage, PredictStage, SplitStage, StageAdapter, StageContext};
use vfl_types::{
    PartyName, PipelineError, PipelineState, PreprocessStep, SplitConfig, StageError, StageKind,
    TrainConfig, UnitError,
};

#[tokio::test]
async fn test_preprocess_failure_is_tagged_and_cleaned_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (alice, bob) = common::write_inputs(dir.path(), 0..200, 0..200);
    let mut config = common::config(dir.path(), &alice, &bob, true);
    // job holds free text, not a yes/no flag
    config.preprocess.binary_cols.push("job".into());
    let cluster = common::cluster(&config).await;

    let mut pipeline = SecurePipeline::new(config).expect("config should validate");
    let err = pipeline
        .execute(&cluster)
        .await
        .expect_err("preprocess must fail");

    assert_eq!(err.failed_stage(), Some(StageKind::Preprocess));
    match &err {
        PipelineError::Stage {
            source: StageError::Preprocess { step, column, source },
            ..
        } => {
            assert_eq!(*step, PreprocessStep::BinaryMap);
            assert_eq!(column, "job");
            assert!(matches!(source, UnitError::UnmappedValue { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Some(StageKind::Preprocess)
        }
    );
    // Later stages never ran
    let completed: Vec<StageKind> = pipeline.records().iter().map(|r| r.stage).collect();
    assert_eq!(completed, vec![StageKind::Match, StageKind::Load]);

    let cleanup = pipeline.cleanup_report().expect("cleanup ran after failure");
    assert_eq!(cleanup.still_live, 0);
    assert_eq!(cluster.unit().live_objects(), 0);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_missing_label_fails_split() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (alice, bob) = common::write_inputs(dir.path(), 0..200, 0..200);
    let mut config = common::config(dir.path(), &alice, &bob, false);
    config.preprocess.label_col = "target".into();

    let err = SecurePipeline::new(config)
        .expect("config should validate")
        .run()
        .await
        .expect_err("split must fail");
    assert_eq!(err.failed_stage(), Some(StageKind::Split));
    assert!(err.to_string().starts_with("Stage 'split' failed"));
}

#[tokio::test]
async fn test_execute_twice_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (alice, bob) = common::write_inputs(dir.path(), 0..200, 0..200);
    let config = common::config(dir.path(), &alice, &bob, false);
    let cluster = common::cluster(&config).await;

    let mut pipeline = SecurePipeline::new(config).expect("config should validate");
    pipeline.execute(&cluster).await.expect("first run succeeds");
    let err = pipeline
        .execute(&cluster)
        .await
        .expect_err("a finished run cannot restart");
    assert!(matches!(
        err,
        PipelineError::InvalidTransition {
            from: PipelineState::Done,
            ..
        }
    ));
    assert_eq!(cluster.unit().live_objects(), 0);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_twice_leaves_same_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (alice, bob) = common::write_inputs(dir.path(), 0..200, 0..200);
    let config = common::config(dir.path(), &alice, &bob, false);
    let cluster = common::cluster(&config).await;

    let mut pipeline = SecurePipeline::new(config.clone()).expect("config should validate");
    pipeline.execute(&cluster).await.expect("run succeeds");

    cluster.shutdown().await;
    let first = (
        cluster.is_shut_down().await,
        cluster.runtime_running(),
        cluster.unit().is_alive(),
        cluster.unit().live_objects(),
    );
    cluster.shutdown().await;
    let second = (
        cluster.is_shut_down().await,
        cluster.runtime_running(),
        cluster.unit().is_alive(),
        cluster.unit().live_objects(),
    );
    assert_eq!(first, second);
    assert_eq!(first, (true, false, false, 0));

    // Every pipeline call now fails
    let ctx = StageContext::new(&cluster);
    let err = LoadStage::new(
        config.data.inputs.clone(),
        config.data.keys.to_vec(),
        config.data.drop_keys.to_vec(),
    )
    .run(&ctx)
    .await
    .expect_err("unit is shut down");
    assert!(matches!(err, StageError::Unit(UnitError::ShutDown)));
}

#[tokio::test]
async fn test_predict_before_train_leaves_no_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (alice, bob) = common::write_inputs(dir.path(), 0..100, 0..100);
    let config = common::config(dir.path(), &alice, &bob, false);
    let cluster = common::cluster(&config).await;
    let ctx = StageContext::new(&cluster);

    let mut state = RunState::new(BoostParams::from(&TrainConfig::default()));
    let loaded = LoadStage::new(
        config.data.inputs.clone(),
        config.data.keys.to_vec(),
        ["uid", "job", "marital", "default", "housing", "loan"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    )
    .run(&ctx)
    .await
    .expect("load")
    .output;
    let split = SplitStage::new(&SplitConfig::default(), "y", loaded)
        .run(&ctx)
        .await
        .expect("split")
        .output;
    let split = state.split.insert(split);
    ctx.unit.reclaim();
    let live = ctx.unit.live_objects();
    assert_eq!(live, 4);

    let bob_party = PartyName::new("bob");
    let err = PredictStage::new(&state.trainer, &split.test_x, &bob_party)
        .run(&ctx)
        .await
        .expect_err("no model yet");
    assert!(matches!(err, StageError::ModelNotTrained));
    assert!(state.trainer.model().is_none());
    assert_eq!(ctx.unit.live_objects(), live);

    // The state machine refuses the out-of-order step as well
    let mut machine = StateMachine::new();
    machine.begin(StageKind::Load).expect("load");
    machine.begin(StageKind::Preprocess).expect("preprocess");
    machine.begin(StageKind::Split).expect("split");
    assert!(machine.begin(StageKind::Predict).is_err());

    let report = CleanupCoordinator::cleanup(&mut state, ctx.unit);
    assert_eq!(report.released, 4);
    assert_eq!(report.reclaimed, 4);
    assert_eq!(report.still_live, 0);
    assert_eq!(state.held(), 0);
    cluster.shutdown().await;
}
