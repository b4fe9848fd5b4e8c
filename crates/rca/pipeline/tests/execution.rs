use async_trait::async_trait;
use rca_pipeline::{
    FrameworkError, Pipeline, PipelineContext, PipelineError, PipelineGraph, PipelineResult,
    RcaFramework, INPUT, OUTPUT,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Barrier;

type Behaviour =
    Box<dyn Fn(&PipelineContext<i64>) -> Result<PipelineResult<i64>, PipelineError> + Send + Sync>;

struct TestStage {
    name: String,
    inputs: BTreeSet<String>,
    log: Arc<Mutex<Vec<String>>>,
    barrier: Option<Arc<Barrier>>,
    behaviour: Behaviour,
}

impl TestStage {
    fn new(
        name: &str,
        inputs: &[&str],
        log: &Arc<Mutex<Vec<String>>>,
        behaviour: impl Fn(&PipelineContext<i64>) -> Result<PipelineResult<i64>, PipelineError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            log: Arc::clone(log),
            barrier: None,
            behaviour: Box::new(behaviour),
        }
    }

    fn meeting_at(mut self, barrier: &Arc<Barrier>) -> Self {
        self.barrier = Some(Arc::clone(barrier));
        self
    }
}

#[async_trait]
impl Pipeline<i64> for TestStage {
    fn output_name(&self) -> &str {
        &self.name
    }

    fn input_names(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    async fn run(
        &self,
        context: PipelineContext<i64>,
    ) -> Result<PipelineResult<i64>, PipelineError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        self.log.lock().unwrap().push(self.name.clone());
        (self.behaviour)(&context)
    }
}

fn sum_of(context: &PipelineContext<i64>, name: &str) -> Result<i64, PipelineError> {
    Ok(context.require(name)?.entities().iter().sum())
}

fn linear_graph(log: &Arc<Mutex<Vec<String>>>) -> PipelineGraph<i64> {
    PipelineGraph::builder()
        .with_stage(TestStage::new("A", &[INPUT], log, |ctx| {
            Ok(PipelineResult::single(sum_of(ctx, INPUT)? + 1))
        }))
        .with_stage(TestStage::new("B", &["A"], log, |ctx| {
            Ok(PipelineResult::single(sum_of(ctx, "A")? * 2))
        }))
        .with_stage(TestStage::new(OUTPUT, &["B"], log, |ctx| {
            Ok(PipelineResult::single(sum_of(ctx, "B")?))
        }))
        .build()
        .unwrap()
}

#[test]
fn test_linear_stages_run_in_dependency_order_for_any_worker_count() {
    for workers in 1..=4 {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .build()
            .unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let framework = RcaFramework::new(linear_graph(&log), runtime.handle().clone());

        let execution = runtime.block_on(framework.run(vec![1, 2, 3])).unwrap();

        assert_eq!(execution.output().entities(), &[14]);
        assert_eq!(execution.completion_order(), vec!["A", "B", OUTPUT]);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", OUTPUT]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stage_without_inputs_runs_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let graph = PipelineGraph::builder()
        .with_stage(TestStage::new("A", &[], &log, |ctx| {
            assert!(ctx.get("A").is_none());
            Ok(PipelineResult::single(5))
        }))
        .with_stage(TestStage::new("B", &["A"], &log, |ctx| {
            Ok(PipelineResult::single(sum_of(ctx, "A")? * 2))
        }))
        .with_stage(TestStage::new(OUTPUT, &["B"], &log, |ctx| {
            Ok(PipelineResult::single(sum_of(ctx, "B")?))
        }))
        .build()
        .unwrap();
    let framework = RcaFramework::new(graph, Handle::current());

    let execution = framework.run(vec![100]).await.unwrap();

    assert_eq!(execution.output().entities(), &[10]);
    assert_eq!(execution.completion_order(), vec!["A", "B", OUTPUT]);
    assert_eq!(*log.lock().unwrap(), vec!["A", "B", OUTPUT]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execution_keeps_every_result() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let framework = RcaFramework::new(linear_graph(&log), Handle::current());

    let execution = framework.run(vec![4]).await.unwrap();

    assert_eq!(execution.context().names(), vec!["A", "B", INPUT, OUTPUT]);
    assert_eq!(execution.context().entities(INPUT), &[4]);
    assert_eq!(execution.context().entities("A"), &[5]);
    assert_eq!(execution.timings().len(), 3);
    assert!(execution.finished_at() >= execution.started_at());
    assert!(!execution.execution_id().is_nil());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_each_run_gets_a_fresh_context() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let framework = RcaFramework::new(linear_graph(&log), Handle::current());

    let first = framework.run(vec![1]).await.unwrap();
    let second = framework.run(vec![2]).await.unwrap();

    assert_eq!(first.output().entities(), &[4]);
    assert_eq!(second.output().entities(), &[6]);
    assert_ne!(first.execution_id(), second.execution_id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_stages_run_concurrently() {
    let log = Arc::new(Mutex::new(Vec::new()));
    // Neither side can finish until both are running
    let barrier = Arc::new(Barrier::new(2));
    let graph = PipelineGraph::builder()
        .with_stage(
            TestStage::new("left", &[INPUT], &log, |_| Ok(PipelineResult::single(1)))
                .meeting_at(&barrier),
        )
        .with_stage(
            TestStage::new("right", &[INPUT], &log, |_| Ok(PipelineResult::single(2)))
                .meeting_at(&barrier),
        )
        .with_stage(TestStage::new(OUTPUT, &["left", "right"], &log, |ctx| {
            Ok(PipelineResult::single(
                sum_of(ctx, "left")? + sum_of(ctx, "right")?,
            ))
        }))
        .build()
        .unwrap();
    let framework = RcaFramework::new(graph, Handle::current());

    let execution = tokio::time::timeout(Duration::from_secs(5), framework.run(Vec::new()))
        .await
        .expect("independent stages did not overlap")
        .unwrap();

    assert_eq!(execution.output().entities(), &[3]);
    assert_eq!(execution.completion_order().last(), Some(&OUTPUT));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failure_names_the_stage_and_skips_downstream() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let graph = PipelineGraph::builder()
        .with_stage(TestStage::new("A", &[INPUT], &log, |_| {
            Ok(PipelineResult::single(1))
        }))
        .with_stage(TestStage::new("B", &["A"], &log, |_| {
            Err(PipelineError::failed("division by zero"))
        }))
        .with_stage(TestStage::new(OUTPUT, &["B"], &log, |_| {
            Ok(PipelineResult::empty())
        }))
        .build()
        .unwrap();
    let framework = RcaFramework::new(graph, Handle::current());

    let error = framework.run(Vec::new()).await.unwrap_err();

    assert_eq!(error.stage(), Some("B"));
    assert!(matches!(
        &error,
        FrameworkError::StageFailed { source: PipelineError::Failed(_), .. }
    ));
    assert!(error.to_string().contains("division by zero"));
    assert!(!log.lock().unwrap().contains(&OUTPUT.to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_input_surfaces_as_stage_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let graph = PipelineGraph::builder()
        .with_stage(TestStage::new(OUTPUT, &[INPUT], &log, |ctx| {
            Ok(PipelineResult::single(sum_of(ctx, "never_declared")?))
        }))
        .build()
        .unwrap();
    let framework = RcaFramework::new(graph, Handle::current());

    let error = framework.run(vec![1]).await.unwrap_err();

    assert!(matches!(
        error,
        FrameworkError::StageFailed { ref stage, source: PipelineError::MissingInput(ref name) }
            if stage == OUTPUT && name == "never_declared"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_stage_is_reported() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let graph = PipelineGraph::builder()
        .with_stage(TestStage::new("explode", &[INPUT], &log, |_| {
            panic!("stage blew up")
        }))
        .with_stage(TestStage::new(OUTPUT, &["explode"], &log, |_| {
            Ok(PipelineResult::empty())
        }))
        .build()
        .unwrap();
    let framework = RcaFramework::new(graph, Handle::current());

    let error = framework.run(Vec::new()).await.unwrap_err();

    match error {
        FrameworkError::StagePanicked { stage, message } => {
            assert_eq!(stage, "explode");
            assert_eq!(message, "stage blew up");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_release_profile_keeps_unwinding() {
    let manifest = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../../Cargo.toml"
    ))
    .unwrap();
    let release: Vec<&str> = manifest
        .split("[profile.release]")
        .nth(1)
        .unwrap()
        .lines()
        .take_while(|line| !line.starts_with('['))
        .collect();
    assert!(!release
        .iter()
        .any(|line| line.replace(' ', "").starts_with("panic=\"abort\"")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stage_reads_input_and_upstream_results() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let graph = PipelineGraph::builder()
        .with_stage(TestStage::new("double", &[INPUT], &log, |ctx| {
            let doubled: Vec<i64> = ctx.require(INPUT)?.entities().iter().map(|v| v * 2).collect();
            Ok(PipelineResult::new(doubled))
        }))
        .with_stage(TestStage::new(OUTPUT, &[INPUT, "double"], &log, |ctx| {
            let mut merged = ctx.entities(INPUT).to_vec();
            merged.extend_from_slice(ctx.entities("double"));
            Ok(PipelineResult::new(merged))
        }))
        .build()
        .unwrap();
    let framework = RcaFramework::new(graph, Handle::current());

    let execution = framework.run(vec![1, 2]).await.unwrap();

    assert_eq!(execution.output().entities(), &[1, 2, 2, 4]);
}
