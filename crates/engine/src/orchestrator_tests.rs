// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use cm_adapters::{
    ExecutorCall, FakeExecutorAdapter, FakeLedgerAdapter, FakeStorageAdapter, LedgerCall,
    StorageCall, TxStatus,
};
use cm_core::test_support::{account_with_status, address, pending_account, pending_candidate};
use cm_core::{
    decode_job, encode_completion, ExecutionResult, JobStatus, COMPLETE_JOB_DISCRIMINATOR,
};
use solana_sdk::signature::Signer;

const PROGRAM: Pubkey = Pubkey::new_from_array([9; 32]);
const CODE: &str = "print('ok')";

struct Harness<E = FakeExecutorAdapter> {
    orchestrator: JobOrchestrator<FakeLedgerAdapter, FakeStorageAdapter, E>,
    ledger: FakeLedgerAdapter,
    storage: FakeStorageAdapter,
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_secs(3600),
        job_pacing: Duration::ZERO,
        settlement: SettlementConfig { confirm_attempts: 3, confirm_delay: Duration::ZERO },
        ..OrchestratorConfig::new(PROGRAM)
    }
}

fn harness_with<E: ExecutorAdapter>(executor: E, config: OrchestratorConfig) -> Harness<E> {
    let ledger = FakeLedgerAdapter::new();
    let storage = FakeStorageAdapter::new();
    storage.insert("QmCode", CODE);
    let deps = WorkerDeps { ledger: ledger.clone(), storage: storage.clone(), executor };
    Harness {
        orchestrator: JobOrchestrator::new(deps, Arc::new(Keypair::new()), config),
        ledger,
        storage,
    }
}

fn harness() -> (Harness, FakeExecutorAdapter) {
    let executor = FakeExecutorAdapter::new();
    (harness_with(executor.clone(), config()), executor)
}

fn status_of(ledger: &FakeLedgerAdapter, n: u8) -> JobStatus {
    decode_job(&ledger.account(&address(n)).unwrap()).unwrap().status
}

/// Formatted log output at the worker's default level
#[derive(Clone, Default)]
struct LogCapture(Arc<parking_lot::Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock()).lines().map(str::to_string).collect()
    }
}

#[test]
fn default_config() {
    let config = OrchestratorConfig::new(PROGRAM);
    assert_eq!(config.poll_interval, Duration::from_secs(10));
    assert_eq!(config.job_pacing, Duration::from_secs(2));
    assert_eq!(config.publish_fallback, PublishFallback::LocalDigest);
    assert!(config.recheck_before_settle);
    assert_eq!(config.settlement, SettlementConfig::default());
}

#[tokio::test]
async fn pending_job_is_settled_with_published_cid_and_cost() {
    let (mut h, executor) = harness();
    h.ledger.add_account(address(1), pending_account("QmCode"));
    h.storage.set_publish_cid("QmStub1");

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.pending, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);

    // 11 code bytes, 57 result bytes, 50 ms
    let expected_cost: u64 = 1_000_685;

    let submitted = h.ledger.submitted();
    assert_eq!(submitted.len(), 1);
    let tx = &submitted[0];
    let ix = &tx.message.instructions[0];
    assert_eq!(tx.message.account_keys[ix.program_id_index as usize], PROGRAM);

    let mut expected = COMPLETE_JOB_DISCRIMINATOR.to_vec();
    expected.extend_from_slice(&7u32.to_le_bytes());
    expected.extend_from_slice(b"QmStub1");
    expected.extend_from_slice(&expected_cost.to_le_bytes());
    assert_eq!(ix.data, expected);
    assert_eq!(ix.data, encode_completion("QmStub1", expected_cost));

    let job_index = ix.accounts[0] as usize;
    let worker_index = ix.accounts[1] as usize;
    assert_eq!(tx.message.account_keys[job_index], address(1));
    assert_eq!(tx.message.account_keys[worker_index], h.orchestrator.worker());
    assert!(!tx.message.is_signer(job_index));
    assert!(tx.message.is_signer(worker_index));

    assert_eq!(
        h.storage.published(),
        vec![serde_json::json!({"status": "success", "stdout": "ok", "execution_time_ms": 50})]
    );
    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].code, CODE);
    assert_eq!(calls[0].meta.job_type, "MANUAL");

    let job = decode_job(&h.ledger.account(&address(1)).unwrap()).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result_cid, "QmStub1");
    assert_eq!(job.cost, expected_cost);
    assert_eq!(h.orchestrator.stats().processed, 1);
}

#[tokio::test]
async fn fetch_failure_skips_execution_and_moves_on() {
    let (mut h, executor) = harness();
    h.ledger.add_account(address(1), pending_account("QmMissing"));
    h.ledger.add_account(address(2), pending_account("QmCode"));

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);

    assert_eq!(
        executor.calls(),
        vec![ExecutorCall {
            code: CODE.to_string(),
            meta: JobMetadata::from_job(&decode_job(&pending_account("QmCode")).unwrap()),
        }]
    );
    assert_eq!(h.ledger.submitted().len(), 1);
    assert_eq!(status_of(&h.ledger, 1), JobStatus::Pending);
    assert_eq!(status_of(&h.ledger, 2), JobStatus::Completed);
}

#[tokio::test]
async fn unconfirmed_settlement_counts_as_failed() {
    let (mut h, _) = harness();
    h.ledger.add_account(address(1), pending_account("QmCode"));
    h.ledger.set_tx_status(TxStatus::Unknown);

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(h.ledger.status_polls(), 3);
    assert_eq!(status_of(&h.ledger, 1), JobStatus::Pending);

    let stats = h.orchestrator.stats();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.failed, 1);
}

#[yare::parameterized(
    completed = { JobStatus::Completed },
    cancelled = { JobStatus::Cancelled },
)]
fn non_pending_jobs_never_reach_external_calls(status: JobStatus) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    rt.block_on(async {
        let (mut h, executor) = harness();
        h.ledger.add_account(address(1), account_with_status("QmCode", status));

        for _ in 0..2 {
            let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
            assert_eq!(report.accounts, 1);
            assert_eq!(report.pending, 0);
        }

        assert!(executor.calls().is_empty());
        assert!(h.storage.calls().is_empty());
        assert!(h.ledger.submitted().is_empty());
        assert_eq!(
            h.ledger.calls(),
            vec![LedgerCall::ProgramAccounts(PROGRAM), LedgerCall::ProgramAccounts(PROGRAM)]
        );
    });
}

#[tokio::test]
async fn settled_job_is_not_picked_up_again() {
    let (mut h, executor) = harness();
    h.ledger.add_account(address(1), pending_account("QmCode"));

    let first = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    let second = h.orchestrator.run_cycle(&CancellationToken::new()).await;

    assert_eq!(first.succeeded, 1);
    assert_eq!(second.pending, 0);
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(h.ledger.submitted().len(), 1);
    assert_eq!(h.orchestrator.stats().cycles, 2);
}

#[tokio::test]
async fn undecodable_accounts_are_skipped() {
    let (mut h, _) = harness();
    h.ledger.add_account(address(1), vec![0; 12]);
    let mut bad_utf8 = pending_account("QmCode");
    bad_utf8[8 + 32 + 4] = 0xff;
    h.ledger.add_account(address(2), bad_utf8);
    h.ledger.add_account(address(3), pending_account("QmCode"));

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.accounts, 3);
    assert_eq!(report.undecodable, 2);
    assert_eq!(report.pending, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(status_of(&h.ledger, 3), JobStatus::Completed);
}

#[tokio::test]
async fn skipped_and_abandoned_jobs_are_logged_with_their_address() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let (mut h, _) = harness();
    h.ledger.add_account(address(1), vec![0; 12]);
    h.ledger.add_account(address(2), pending_account("QmMissing"));

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.undecodable, 1);
    assert_eq!(report.failed, 1);

    let lines = logs.lines();
    let skipped = address(1).to_string();
    let abandoned = address(2).to_string();
    assert!(
        lines.iter().any(|l| l.contains("WARN")
            && l.contains("skipping undecodable account")
            && l.contains(&skipped)),
        "{:#?}",
        lines
    );
    assert!(
        lines.iter().any(|l| l.contains("found pending jobs") && l.contains("undecodable=1")),
        "{:#?}",
        lines
    );
    assert!(
        lines.iter().any(|l| l.contains("WARN")
            && l.contains("job abandoned")
            && l.contains(&abandoned)
            && l.contains("QmMissing")),
        "{:#?}",
        lines
    );
}

#[tokio::test]
async fn listing_preserves_ledger_order() {
    let (h, _) = harness();
    for n in [4, 2, 7] {
        h.ledger.add_account(address(n), pending_account("QmCode"));
    }
    let listing = h.orchestrator.list_pending().await.unwrap();
    let order: Vec<_> = listing.pending.iter().map(|c| c.address).collect();
    assert_eq!(order, vec![address(4), address(2), address(7)]);
}

#[tokio::test]
async fn listing_failure_ends_cycle_quietly() {
    let (mut h, executor) = harness();
    h.ledger.fail_listing("429 Too Many Requests");

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report, CycleReport::default());
    assert!(executor.calls().is_empty());
    assert_eq!(h.orchestrator.stats().cycles, 1);
}

#[tokio::test]
async fn publish_failure_settles_with_local_digest() {
    let (mut h, _) = harness();
    h.ledger.add_account(address(1), pending_account("QmCode"));
    h.storage.fail_publish(StorageError::NotConfigured("PINATA_JWT"));

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.succeeded, 1);

    let job = decode_job(&h.ledger.account(&address(1)).unwrap()).unwrap();
    assert_eq!(
        job.result_cid,
        fallback_cid(br#"{"status":"success","stdout":"ok","execution_time_ms":50}"#)
    );
    assert_eq!(job.result_cid.len(), 46);
}

#[tokio::test]
async fn publish_failure_aborts_when_publishing_is_required() {
    let executor = FakeExecutorAdapter::new();
    let config = OrchestratorConfig { publish_fallback: PublishFallback::Abort, ..config() };
    let h = harness_with(executor, config);
    h.storage.fail_publish(StorageError::Status { url: "pin".to_string(), status: 401 });

    let err = h.orchestrator.process_job(&pending_candidate(1, "QmCode")).await.unwrap_err();
    assert!(matches!(err, JobError::Publish(_)), "{:?}", err);
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn executor_failure_skips_publish_and_settlement() {
    let (h, executor) = harness();
    executor.fail(ExecutorError::Status(502));

    let err = h.orchestrator.process_job(&pending_candidate(1, "QmCode")).await.unwrap_err();
    assert!(matches!(err, JobError::Execute(ExecutorError::Status(502))));
    assert_eq!(h.storage.calls(), vec![StorageCall::Fetch("QmCode".to_string())]);
    assert!(h.ledger.calls().is_empty());
}

#[tokio::test]
async fn script_error_is_still_settled() {
    let (mut h, executor) = harness();
    h.ledger.add_account(address(1), pending_account("QmCode"));
    let mut result = ExecutionResult::failure("NameError: name 'x' is not defined", 12);
    result.extra.insert("error_type".to_string(), "NameError".into());
    executor.set_result(result.clone());

    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.succeeded, 1);

    let published = h.storage.published();
    assert_eq!(published[0]["status"], "error");
    assert_eq!(published[0]["error_type"], "NameError");
    assert_eq!(status_of(&h.ledger, 1), JobStatus::Completed);
}

#[tokio::test]
async fn missing_execution_time_is_costed_as_default() {
    let (h, executor) = harness();
    let mut result = ExecutionResult::success("ok", 0);
    result.execution_time_ms = None;
    executor.set_result(result);
    h.ledger.add_account(address(1), pending_account("QmCode"));

    let receipt = h.orchestrator.process_job(&pending_candidate(1, "QmCode")).await.unwrap();
    // 11 code bytes, 34 result bytes, 100 ms assumed
    assert_eq!(receipt.cost, 1_000_460);
    assert!(!receipt.fallback_cid);
}

#[tokio::test]
async fn non_utf8_code_is_abandoned() {
    let (h, executor) = harness();
    h.storage.insert("QmBinary", vec![0xff, 0xfe, 0x00]);

    let err = h.orchestrator.process_job(&pending_candidate(1, "QmBinary")).await.unwrap_err();
    assert!(matches!(err, JobError::CodeEncoding { .. }));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn job_completed_elsewhere_is_not_submitted() {
    let (h, _) = harness();
    h.ledger.add_account(address(1), account_with_status("QmCode", JobStatus::Completed));

    let err = h.orchestrator.process_job(&pending_candidate(1, "QmCode")).await.unwrap_err();
    assert!(matches!(err, JobError::NotPending(ref s) if s == "completed"), "{:?}", err);
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test]
async fn closed_account_is_not_submitted() {
    let (h, _) = harness();
    let err = h.orchestrator.process_job(&pending_candidate(1, "QmCode")).await.unwrap_err();
    assert!(matches!(err, JobError::NotPending(ref s) if s == "account closed"));
}

#[tokio::test]
async fn recheck_can_be_disabled() {
    let executor = FakeExecutorAdapter::new();
    let config = OrchestratorConfig { recheck_before_settle: false, ..config() };
    let h = harness_with(executor, config);
    h.ledger.add_account(address(1), pending_account("QmCode"));

    h.orchestrator.process_job(&pending_candidate(1, "QmCode")).await.unwrap();
    assert!(!h.ledger.calls().iter().any(|c| matches!(c, LedgerCall::AccountData(_))));
}

#[tokio::test]
async fn cancelled_before_start_runs_no_cycle() {
    let (mut h, _) = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = h.orchestrator.run(cancel).await;
    assert_eq!(stats, OrchestratorStats::default());
    assert!(h.ledger.calls().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_the_inter_cycle_wait() {
    let (mut h, _) = harness();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let task = tokio::spawn(async move { h.orchestrator.run(cancel).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert_eq!(stats.cycles, 1);
}

#[tokio::test]
async fn cancellation_between_jobs_stops_the_cycle() {
    let (mut h, executor) = harness();
    h.ledger.add_account(address(1), pending_account("QmCode"));
    h.ledger.add_account(address(2), pending_account("QmCode"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = h.orchestrator.run_cycle(&cancel).await;
    assert!(report.interrupted);
    assert_eq!(report.pending, 2);
    assert_eq!(report.succeeded, 0);
    assert!(executor.calls().is_empty());
}

/// Executor that requests shutdown while a job is in the pipeline.
#[derive(Clone)]
struct CancellingExecutor {
    cancel: CancellationToken,
}

#[async_trait]
impl ExecutorAdapter for CancellingExecutor {
    async fn run(&self, _code: &str, _meta: &JobMetadata) -> Result<ExecutionResult, ExecutorError> {
        self.cancel.cancel();
        Ok(ExecutionResult::success("ok", 50))
    }
}

#[tokio::test]
async fn in_flight_job_completes_before_shutdown() {
    let cancel = CancellationToken::new();
    let executor = CancellingExecutor { cancel: cancel.clone() };
    let mut h = harness_with(executor, config());
    h.ledger.add_account(address(1), pending_account("QmCode"));
    h.ledger.add_account(address(2), pending_account("QmCode"));

    let stats = h.orchestrator.run(cancel).await;

    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(status_of(&h.ledger, 1), JobStatus::Completed);
    assert_eq!(status_of(&h.ledger, 2), JobStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn jobs_are_paced() {
    let executor = FakeExecutorAdapter::new();
    let config = OrchestratorConfig { job_pacing: Duration::from_secs(2), ..config() };
    let mut h = harness_with(executor, config);
    for n in 1..=3 {
        h.ledger.add_account(address(n), pending_account("QmCode"));
    }

    let start = tokio::time::Instant::now();
    let report = h.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(report.succeeded, 3);
    assert!(start.elapsed() >= Duration::from_secs(4));
}

#[test]
fn worker_identity_is_the_signer() {
    let keypair = Arc::new(Keypair::new());
    let deps = WorkerDeps {
        ledger: FakeLedgerAdapter::new(),
        storage: FakeStorageAdapter::new(),
        executor: FakeExecutorAdapter::new(),
    };
    let orchestrator = JobOrchestrator::new(deps, keypair.clone(), config());
    assert_eq!(orchestrator.worker(), keypair.pubkey());
}
