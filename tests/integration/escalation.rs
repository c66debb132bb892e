//! Escalation integration tests
//!
//! Full watchdog cycles wired by `build_watchdog`: monitor sampling, the
//! investigator and the fixer, with fake tool backends.

use std::sync::Arc;

use opswatch::llm::OpenAiChatClient;
use opswatch::mcp::CallToolResult;
use opswatch::testing::{FakeBackends, FakeToolClient, ScriptedReasoning};
use opswatch::{build_watchdog, AppError, StatusBoard};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use crate::common::{azure_backend, constants, github_backend, metrics_payload, test_config};
use crate::mocks::MockLlmGateway;

const RCA: &str = "ROOT CAUSE ANALYSIS: commit 4f2a1c0 set WORKER_THREADS=64 on asp-test";

fn backends(sample: CallToolResult) -> Arc<FakeBackends> {
    Arc::new(FakeBackends::with_clients(vec![
        azure_backend(sample),
        github_backend(),
    ]))
}

#[tokio::test]
async fn test_spike_with_actionable_diagnosis_is_remediated() {
    let config = test_config("http://unused");
    let backends = backends(metrics_payload(95.5));
    let reasoning = ScriptedReasoning::replying(None)
        .with_session_reply("Investigator", Some(RCA))
        .with_session_reply("Fixer", Some("Opened PR #12 on fix/worker-threads"));
    let status = Arc::new(StatusBoard::new());

    let watchdog = build_watchdog(
        &config,
        backends.clone(),
        Arc::new(reasoning.clone()),
        status.clone(),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "remediated");
    assert_eq!(report.detail.as_deref(), Some("Opened PR #12 on fix/worker-threads"));

    let runs = reasoning.runs();
    assert_eq!(runs.len(), 2);

    let investigation = &runs[0];
    assert_eq!(investigation.session, "Investigator");
    assert!(investigation
        .user_input
        .starts_with("Anomaly detected: CpuPercentage spike on asp-test. Metrics: "));
    assert!(investigation.instruction.contains(constants::TEST_SUBSCRIPTION_ID));
    assert!(investigation.instruction.contains(constants::TEST_REPOSITORY));
    assert_eq!(
        investigation.tools,
        vec![
            "monitor",
            "resource_list",
            "list_commits",
            "create_branch",
            "create_or_update_file",
            "create_pull_request",
        ]
    );

    let remediation = &runs[1];
    assert_eq!(remediation.session, "Fixer");
    assert_eq!(
        remediation.user_input,
        format!("Please remediate the following RCA:\n\n{}", RCA)
    );

    let snapshot = status.snapshot();
    assert_eq!(snapshot.cycles_total, 1);
    assert_eq!(snapshot.remediations_total, 1);
}

#[tokio::test]
async fn test_healthy_cycle_makes_no_reasoning_calls() {
    let config = test_config("http://unused");
    let reasoning = ScriptedReasoning::replying(Some(RCA));

    let watchdog = build_watchdog(
        &config,
        backends(metrics_payload(15.5)),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "healthy");
    assert!(reasoning.runs().is_empty());
}

#[tokio::test]
async fn test_plain_text_sample_naming_target_is_healthy() {
    let config = test_config("http://unused");
    let reasoning = ScriptedReasoning::replying(Some(RCA));

    let watchdog = build_watchdog(
        &config,
        backends(CallToolResult::text("Found resource: asp-test")),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "healthy");
    assert!(reasoning.runs().is_empty());
}

#[tokio::test]
async fn test_empty_sample_escalates() {
    let config = test_config("http://unused");
    let reasoning = ScriptedReasoning::replying(None);

    let watchdog = build_watchdog(
        &config,
        backends(CallToolResult::default()),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "inconclusive");
    assert_eq!(reasoning.runs().len(), 1);
}

#[tokio::test]
async fn test_inconclusive_diagnosis_skips_fixer() {
    let config = test_config("http://unused");
    let reasoning = ScriptedReasoning::replying(None);

    let watchdog = build_watchdog(
        &config,
        backends(metrics_payload(99.0)),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "inconclusive");
    assert_eq!(report.detail.as_deref(), Some("No root cause identified."));
    let runs = reasoning.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].session, "Investigator");
}

#[tokio::test]
async fn test_failed_diagnosis_skips_fixer() {
    let config = test_config("http://unused");
    let reasoning =
        ScriptedReasoning::failing(AppError::UpstreamError("model overloaded".to_string()))
            .with_session_reply("Fixer", Some("should not run"));

    let watchdog = build_watchdog(
        &config,
        backends(metrics_payload(99.0)),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "inconclusive");
    assert!(report
        .detail
        .unwrap()
        .starts_with("Investigation failed: Upstream error: model overloaded"));
    assert_eq!(reasoning.runs().len(), 1);
}

#[tokio::test]
async fn test_sampling_transport_error_makes_no_reasoning_calls() {
    let config = test_config("http://unused");
    let reasoning = ScriptedReasoning::replying(Some(RCA));
    let backends = Arc::new(FakeBackends::with_clients(vec![
        FakeToolClient::new("azure").with_transport_error("monitor", "azure server exited"),
        github_backend(),
    ]));

    let watchdog = build_watchdog(
        &config,
        backends,
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "sampling_failed");
    assert!(report.detail.unwrap().contains("azure server exited"));
    assert!(!report.errored);
    assert!(reasoning.runs().is_empty());
}

#[tokio::test]
async fn test_remediation_failure_is_recorded_and_loop_survives() {
    let config = test_config("http://unused");
    let backends = Arc::new(FakeBackends::with_clients(vec![
        azure_backend(metrics_payload(97.0)),
        FakeToolClient::new("github").failing_list(),
    ]));
    // The investigator sees the listing failure too and reports it, so give
    // it a backend set that works and break only the fixer's tool listing.
    let investigator_backends = Arc::new(FakeBackends::with_clients(vec![azure_backend(
        metrics_payload(97.0),
    )]));
    let reasoning = ScriptedReasoning::replying(Some(RCA));
    let status = Arc::new(StatusBoard::new());

    let investigator = opswatch::agents::Investigator::new(
        Arc::new(reasoning.clone()),
        investigator_backends,
        opswatch::agents::EnvironmentContext::from_config(&config),
        config.inconclusive_marker.clone(),
    );
    let fixer = opswatch::agents::Fixer::new(
        Arc::new(reasoning.clone()),
        backends.clone(),
        opswatch::agents::EnvironmentContext::from_config(&config),
        Vec::new(),
    );
    let watchdog = opswatch::Watchdog::new(
        opswatch::WatchdogSettings::from_config(&config),
        backends,
        Arc::new(investigator),
        Arc::new(fixer),
        status.clone(),
    );

    let first = watchdog.run_cycle(&CancellationToken::new()).await;
    assert_eq!(first.outcome, "failed");
    assert!(first.errored);
    assert!(status.is_degraded());

    let second = watchdog.run_cycle(&CancellationToken::new()).await;
    assert_eq!(second.outcome, "failed");
    assert_eq!(status.snapshot().cycles_total, 2);
    assert_eq!(status.snapshot().cycles_errored, 2);
}

#[tokio::test]
async fn test_remediation_tools_restrict_fixer() {
    let mut config = test_config("http://unused");
    config.remediation_tools = vec![
        "create_branch".to_string(),
        "create_or_update_file".to_string(),
        "create_pull_request".to_string(),
    ];
    let reasoning = ScriptedReasoning::replying(Some(RCA));

    let watchdog = build_watchdog(
        &config,
        backends(metrics_payload(95.5)),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    watchdog.run_cycle(&CancellationToken::new()).await;

    let runs = reasoning.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].tools.len(), 6);
    assert_eq!(
        runs[1].tools,
        vec!["create_branch", "create_or_update_file", "create_pull_request"]
    );
}

#[tokio::test]
async fn test_investigator_tool_calls_reach_owning_backend() {
    let config = test_config("http://unused");
    let backends = backends(metrics_payload(95.5));
    let reasoning = ScriptedReasoning::replying(None)
        .with_session_reply("Investigator", Some(RCA))
        .with_tool_call("Investigator", "list_commits")
        .with_tool_call("Investigator", "resource_list");

    let watchdog = build_watchdog(
        &config,
        backends.clone(),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    watchdog.run_cycle(&CancellationToken::new()).await;

    let github_calls = backends.client("github").unwrap().calls();
    assert_eq!(github_calls.len(), 1);
    assert_eq!(github_calls[0].0, "list_commits");

    // monitor sampling plus the investigator's resource_list call
    let azure_calls: Vec<String> = backends
        .client("azure")
        .unwrap()
        .calls()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(azure_calls, vec!["monitor", "resource_list"]);

    assert_eq!(
        reasoning.runs()[0].tool_outputs,
        vec!["list_commits ok", "resource_list ok"]
    );
}

#[tokio::test]
async fn test_missing_coordinates_skip_without_connecting() {
    let mut config = test_config("http://unused");
    config.subscription_id = None;
    let backends = backends(metrics_payload(95.5));
    let reasoning = ScriptedReasoning::replying(Some(RCA));

    let watchdog = build_watchdog(
        &config,
        backends.clone(),
        Arc::new(reasoning.clone()),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "skipped");
    assert_eq!(report.detail.as_deref(), Some("missing AZURE_SUBSCRIPTION_ID"));
    assert!(backends.azure_requests().is_empty());
    assert!(reasoning.runs().is_empty());
}

#[tokio::test]
async fn test_cycle_through_chat_completions_endpoint() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_text_reply(RCA).await;
    let config = test_config(&gateway.base_url());

    let reasoning = OpenAiChatClient::new(reqwest::Client::new(), &config);
    let watchdog = build_watchdog(
        &config,
        backends(metrics_payload(95.5)),
        Arc::new(reasoning),
        Arc::new(StatusBoard::new()),
    );
    let report = watchdog.run_cycle(&CancellationToken::new()).await;

    assert_eq!(report.outcome, "remediated");

    let bodies = gateway.request_bodies().await;
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0]["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("Senior SRE Investigator"));
    assert!(bodies[1]["messages"][1]["content"]
        .as_str()
        .unwrap()
        .starts_with("Please remediate the following RCA:"));
}
