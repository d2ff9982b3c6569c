//! End-to-end pipeline tests against a recording host

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use slotprov::app::options::{IdentityMode, PipelineOptions, RunMode};
use slotprov::app::run::{run, RunOutcome};
use slotprov::app::state::Stage;
use slotprov::config::collector::ScriptedPrompter;
use slotprov::deploy::envfile::EnvFile;
use slotprov::deploy::service::ServiceStatus;
use slotprov::errors::ProvisionError;
use slotprov::host::fake::RecordingRunner;
use slotprov::host::Host;
use slotprov::storage::target::DeploymentTarget;

const CONFIRMED_LOCAL: [&str; 8] = ["", "wbkey123", "tok:abcdef", "-100555", "", "", "", "y"];
const CONFIRMED_PHASE_TWO: [&str; 7] = ["wbkey123", "tok:abcdef", "-100555", "", "", "", "y"];

struct Fixture {
    _dir: tempfile::TempDir,
    work: PathBuf,
    target: DeploymentTarget,
    runner: Arc<RecordingRunner>,
    host: Host,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::write(work.join("run_with_bot.py"), "import asyncio\n").unwrap();
        std::fs::write(work.join("wb_api.py"), "").unwrap();
        std::fs::write(work.join("requirements.txt"), "aiogram==3.4\n").unwrap();
        std::fs::write(work.join("credentials.json"), r#"{"type": "service_account"}"#).unwrap();

        let target = DeploymentTarget::new(dir.path().join("opt/bot"), dir.path().join("units"));
        let runner = Arc::new(RecordingRunner::new());
        runner.respond("systemctl is-active", "active\n");
        let host = Host::with_runner(runner.clone());

        Self {
            _dir: dir,
            work,
            target,
            runner,
            host,
        }
    }

    fn options(&self, run_mode: RunMode) -> PipelineOptions {
        PipelineOptions {
            run_mode,
            working_dir: self.work.clone(),
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// What a finished phase 1 leaves behind
    fn install_phase_one(&self, credentials: &str) {
        let root = &self.target.install_root;
        std::fs::create_dir_all(self.target.venv_bin()).unwrap();
        std::fs::write(self.target.venv_python(), "").unwrap();
        std::fs::write(root.join("run_with_bot.py"), "").unwrap();
        std::fs::write(root.join("credentials.json"), credentials).unwrap();
    }

    async fn run(
        &self,
        options: &PipelineOptions,
        prompter: &mut ScriptedPrompter,
    ) -> Result<RunOutcome, ProvisionError> {
        run(options, &self.target, &self.host, prompter).await
    }
}

#[tokio::test]
async fn test_single_run_installs_and_starts_service() {
    let fx = Fixture::new();
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);

    let outcome = tokio_test::assert_ok!(fx.run(&fx.options(RunMode::Single), &mut prompter).await);

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            warnings: Vec::new(),
            service: ServiceStatus::Active,
        }
    );
    assert_eq!(outcome.exit_code(), 0);

    let root = &fx.target.install_root;
    assert!(root.join("run_with_bot.py").is_file());
    assert!(root.join("data").is_dir());

    let env = EnvFile::parse(&std::fs::read_to_string(root.join(".env")).unwrap());
    assert_eq!(env.get("WB_API_KEY"), Some("wbkey123"));
    assert_eq!(env.get("TELEGRAM_CHAT_ID"), Some("-100555"));
    assert_eq!(env.get("CHECK_INTERVAL_SECONDS"), Some("120"));
    assert_eq!(env.get("LOG_LEVEL"), Some("INFO"));

    let unit = std::fs::read_to_string(fx.target.unit_file().path()).unwrap();
    assert!(unit.contains("User=wbbot"));
    assert!(unit.contains("ProtectSystem=strict"));

    // Stages ran in order
    let order = [
        "apt-get update",
        "python3.11 -m venv",
        "systemctl daemon-reload",
        "chown -R wbbot:wbbot",
        "import aiohttp",
        "systemctl enable wb-slots-bot.service",
        "systemctl start wb-slots-bot.service",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|pattern| fx.runner.position(pattern).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", fx.runner.calls());
}

#[tokio::test]
async fn test_cancel_changes_nothing() {
    let fx = Fixture::new();
    let mut answers = CONFIRMED_LOCAL;
    answers[7] = "n";
    let mut prompter = ScriptedPrompter::new(answers);

    let outcome = fx
        .run(&fx.options(RunMode::Single), &mut prompter)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(outcome.exit_code(), 0);
    assert!(fx.runner.calls().is_empty());
    assert!(!fx.target.install_root.exists());
    assert!(!fx.target.unit_file().path().exists());
}

#[tokio::test]
async fn test_failure_rolls_back_unit_and_tree() {
    let fx = Fixture::new();
    fx.runner.fail_on("pip install", 1);
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);

    let outcome = fx
        .run(&fx.options(RunMode::Single), &mut prompter)
        .await
        .unwrap();

    match &outcome {
        RunOutcome::RolledBack {
            stage,
            tree_removed,
            ..
        } => {
            assert_eq!(*stage, Some(Stage::Runtime));
            assert!(*tree_removed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert!(fx.runner.called("systemctl stop wb-slots-bot.service"));
    assert!(fx.runner.called("systemctl disable wb-slots-bot.service"));
    assert!(!fx.runner.called("systemctl start"));
    assert!(!fx.target.unit_file().path().exists());
    assert!(!fx.target.install_root.exists());
}

#[tokio::test]
async fn test_failed_start_removes_registered_unit() {
    let fx = Fixture::new();
    fx.runner.fail_on("systemctl start", 1);
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);

    let outcome = fx
        .run(&fx.options(RunMode::Single), &mut prompter)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), 1);
    assert!(!fx.target.unit_file().path().exists());
    let reloads = fx
        .runner
        .calls()
        .iter()
        .filter(|c| c.as_str() == "systemctl daemon-reload")
        .count();
    assert_eq!(reloads, 2);
}

#[tokio::test]
async fn test_phase_two_invalid_credentials_keeps_tree() {
    let fx = Fixture::new();
    fx.install_phase_one("{not json");
    let mut prompter = ScriptedPrompter::new(CONFIRMED_PHASE_TWO);

    let outcome = fx
        .run(&fx.options(RunMode::PhaseTwo), &mut prompter)
        .await
        .unwrap();

    match &outcome {
        RunOutcome::RolledBack {
            stage,
            error,
            tree_removed,
        } => {
            assert_eq!(*stage, Some(Stage::Validate));
            assert!(error.contains("not valid JSON"));
            assert!(!tree_removed);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert!(fx.target.entry_point().path().exists());
    assert!(fx.target.credentials_file().path().exists());
    assert!(!fx.target.unit_file().path().exists());
    assert!(!fx.runner.called("apt-get"));
}

#[tokio::test]
async fn test_phase_two_requires_phase_one() {
    let fx = Fixture::new();
    let mut prompter = ScriptedPrompter::new(CONFIRMED_PHASE_TWO);

    let err = fx
        .run(&fx.options(RunMode::PhaseTwo), &mut prompter)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PreconditionError(_)));
    assert_eq!(prompter.remaining(), CONFIRMED_PHASE_TWO.len());
    assert!(fx.runner.calls().is_empty());
}

#[tokio::test]
async fn test_phase_one_stops_before_configuration() {
    let fx = Fixture::new();
    let mut prompter = ScriptedPrompter::new(["", "y"]);

    let outcome = fx
        .run(&fx.options(RunMode::PhaseOne), &mut prompter)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::PhaseOneComplete);
    assert!(fx.target.entry_point().path().exists());
    assert!(!fx.target.env_file().path().exists());
    assert!(!fx.target.unit_file().path().exists());
    assert!(fx.runner.called("python3.11 -m venv"));
    assert!(!fx.runner.called("systemctl"));
}

#[tokio::test]
async fn test_phase_two_after_phase_one() {
    let fx = Fixture::new();
    fx.install_phase_one(r#"{"type": "service_account"}"#);
    let mut prompter = ScriptedPrompter::new(CONFIRMED_PHASE_TWO);

    let outcome = fx
        .run(&fx.options(RunMode::PhaseTwo), &mut prompter)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(!fx.runner.called("apt-get"));
    assert!(!fx.runner.called("git "));
    assert!(fx.target.env_file().path().exists());
}

#[tokio::test]
async fn test_local_deploy_without_entry_aborts_before_packages() {
    let fx = Fixture::new();
    std::fs::remove_file(fx.work.join("run_with_bot.py")).unwrap();
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);

    let err = fx
        .run(&fx.options(RunMode::Single), &mut prompter)
        .await
        .unwrap_err();

    assert!(err.is_precondition());
    assert!(!fx.runner.called("apt-get"));
    assert!(!fx.target.install_root.exists());
}

#[tokio::test]
async fn test_local_deploy_from_install_root_keeps_tree() {
    let fx = Fixture::new();
    let root = &fx.target.install_root;
    std::fs::create_dir_all(root).unwrap();
    std::fs::write(root.join("run_with_bot.py"), "import asyncio\n").unwrap();
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);
    let options = PipelineOptions {
        working_dir: root.clone(),
        ..fx.options(RunMode::Single)
    };

    let err = fx.run(&options, &mut prompter).await.unwrap_err();

    assert!(err.is_precondition());
    assert!(!fx.runner.called("apt-get"));
    assert!(root.join("run_with_bot.py").is_file());
}

#[tokio::test]
async fn test_existing_identity_uses_relaxed_unit() {
    let fx = Fixture::new();
    let options = PipelineOptions {
        identity: IdentityMode::Existing("root".to_string()),
        ..fx.options(RunMode::Single)
    };
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);

    let outcome = fx.run(&options, &mut prompter).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(!fx.runner.called("useradd"));
    assert!(fx.runner.called("chown -R root:root"));
    let unit = std::fs::read_to_string(fx.target.unit_file().path()).unwrap();
    assert!(unit.contains("User=root"));
    assert!(unit.contains("NoNewPrivileges=true"));
    assert!(!unit.contains("ProtectSystem"));
}

#[tokio::test]
async fn test_record_file_runs_without_prompts() {
    let fx = Fixture::new();
    let record = fx.work.join("record.json");
    std::fs::write(
        &record,
        r#"{
            "wb_api_key": "wbkey123",
            "telegram_bot_token": "tok:abcdef",
            "telegram_chat_id": "-100555",
            "check_interval_seconds": 90
        }"#,
    )
    .unwrap();
    let options = PipelineOptions {
        record_file: Some(record),
        ..fx.options(RunMode::Single)
    };
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let outcome = fx.run(&options, &mut prompter).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(prompter.questions().is_empty());
    let env = EnvFile::parse(&std::fs::read_to_string(fx.target.env_file().path()).unwrap());
    assert_eq!(env.get("CHECK_INTERVAL_SECONDS"), Some("90"));
}

#[tokio::test]
async fn test_inactive_service_still_succeeds() {
    let fx = Fixture::new();
    // Override the fixture's is-active response
    let runner = Arc::new(RecordingRunner::new());
    runner.fail_on("systemctl is-active", 3);
    let host = Host::with_runner(runner.clone());
    let mut prompter = ScriptedPrompter::new(CONFIRMED_LOCAL);

    let outcome = run(
        &fx.options(RunMode::Single),
        &fx.target,
        &host,
        &mut prompter,
    )
    .await
    .unwrap();

    match outcome {
        RunOutcome::Completed { service, .. } => assert!(!service.is_active()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(fx.target.unit_file().path().exists());
}
