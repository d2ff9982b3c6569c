//! The provisioning pipeline

use std::future::Future;

use tracing::{error, info};

use crate::app::options::{PipelineOptions, RunMode};
use crate::app::state::{PipelineState, Stage};
use crate::config::collector::{ConfigCollector, Confirmation, Prompter};
use crate::config::record::{ConfigurationRecord, RecordFile, SourceLocation};
use crate::deploy::envfile::ConfigMaterializer;
use crate::deploy::fsm::{ProvisioningEvent, ProvisioningFsm};
use crate::deploy::identity::ServiceIdentityManager;
use crate::deploy::packages::PackageInstaller;
use crate::deploy::permissions::PermissionsEnforcer;
use crate::deploy::prereq::PrerequisiteChecker;
use crate::deploy::rollback::RollbackController;
use crate::deploy::runtime::RuntimeBuilder;
use crate::deploy::service::{ServiceController, ServiceStatus};
use crate::deploy::source::SourceDeployer;
use crate::deploy::unit::UnitGenerator;
use crate::deploy::validate::Validator;
use crate::errors::ProvisionError;
use crate::host::Host;
use crate::storage::target::DeploymentTarget;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Service configured and started
    Completed {
        warnings: Vec<String>,
        service: ServiceStatus,
    },
    /// Host prepared; the operator uploads credentials and runs phase two
    PhaseOneComplete,
    /// Operator declined; nothing was changed
    Cancelled,
    /// A stage failed and its effects were undone
    RolledBack {
        stage: Option<Stage>,
        error: String,
        tree_removed: bool,
    },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::RolledBack { .. } => 1,
            _ => 0,
        }
    }
}

/// What the operator confirmed
enum Collected {
    Source(SourceLocation),
    Record(ConfigurationRecord),
}

/// Run the pipeline once.
///
/// Errors returned from here happened before the host was touched
/// (preconditions, unusable input). Failures after that are rolled back and
/// reported as [`RunOutcome::RolledBack`].
pub async fn run(
    options: &PipelineOptions,
    target: &DeploymentTarget,
    host: &Host,
    prompter: &mut dyn Prompter,
) -> Result<RunOutcome, ProvisionError> {
    let mut pipeline = Pipeline::new(options, target, host);

    if options.run_mode == RunMode::PhaseTwo {
        PrerequisiteChecker::new(target)
            .check_phase_one_artifacts()
            .await?;
    }

    let collected = match collect(options, prompter).await? {
        Confirmation::Confirmed(collected) => collected,
        Confirmation::Cancelled => {
            pipeline.transition(ProvisioningEvent::Cancel)?;
            info!("Installation cancelled, nothing was changed");
            return Ok(RunOutcome::Cancelled);
        }
    };

    let source = match &collected {
        Collected::Source(source) => source,
        Collected::Record(record) => record.source(),
    };
    SourceDeployer::new(target.clone(), host.runner.clone(), &options.working_dir)
        .preflight(source)
        .await?;

    let result = pipeline.execute(&collected).await;
    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) => Ok(pipeline.roll_back(e).await),
    }
}

async fn collect(
    options: &PipelineOptions,
    prompter: &mut dyn Prompter,
) -> Result<Confirmation<Collected>, ProvisionError> {
    let installed = (options.run_mode == RunMode::PhaseTwo).then_some(SourceLocation::Installed);

    // A record file counts as confirmed
    if let Some(path) = &options.record_file {
        info!("Reading configuration from {}", path.display());
        let file = RecordFile::load(path).await?;
        let collected = match options.run_mode {
            RunMode::PhaseOne => Collected::Source(file.source()?),
            _ => Collected::Record(file.into_record(installed)?),
        };
        return Ok(Confirmation::Confirmed(collected));
    }

    let mut collector = ConfigCollector::new(prompter);
    let confirmation = match options.run_mode {
        RunMode::PhaseOne => match collector.collect_source()? {
            Confirmation::Confirmed(source) => Confirmation::Confirmed(Collected::Source(source)),
            Confirmation::Cancelled => Confirmation::Cancelled,
        },
        _ => match collector.collect_record(installed)? {
            Confirmation::Confirmed(record) => Confirmation::Confirmed(Collected::Record(record)),
            Confirmation::Cancelled => Confirmation::Cancelled,
        },
    };
    Ok(confirmation)
}

struct Pipeline<'a> {
    options: &'a PipelineOptions,
    target: &'a DeploymentTarget,
    host: &'a Host,
    fsm: ProvisioningFsm,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    fn new(options: &'a PipelineOptions, target: &'a DeploymentTarget, host: &'a Host) -> Self {
        Self {
            options,
            target,
            host,
            fsm: ProvisioningFsm::new(),
            state: PipelineState::new(),
        }
    }

    fn transition(&mut self, event: ProvisioningEvent) -> Result<(), ProvisionError> {
        let state = self
            .fsm
            .process(event)
            .map_err(ProvisionError::StateError)?;
        info!("Provisioning state: {:?}", state);
        Ok(())
    }

    async fn stage<T, F>(&mut self, stage: Stage, work: F) -> Result<T, ProvisionError>
    where
        F: Future<Output = Result<T, ProvisionError>>,
    {
        self.state.begin(stage);
        info!("Stage {} started", stage);
        let value = work.await?;
        self.state.complete();
        info!("Stage {} done", stage);
        Ok(value)
    }

    async fn execute(&mut self, collected: &Collected) -> Result<RunOutcome, ProvisionError> {
        let (source, record) = match collected {
            Collected::Source(source) => (source, None),
            Collected::Record(record) => (record.source(), Some(record)),
        };

        if self.options.run_mode.provisions_host() {
            self.provision_host(source).await?;
        }

        match record {
            Some(record) if self.options.run_mode.configures_service() => {
                self.configure_service(record).await
            }
            _ => {
                self.transition(ProvisioningEvent::Finish)?;
                Ok(RunOutcome::PhaseOneComplete)
            }
        }
    }

    async fn provision_host(&mut self, source: &SourceLocation) -> Result<(), ProvisionError> {
        let target = self.target;
        let host = self.host;
        let options = self.options;
        let identity = &options.identity;

        self.transition(ProvisioningEvent::Provision)?;
        let installer = PackageInstaller::new(
            host.packages.clone(),
            host.runner.clone(),
            target.interpreter.as_str(),
        );
        self.stage(Stage::Packages, installer.ensure()).await?;

        let identities = ServiceIdentityManager::new(host.accounts.clone());
        self.stage(
            Stage::Identity,
            identities.ensure(identity, identity.account(target), &target.install_root),
        )
        .await?;

        self.transition(ProvisioningEvent::Deploy)?;
        let deployer =
            SourceDeployer::new(target.clone(), host.runner.clone(), &options.working_dir);
        self.stage(Stage::Source, deployer.deploy(source)).await?;

        self.transition(ProvisioningEvent::BuildRuntime)?;
        let builder = RuntimeBuilder::new(target.clone(), host.runner.clone());
        self.stage(Stage::Runtime, builder.build()).await?;
        Ok(())
    }

    async fn configure_service(
        &mut self,
        record: &ConfigurationRecord,
    ) -> Result<RunOutcome, ProvisionError> {
        let target = self.target;
        let host = self.host;
        let options = self.options;
        let identity = &options.identity;

        self.transition(ProvisioningEvent::Configure)?;
        let materializer = ConfigMaterializer::new(target);
        self.stage(Stage::Configure, materializer.write(record)).await?;

        let units = UnitGenerator::new(target, host.units.clone());
        self.stage(Stage::Unit, units.install(identity)).await?;

        let enforcer =
            PermissionsEnforcer::new(target, host.accounts.clone(), identity.account(target));
        self.stage(Stage::Permissions, enforcer.enforce()).await?;

        self.transition(ProvisioningEvent::Validate)?;
        let validator = Validator::new(
            target,
            host.runner.clone(),
            options.run_mode.strict_validation(),
        );
        let report = self.stage(Stage::Validate, validator.run()).await?;

        self.transition(ProvisioningEvent::Start)?;
        let controller =
            ServiceController::new(host.units.clone(), target.unit(), options.settle_delay);
        let service = self.stage(Stage::Start, controller.start()).await?;

        self.transition(ProvisioningEvent::Finish)?;
        Ok(RunOutcome::Completed {
            warnings: report.warnings,
            service,
        })
    }

    async fn roll_back(mut self, err: ProvisionError) -> RunOutcome {
        let stage = self.state.current();
        error!("Stage {:?} failed: {}", stage, err);
        if let Err(e) = self.fsm.process(ProvisioningEvent::Fail(err.to_string())) {
            error!("{}", e);
        }

        let report = RollbackController::new(
            self.target,
            self.host.units.clone(),
            self.options.run_mode.removes_tree_on_rollback(),
        )
        .rollback(&self.state)
        .await;

        RunOutcome::RolledBack {
            stage,
            error: err.to_string(),
            tree_removed: report.tree_removed,
        }
    }
}
