//! FSM unit tests

use slotprov::deploy::fsm::{ProvisioningEvent, ProvisioningFsm, ProvisioningState};

#[test]
fn test_fsm_initial_state() {
    let fsm = ProvisioningFsm::new();
    assert_eq!(fsm.state(), ProvisioningState::Collecting);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.history(), &[ProvisioningState::Collecting]);
}

#[test]
fn test_fsm_phase_one_flow() {
    let mut fsm = ProvisioningFsm::new();

    // Collecting -> Provisioning -> Deploying -> BuildingRuntime
    fsm.process(ProvisioningEvent::Provision).unwrap();
    fsm.process(ProvisioningEvent::Deploy).unwrap();
    fsm.process(ProvisioningEvent::BuildRuntime).unwrap();
    assert_eq!(fsm.state(), ProvisioningState::BuildingRuntime);

    // Phase 1 stops here
    fsm.process(ProvisioningEvent::Finish).unwrap();
    assert_eq!(fsm.state(), ProvisioningState::Done);
}

#[test]
fn test_fsm_phase_two_skips_provisioning() {
    let mut fsm = ProvisioningFsm::new();

    // Collecting -> Configuring
    fsm.process(ProvisioningEvent::Configure).unwrap();
    assert_eq!(fsm.state(), ProvisioningState::Configuring);

    fsm.process(ProvisioningEvent::Validate).unwrap();
    fsm.process(ProvisioningEvent::Start).unwrap();
    fsm.process(ProvisioningEvent::Finish).unwrap();
    assert_eq!(
        fsm.history(),
        &[
            ProvisioningState::Collecting,
            ProvisioningState::Configuring,
            ProvisioningState::Validating,
            ProvisioningState::Starting,
            ProvisioningState::Done,
        ]
    );
}

#[test]
fn test_fsm_failure_during_validation() {
    let mut fsm = ProvisioningFsm::new();
    fsm.process(ProvisioningEvent::Configure).unwrap();
    fsm.process(ProvisioningEvent::Validate).unwrap();

    fsm.process(ProvisioningEvent::Fail("credentials.json is not valid JSON".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), ProvisioningState::RolledBack);
    assert_eq!(fsm.error(), Some("credentials.json is not valid JSON"));
}

#[test]
fn test_fsm_cancel_only_while_collecting() {
    let mut fsm = ProvisioningFsm::new();
    fsm.process(ProvisioningEvent::Provision).unwrap();

    // Too late to cancel once the host is being changed
    assert!(fsm.process(ProvisioningEvent::Cancel).is_err());
    assert_eq!(fsm.state(), ProvisioningState::Provisioning);
}

#[test]
fn test_fsm_invalid_transitions() {
    let mut fsm = ProvisioningFsm::new();

    // Cannot start before validating
    assert!(fsm.process(ProvisioningEvent::Start).is_err());
    // Cannot skip deployment
    fsm.process(ProvisioningEvent::Provision).unwrap();
    assert!(fsm.process(ProvisioningEvent::BuildRuntime).is_err());
    assert!(fsm.process(ProvisioningEvent::Finish).is_err());

    // State unchanged after rejected events
    assert_eq!(fsm.state(), ProvisioningState::Provisioning);
    assert_eq!(fsm.history().len(), 2);
}

#[test]
fn test_fsm_rolled_back_is_final() {
    let mut fsm = ProvisioningFsm::new();
    fsm.process(ProvisioningEvent::Fail("apt-get failed".to_string()))
        .unwrap();

    assert!(fsm.state().is_terminal());
    assert!(fsm.process(ProvisioningEvent::Provision).is_err());
    assert!(fsm
        .process(ProvisioningEvent::Fail("again".to_string()))
        .is_err());
    assert_eq!(fsm.error(), Some("apt-get failed"));
}
