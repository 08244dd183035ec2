//! # Plan and Apply Tests
//!
//! Manifest and state files on disk, driven through plan/apply against the
//! in-memory platform.

use extension_controller::controller::{
    apply, plan, plan_destroy, ApplyError, PlanAction, PlanError, Reconciler, RetryPolicy,
};
use extension_controller::manifest::Manifest;
use extension_controller::provider::memory::{ClientCall, InMemoryExtensions};
use extension_controller::provider::RemoteError;
use extension_controller::state::StateStore;
use std::sync::Arc;
use tempfile::TempDir;

const MANIFEST: &str = r"
extensions:
  order-hook:
    key: order-hook
    destination:
      - type: HTTP
        url: https://hooks.example.com/orders
        authorization_header: Basic dXNlcjpwYXNzd29yZA==
    trigger:
      - resource_type_id: order
        actions: [Create]
  cart-lambda:
    key: cart-lambda
    timeout_in_ms: 2000
    destination:
      - type: AWSLambda
        arn: arn:aws:lambda:eu-west-1:111111111:function:api_extensions
        access_key: ABCSDF123123123
        access_secret: '****abc/'
    trigger:
      - resource_type_id: cart
        actions: [Create, Update]
";

struct Fixture {
    dir: TempDir,
    platform: InMemoryExtensions,
    reconciler: Reconciler,
    policy: RetryPolicy,
}

impl Fixture {
    fn new() -> Self {
        let platform = InMemoryExtensions::new();
        Self {
            dir: tempfile::tempdir().unwrap(),
            reconciler: Reconciler::new(Arc::new(platform.clone())),
            platform,
            policy: RetryPolicy {
                max_attempts: 3,
                backoff_start_ms: 1,
                backoff_max_ms: 5,
            },
        }
    }

    fn write_manifest(&self, text: &str) -> Manifest {
        let path = self.dir.path().join("extensions.yaml");
        std::fs::write(&path, text).unwrap();
        Manifest::from_path(&path).unwrap()
    }

    fn state_path(&self) -> std::path::PathBuf {
        self.dir.path().join("extensions.state.json")
    }

    fn state(&self) -> StateStore {
        StateStore::load(self.state_path()).unwrap()
    }

    async fn converge(&self, manifest: &Manifest) {
        let mut state = self.state();
        let plan = plan(&self.reconciler, &self.policy, manifest, &state)
            .await
            .unwrap();
        apply(&self.reconciler, &self.policy, plan, &mut state)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_first_apply_creates_everything_and_persists_state() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);

    fixture.converge(&manifest).await;

    let state = fixture.state();
    assert_eq!(state.len(), 2);
    assert_eq!(fixture.platform.extension_count().await, 2);
    let lambda = state.get("cart-lambda").unwrap();
    assert_eq!(lambda.timeout_in_ms, Some(2000));
    assert_eq!(
        fixture.platform.stored(&lambda.id).await.as_ref(),
        Some(lambda)
    );
}

#[tokio::test]
async fn test_second_plan_is_empty() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    fixture.converge(&manifest).await;

    let state = fixture.state();
    let plan = plan(&fixture.reconciler, &fixture.policy, &manifest, &state)
        .await
        .unwrap();

    assert!(!plan.has_changes());
    assert_eq!(fixture.platform.calls().await.mutations(), 2);
}

#[tokio::test]
async fn test_external_drift_is_planned_as_update() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    fixture.converge(&manifest).await;

    let id = fixture.state().get("order-hook").unwrap().id.clone();
    fixture
        .platform
        .modify_externally(&id, |ext| ext.timeout_in_ms = Some(9000))
        .await
        .unwrap();

    let mut state = fixture.state();
    let plan = plan(&fixture.reconciler, &fixture.policy, &manifest, &state)
        .await
        .unwrap();
    let entry = plan
        .entries
        .iter()
        .find(|entry| entry.name == "order-hook")
        .unwrap();
    match &entry.action {
        PlanAction::Update { actions, .. } => {
            assert_eq!(actions.len(), 1);
            assert_eq!(actions[0].name(), "setTimeoutInMs");
        }
        other => panic!("Expected update, got {other:?}"),
    }

    let summary = apply(&fixture.reconciler, &fixture.policy, plan, &mut state)
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(fixture.platform.stored(&id).await.unwrap().timeout_in_ms, None);
    assert_eq!(state.get("order-hook").unwrap().version, 3);
}

#[tokio::test]
async fn test_extension_deleted_outside_is_recreated() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    fixture.converge(&manifest).await;

    let old_id = fixture.state().get("order-hook").unwrap().id.clone();
    fixture.platform.remove_externally(&old_id).await;

    let mut state = fixture.state();
    let plan = plan(&fixture.reconciler, &fixture.policy, &manifest, &state)
        .await
        .unwrap();
    assert_eq!(plan.change_counts(), (1, 0, 0));

    apply(&fixture.reconciler, &fixture.policy, plan, &mut state)
        .await
        .unwrap();
    let new_id = &state.get("order-hook").unwrap().id;
    assert_ne!(new_id, &old_id);
    assert_eq!(fixture.platform.extension_count().await, 2);
}

#[tokio::test]
async fn test_transient_failures_retried_during_apply() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    fixture
        .platform
        .fail_next(ClientCall::Create, RemoteError::status(503, "Service Unavailable"))
        .await;

    fixture.converge(&manifest).await;

    assert_eq!(fixture.platform.calls().await.create, 3);
    assert_eq!(fixture.state().len(), 2);
}

#[tokio::test]
async fn test_lost_create_response_does_not_duplicate() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    fixture
        .platform
        .fail_after_commit(
            ClientCall::Create,
            RemoteError::Transport("connection reset".to_string()),
        )
        .await;

    fixture.converge(&manifest).await;

    let state = fixture.state();
    assert_eq!(fixture.platform.extension_count().await, 2);
    assert_eq!(fixture.platform.calls().await.create, 2);
    for name in ["cart-lambda", "order-hook"] {
        let tracked = state.get(name).unwrap();
        assert!(fixture.platform.stored(&tracked.id).await.is_some());
    }
}

#[tokio::test]
async fn test_masked_credentials_plan_no_changes() {
    let fixture = Fixture::new();
    fixture.platform.set_credential_masking(true).await;
    let manifest = fixture.write_manifest(MANIFEST);
    fixture.converge(&manifest).await;

    for _ in 0..2 {
        let state = fixture.state();
        let plan = plan(&fixture.reconciler, &fixture.policy, &manifest, &state)
            .await
            .unwrap();
        assert!(!plan.has_changes());
    }
    assert_eq!(fixture.platform.calls().await.mutations(), 2);
    let lambda = fixture.state().get("cart-lambda").unwrap().clone();
    assert_eq!(fixture.platform.stored(&lambda.id).await.unwrap().destination, lambda.destination);
}

#[tokio::test]
async fn test_apply_stops_at_first_failure() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    let mut state = fixture.state();
    let plan = plan(&fixture.reconciler, &fixture.policy, &manifest, &state)
        .await
        .unwrap();

    // Entries are applied in name order: cart-lambda, then order-hook
    fixture
        .platform
        .fail_next(ClientCall::Create, RemoteError::status(403, "Insufficient scope."))
        .await;
    let error = apply(&fixture.reconciler, &fixture.policy, plan, &mut state)
        .await
        .unwrap_err();

    match error {
        ApplyError::Reconcile {
            name, operation, ..
        } => {
            assert_eq!(name, "cart-lambda");
            assert_eq!(operation, "create");
        }
        ApplyError::State(e) => panic!("Unexpected state error: {e}"),
    }
    assert!(fixture.state().is_empty());
    assert_eq!(fixture.platform.extension_count().await, 0);
}

#[tokio::test]
async fn test_partial_apply_persists_completed_entries() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(MANIFEST);
    let mut state = fixture.state();
    let plan = plan(&fixture.reconciler, &fixture.policy, &manifest, &state)
        .await
        .unwrap();

    // The second create hits a key already taken on the platform
    fixture
        .platform
        .seed(&manifest.decode().unwrap()["order-hook"])
        .await;
    let error = apply(&fixture.reconciler, &fixture.policy, plan, &mut state)
        .await
        .unwrap_err();

    assert!(error.to_string().contains("order-hook"));
    let persisted = fixture.state();
    assert_eq!(persisted.len(), 1);
    assert!(persisted.get("cart-lambda").is_some());
}

#[tokio::test]
async fn test_removed_manifest_entry_is_deleted() {
    let fixture = Fixture::new();
    fixture.converge(&fixture.write_manifest(MANIFEST)).await;

    let reduced = fixture.write_manifest(
        r"
extensions:
  order-hook:
    key: order-hook
    destination:
      - type: HTTP
        url: https://hooks.example.com/orders
        authorization_header: Basic dXNlcjpwYXNzd29yZA==
    trigger:
      - resource_type_id: order
        actions: [Create]
",
    );
    let mut state = fixture.state();
    let plan = plan(&fixture.reconciler, &fixture.policy, &reduced, &state)
        .await
        .unwrap();
    assert_eq!(plan.change_counts(), (0, 0, 1));

    apply(&fixture.reconciler, &fixture.policy, plan, &mut state)
        .await
        .unwrap();
    assert_eq!(fixture.state().len(), 1);
    assert_eq!(fixture.platform.extension_count().await, 1);
}

#[tokio::test]
async fn test_destroy_removes_everything() {
    let fixture = Fixture::new();
    fixture.converge(&fixture.write_manifest(MANIFEST)).await;

    let mut state = fixture.state();
    let plan = plan_destroy(&state);
    assert_eq!(plan.change_counts(), (0, 0, 2));

    let summary = apply(&fixture.reconciler, &fixture.policy, plan, &mut state)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 2);
    assert!(fixture.state().is_empty());
    assert_eq!(fixture.platform.extension_count().await, 0);
}

#[tokio::test]
async fn test_invalid_manifest_is_rejected_before_any_call() {
    let fixture = Fixture::new();
    let manifest = fixture.write_manifest(
        r"
extensions:
  broken:
    destination:
      - type: FTP
        url: ftp://example.com
    trigger: []
",
    );

    let error = plan(&fixture.reconciler, &fixture.policy, &manifest, &fixture.state())
        .await
        .unwrap_err();
    assert!(matches!(error, PlanError::Manifest(_)));
    assert_eq!(fixture.platform.calls().await, Default::default());
}

#[test]
fn test_saving_empty_state_bumps_serial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested.state.json");
    let mut state = StateStore::load(&path).unwrap();
    state.save().unwrap();

    assert!(path.exists());
    assert_eq!(StateStore::load(&path).unwrap().serial(), 1);
}
