//! Unit tests for the MetalLB identity validator

#[cfg(test)]
mod tests {
    use crate::reconciler::metallb::{
        IdentityState, REASON_DEPENDENCIES_NOT_READY, REASON_INCORRECT_NAME,
    };
    use kube_runtime::controller::Action;
    use crate::test_utils::*;
    use crds::*;
    use resource_store::{MockResourceStore, ObjectKey, ResourceStoreTrait};
    use std::sync::Arc;
    use std::time::Duration;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new(TEST_NAMESPACE, name)
    }

    fn state_of(store: &MockResourceStore, name: &str) -> IdentityState {
        IdentityState::from_conditions(store.metallb(TEST_NAMESPACE, name).unwrap().conditions())
    }

    #[tokio::test]
    async fn test_canonical_instance_becomes_available() {
        let (reconciler, store) = create_test_reconciler(MockResourceStore::new());
        store.add_metallb(create_test_metallb("metallb", TEST_NAMESPACE)).unwrap();

        let state = reconciler.reconcile_metallb(&key("metallb")).await.unwrap();
        assert_eq!(state, Some(IdentityState::Available));

        let stored = store.metallb(TEST_NAMESPACE, "metallb").unwrap();
        assert!(is_condition_true(stored.conditions(), CONDITION_AVAILABLE));
        assert!(is_condition_true(stored.conditions(), CONDITION_UPGRADEABLE));
        assert!(!is_condition_true(stored.conditions(), CONDITION_PROGRESSING));
        assert!(!is_condition_true(stored.conditions(), CONDITION_DEGRADED));
    }

    #[tokio::test]
    async fn test_incorrect_name_is_degraded() {
        let (reconciler, store) = create_test_reconciler(MockResourceStore::new());
        store.add_metallb(create_test_metallb("metallb-other", TEST_NAMESPACE)).unwrap();

        let state = reconciler.reconcile_metallb(&key("metallb-other")).await.unwrap();
        assert_eq!(state, Some(IdentityState::Degraded));

        let stored = store.metallb(TEST_NAMESPACE, "metallb-other").unwrap();
        let degraded = find_condition(stored.conditions(), CONDITION_DEGRADED).unwrap();
        assert_eq!(degraded.status, ConditionStatus::True);
        assert_eq!(degraded.reason, REASON_INCORRECT_NAME);
        assert!(!is_condition_true(stored.conditions(), CONDITION_AVAILABLE));
    }

    #[tokio::test]
    async fn test_degraded_is_terminal_without_side_effects() {
        let (reconciler, store) = create_test_reconciler(MockResourceStore::new());
        store.add_metallb(create_test_metallb("wrong", TEST_NAMESPACE)).unwrap();

        reconciler.reconcile_metallb(&key("wrong")).await.unwrap();
        let writes = store.status_writes();
        let version = store.metallb(TEST_NAMESPACE, "wrong").unwrap().metadata.resource_version;

        for _ in 0..3 {
            let state = reconciler.reconcile_metallb(&key("wrong")).await.unwrap();
            assert_eq!(state, Some(IdentityState::Degraded));
        }
        assert_eq!(store.status_writes(), writes);
        assert_eq!(store.metallb(TEST_NAMESPACE, "wrong").unwrap().metadata.resource_version, version);
    }

    #[tokio::test]
    async fn test_invalid_instance_does_not_affect_canonical_one() {
        let (reconciler, store) = create_test_reconciler(MockResourceStore::new());
        store.add_metallb(create_test_metallb("metallb", TEST_NAMESPACE)).unwrap();
        store.add_metallb(create_test_metallb("metallb-two", TEST_NAMESPACE)).unwrap();

        reconciler.reconcile_metallb(&key("metallb")).await.unwrap();
        reconciler.reconcile_metallb(&key("metallb-two")).await.unwrap();
        assert_eq!(state_of(&store, "metallb"), IdentityState::Available);
        assert_eq!(state_of(&store, "metallb-two"), IdentityState::Degraded);

        let before = store.metallb(TEST_NAMESPACE, "metallb").unwrap();
        store.delete_metallb(TEST_NAMESPACE, "metallb-two").await.unwrap();
        assert_eq!(reconciler.reconcile_metallb(&key("metallb-two")).await.unwrap(), None);
        reconciler.reconcile_metallb(&key("metallb")).await.unwrap();

        let after = store.metallb(TEST_NAMESPACE, "metallb").unwrap();
        assert_eq!(after.metadata.resource_version, before.metadata.resource_version);
        assert_eq!(state_of(&store, "metallb"), IdentityState::Available);
    }

    #[tokio::test]
    async fn test_deleted_instance_is_noop() {
        let (reconciler, store) = create_test_reconciler(MockResourceStore::new());
        assert_eq!(reconciler.reconcile_metallb(&key("metallb")).await.unwrap(), None);
        assert_eq!(store.status_writes(), 0);
    }

    #[tokio::test]
    async fn test_unready_dependencies_keep_instance_pending() {
        let (reconciler, store) = create_test_reconciler_with_probe(
            MockResourceStore::new(),
            Arc::new(NotReadyProbe("speaker DaemonSet not rolled out".to_string())),
        );
        store.add_metallb(create_test_metallb("metallb", TEST_NAMESPACE)).unwrap();

        let state = reconciler.reconcile_metallb(&key("metallb")).await.unwrap();
        assert_eq!(state, Some(IdentityState::Pending));

        let stored = store.metallb(TEST_NAMESPACE, "metallb").unwrap();
        let progressing = find_condition(stored.conditions(), CONDITION_PROGRESSING).unwrap();
        assert_eq!(progressing.status, ConditionStatus::True);
        assert_eq!(progressing.reason, REASON_DEPENDENCIES_NOT_READY);
        assert_eq!(progressing.message, "speaker DaemonSet not rolled out");

        let resync = Duration::from_secs(30);
        assert_eq!(IdentityState::Pending.action(resync), Action::requeue(resync));
        assert_eq!(IdentityState::Available.action(resync), Action::await_change());
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_fatal() {
        let (reconciler, store) = create_test_reconciler(MockResourceStore::new());
        store.set_metallb_kind_registered(false);

        let err = reconciler.reconcile_metallb(&key("metallb")).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_state_from_conditions() {
        assert_eq!(IdentityState::from_conditions(&[]), IdentityState::Pending);
        let degraded = crate::reconciler::metallb::degraded_conditions("x");
        assert_eq!(IdentityState::from_conditions(&degraded), IdentityState::Degraded);
        let available = crate::reconciler::metallb::available_conditions();
        assert_eq!(IdentityState::from_conditions(&available), IdentityState::Available);
    }
}
