use super::*;
use nm_core::{ApplicationState, ContainerId, ContainerStatus, NodeEvent};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

fn app(id: u32) -> ApplicationId {
    ApplicationId::new(1700000000000, id)
}

fn container(app_id: u32, seq: u64) -> ContainerId {
    app(app_id).attempt(1).container(seq)
}

async fn next_effect(rx: &mut EffectReceiver) -> Effect {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for effect")
        .expect("effect channel closed")
}

/// Start `id` and bring it to Running with containers `seqs`
async fn running_app(
    dispatcher: &Dispatcher<Application>,
    rx: &mut EffectReceiver,
    id: u32,
    seqs: &[u64],
) {
    dispatcher.start_application(app(id), "alice").unwrap();
    dispatcher.dispatch(ApplicationEvent::initialized(app(id))).unwrap();
    for seq in seqs {
        dispatcher
            .dispatch(ApplicationEvent::container_launched(container(id, *seq)))
            .unwrap();
    }

    assert!(matches!(
        next_effect(rx).await,
        Effect::InitializeResources { .. }
    ));
    for seq in seqs {
        assert_eq!(
            next_effect(rx).await,
            Effect::LaunchContainer {
                container: container(id, *seq)
            }
        );
    }
}

#[tokio::test]
async fn three_container_application_finishes_once() {
    let (dispatcher, mut rx) = Dispatcher::channel();
    running_app(&dispatcher, &mut rx, 123, &[1, 2, 3]).await;

    dispatcher
        .dispatch(ApplicationEvent::container_finished(container(123, 1)))
        .unwrap();
    let snapshot = dispatcher.snapshot(&app(123)).await.unwrap();
    assert_eq!(snapshot.state, ApplicationState::Running);
    assert_eq!(
        snapshot.containers,
        BTreeMap::from([
            (container(123, 1), ContainerStatus::Finished),
            (container(123, 2), ContainerStatus::Running),
            (container(123, 3), ContainerStatus::Running),
        ])
    );

    for event in [
        ApplicationEvent::no_more_containers(app(123)),
        ApplicationEvent::container_finished(container(123, 2)),
        ApplicationEvent::container_finished(container(123, 3)),
    ] {
        dispatcher.dispatch(event).unwrap();
    }

    assert_eq!(
        next_effect(&mut rx).await,
        Effect::Emit(NodeEvent::ApplicationFinished {
            application: app(123)
        })
    );
    assert!(!dispatcher.is_registered(&app(123)));
    assert_eq!(
        dispatcher.dispatch(ApplicationEvent::container_finished(container(123, 3))),
        Err(DispatchError::UnknownTarget(app(123)))
    );

    dispatcher.shutdown().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unknown_container_is_absorbed() {
    let (dispatcher, mut rx) = Dispatcher::channel();
    running_app(&dispatcher, &mut rx, 123, &[1, 2, 3]).await;

    dispatcher
        .dispatch(ApplicationEvent::container_finished(container(123, 4)))
        .unwrap();

    let snapshot = dispatcher.snapshot(&app(123)).await.unwrap();
    assert_eq!(snapshot.state, ApplicationState::Running);
    assert_eq!(snapshot.duplicate_finishes, 1);
    assert!(snapshot
        .containers
        .values()
        .all(|s| *s == ContainerStatus::Running));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn failed_application_leaves_others_running() {
    let (dispatcher, mut rx) = Dispatcher::channel();
    running_app(&dispatcher, &mut rx, 1, &[1]).await;
    running_app(&dispatcher, &mut rx, 2, &[1, 2]).await;
    let before = dispatcher.snapshot(&app(2)).await.unwrap();

    // Relaunching a finished container is an inconsistency for app 1 only
    dispatcher
        .dispatch(ApplicationEvent::container_finished(container(1, 1)))
        .unwrap();
    dispatcher
        .dispatch(ApplicationEvent::container_launched(container(1, 1)))
        .unwrap();
    assert_eq!(
        next_effect(&mut rx).await,
        Effect::Emit(NodeEvent::ApplicationFailed {
            application: app(1),
            reason: format!("container {} relaunched after it finished", container(1, 1)),
        })
    );
    assert!(!dispatcher.is_registered(&app(1)));
    assert_eq!(
        dispatcher.dispatch(ApplicationEvent::no_more_containers(app(1))),
        Err(DispatchError::UnknownTarget(app(1)))
    );

    assert_eq!(dispatcher.snapshot(&app(2)).await.unwrap(), before);

    dispatcher
        .dispatch(ApplicationEvent::container_finished(container(2, 1)))
        .unwrap();
    let snapshot = dispatcher.snapshot(&app(2)).await.unwrap();
    assert_eq!(snapshot.state, ApplicationState::Running);
    assert_eq!(
        snapshot.containers,
        BTreeMap::from([
            (container(2, 1), ContainerStatus::Finished),
            (container(2, 2), ContainerStatus::Running),
        ])
    );

    dispatcher
        .dispatch(ApplicationEvent::no_more_containers(app(2)))
        .unwrap();
    dispatcher
        .dispatch(ApplicationEvent::container_finished(container(2, 2)))
        .unwrap();
    assert_eq!(
        next_effect(&mut rx).await,
        Effect::Emit(NodeEvent::ApplicationFinished {
            application: app(2)
        })
    );
    assert!(dispatcher.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn elapsed_ms_counts_wall_time() {
    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let elapsed = elapsed_ms(started);
    assert!((20..60_000).contains(&elapsed), "{}", elapsed);
}

#[tokio::test]
async fn unknown_target_does_not_disturb_other_keys() {
    let (dispatcher, mut rx) = Dispatcher::channel();

    assert_eq!(
        dispatcher.dispatch(ApplicationEvent::init(app(9), "mallory")),
        Err(DispatchError::UnknownTarget(app(9)))
    );

    running_app(&dispatcher, &mut rx, 1, &[1]).await;
    assert_eq!(
        dispatcher.dispatch(ApplicationEvent::container_finished(container(2, 1))),
        Err(DispatchError::UnknownTarget(app(2)))
    );
    dispatcher
        .dispatch(ApplicationEvent::finish_request(app(1)))
        .unwrap();

    assert_eq!(
        next_effect(&mut rx).await,
        Effect::KillContainer {
            container: container(1, 1)
        }
    );
}

#[tokio::test]
async fn register_twice_is_rejected() {
    let (dispatcher, _rx) = Dispatcher::channel();
    dispatcher.register(app(1), Application::new(app(1))).unwrap();

    assert_eq!(
        dispatcher.register(app(1), Application::new(app(1))),
        Err(DispatchError::AlreadyRegistered(app(1)))
    );
    assert_eq!(dispatcher.len(), 1);
}

#[tokio::test]
async fn snapshot_of_unknown_key_is_an_error() {
    let (dispatcher, _rx) = Dispatcher::<Application>::channel();
    assert_eq!(
        dispatcher.snapshot(&app(5)).await.unwrap_err(),
        DispatchError::UnknownTarget(app(5))
    );
}

#[tokio::test]
async fn events_behind_terminal_event_are_discarded() {
    let (dispatcher, mut rx) = Dispatcher::channel();
    running_app(&dispatcher, &mut rx, 1, &[]).await;

    // Queued behind the terminal event; must never run.
    dispatcher.dispatch(ApplicationEvent::fail(app(1), "boom")).unwrap();
    let _ = dispatcher.dispatch(ApplicationEvent::container_launched(container(1, 8)));
    let _ = dispatcher.dispatch(ApplicationEvent::finish_request(app(1)));

    assert!(matches!(
        next_effect(&mut rx).await,
        Effect::Emit(NodeEvent::ApplicationFailed { .. })
    ));
    dispatcher.shutdown().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn retired_key_can_be_registered_again() {
    let (dispatcher, mut rx) = Dispatcher::channel();
    running_app(&dispatcher, &mut rx, 1, &[]).await;
    dispatcher
        .dispatch(ApplicationEvent::no_more_containers(app(1)))
        .unwrap();
    assert!(matches!(
        next_effect(&mut rx).await,
        Effect::Emit(NodeEvent::ApplicationFinished { .. })
    ));

    dispatcher.start_application(app(1), "bob").unwrap();
    let snapshot = dispatcher.snapshot(&app(1)).await.unwrap();
    assert_eq!(snapshot.state, ApplicationState::Initializing);
    assert_eq!(snapshot.user, "bob");
}

#[tokio::test]
async fn shutdown_processes_queued_events() {
    let (dispatcher, mut rx) = Dispatcher::channel();
    for id in 1..=3 {
        dispatcher.start_application(app(id), "alice").unwrap();
        dispatcher.dispatch(ApplicationEvent::initialized(app(id))).unwrap();
        for seq in 1..=4 {
            dispatcher
                .dispatch(ApplicationEvent::container_launched(container(id, seq)))
                .unwrap();
        }
    }

    assert_eq!(dispatcher.shutdown().await, 3);
    assert!(dispatcher.is_empty());

    let mut launches: BTreeMap<ApplicationId, Vec<u64>> = BTreeMap::new();
    while let Ok(effect) = rx.try_recv() {
        if let Effect::LaunchContainer { container } = effect {
            launches
                .entry(container.application_id())
                .or_default()
                .push(container.sequence);
        }
    }
    for id in 1..=3 {
        assert_eq!(launches[&app(id)], vec![1, 2, 3, 4], "{}", app(id));
    }
}

#[tokio::test]
async fn clones_share_the_registration_table() {
    let (dispatcher, _rx) = Dispatcher::channel();
    let producer = dispatcher.clone();

    dispatcher.start_application(app(2), "alice").unwrap();
    dispatcher.start_application(app(1), "alice").unwrap();

    assert!(producer.is_registered(&app(1)));
    assert_eq!(producer.registered(), vec![app(1), app(2)]);
    producer
        .dispatch(ApplicationEvent::initialized(app(1)))
        .unwrap();
    let snapshot = dispatcher.snapshot(&app(1)).await.unwrap();
    assert_eq!(snapshot.state, ApplicationState::Running);
}

/// Per-application event scripts: launch 1..=5 then finish `finishes`
fn script(id: u32, finishes: &[u64]) -> Vec<ApplicationEvent> {
    let mut events = vec![ApplicationEvent::initialized(app(id))];
    events.extend((1..=5).map(|seq| ApplicationEvent::container_launched(container(id, seq))));
    events.extend(
        finishes
            .iter()
            .map(|seq| ApplicationEvent::container_finished(container(id, *seq))),
    );
    events
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn interleaving_across_applications_matches_isolated_delivery(
        finishes in proptest::collection::vec(proptest::collection::vec(1..=6u64, 0..8), 3),
        picks in proptest::collection::vec(0..3usize, 0..64),
    ) {
        let scripts: Vec<Vec<ApplicationEvent>> = finishes
            .iter()
            .enumerate()
            .map(|(i, f)| script(i as u32 + 1, f))
            .collect();

        // Expected: each script applied alone
        let expected: Vec<_> = scripts
            .iter()
            .enumerate()
            .map(|(i, events)| {
                let id = app(i as u32 + 1);
                let start = Application::new(id)
                    .transition(&ApplicationEvent::init(id, "alice"))
                    .0;
                events
                    .iter()
                    .fold(start, |a, e| a.transition(e).0)
                    .snapshot()
            })
            .collect();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let actual = runtime.block_on(async {
            let (dispatcher, _rx) = Dispatcher::channel();
            for i in 0..3u32 {
                dispatcher.start_application(app(i + 1), "alice").unwrap();
            }

            // Interleave: picks choose which script advances next, the rest drains in order.
            let mut cursors = [0usize; 3];
            let order = picks.iter().copied().chain((0..3).flat_map(|i| std::iter::repeat(i).take(16)));
            for i in order {
                if let Some(event) = scripts[i].get(cursors[i]) {
                    dispatcher.dispatch(event.clone()).unwrap();
                    cursors[i] += 1;
                }
            }

            let mut snapshots = Vec::new();
            for i in 0..3u32 {
                snapshots.push(dispatcher.snapshot(&app(i + 1)).await.unwrap());
            }
            dispatcher.shutdown().await;
            snapshots
        });

        prop_assert_eq!(actual, expected);
    }
}
