//! Concurrent edits from many sessions must match a sequential replay

use mta_config::{
    ClientSession, Configuration, ConfigurationStore, Intent, IntentEnvelope, MemoryPersister,
    OptionMap, OptionSchema, OptionValue, ServerMessage, SessionRegistry,
};
use mta_test_utils::drain;
use proptest::prelude::*;
use std::sync::Arc;

const SESSIONS: usize = 4;

#[derive(Debug, Clone)]
enum Edit {
    SetOutput(u8),
    ClearOutput,
    AddTarget(u8),
    ClearTargets,
    SourceMode(bool),
    Rename(Option<u8>),
}

impl Edit {
    fn intent(&self) -> Intent {
        match self {
            Self::SetOutput(n) => Intent::update("output", OptionValue::text(format!("/out/{n}"))),
            Self::ClearOutput => Intent::delete("output"),
            Self::AddTarget(n) => Intent::add("target", format!("target-{n}")),
            Self::ClearTargets => Intent::delete("target"),
            Self::SourceMode(on) => Intent::update("sourceMode", OptionValue::Flag(*on)),
            Self::Rename(Some(n)) => Intent::update("name", OptionValue::text(format!("run-{n}"))),
            Self::Rename(None) => Intent::delete("name"),
        }
    }
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0u8..4).prop_map(Edit::SetOutput),
        Just(Edit::ClearOutput),
        (0u8..4).prop_map(Edit::AddTarget),
        Just(Edit::ClearTargets),
        any::<bool>().prop_map(Edit::SourceMode),
        proptest::option::of(0u8..3).prop_map(Edit::Rename),
    ]
}

struct Run {
    config: Configuration,
    /// Intents in the order the manager applied them
    applied: Vec<(u64, Intent)>,
    /// Option maps an observing client received, in order
    broadcasts: Vec<OptionMap>,
}

async fn run_concurrently(plan: Vec<(usize, Edit)>) -> Run {
    let registry = SessionRegistry::in_memory();
    let manager = registry.create("prop");
    let (_observer, mut observer_rx) = ClientSession::connect(Arc::clone(&manager), None)
        .await
        .unwrap();

    let mut per_session: Vec<Vec<Intent>> = vec![Vec::new(); SESSIONS];
    for (session, edit) in plan {
        per_session[session].push(edit.intent());
    }

    let mut tasks = Vec::new();
    for intents in per_session {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            let (session, _rx) = ClientSession::connect(Arc::clone(&manager), None)
                .await
                .unwrap();
            let mut applied = Vec::new();
            for intent in intents {
                let outcome = manager
                    .handle(IntentEnvelope::from_session(session.id(), intent.clone()))
                    .await
                    .unwrap();
                applied.push((outcome.revision, intent));
            }
            applied
        }));
    }

    let mut applied = Vec::new();
    for task in tasks {
        applied.extend(task.await.unwrap());
    }
    applied.sort_by_key(|(revision, _)| *revision);

    let broadcasts = drain(&mut observer_rx)
        .into_iter()
        .filter_map(|message| match message {
            ServerMessage::UpdateOption { options, .. } => Some(options),
            _ => None,
        })
        .collect();

    Run {
        config: manager.configuration().await.unwrap(),
        applied,
        broadcasts,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_concurrent_edits_match_sequential_replay(
        plan in proptest::collection::vec((0usize..SESSIONS, edit()), 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        let total = plan.len() as u64;
        let run = runtime.block_on(run_concurrently(plan));

        // Every intent got its own slot in one total order
        let revisions: Vec<u64> = run.applied.iter().map(|(revision, _)| *revision).collect();
        prop_assert_eq!(revisions, (1..=total).collect::<Vec<_>>());

        let mut replay = ConfigurationStore::new(
            Configuration::with_id(run.config.id, "prop"),
            Arc::new(OptionSchema::analyzer_defaults()),
            Arc::new(MemoryPersister::new()),
        );
        let mut states = Vec::new();
        for (_, intent) in &run.applied {
            states.push(replay.apply(intent).unwrap());
        }

        prop_assert_eq!(&run.broadcasts, &states);
        prop_assert_eq!(replay.configuration().option_view(), run.config.option_view());
    }
}
