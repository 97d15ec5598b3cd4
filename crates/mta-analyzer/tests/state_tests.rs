use mta_analyzer::run_state::{allowed_transitions, validate_transition, RunState};
use proptest::prelude::*;

fn any_state() -> impl Strategy<Value = RunState> {
    prop_oneof![
        Just(RunState::Idle),
        Just(RunState::Validating),
        Just(RunState::Starting),
        Just(RunState::Running),
        Just(RunState::Completing),
        Just(RunState::Cancelling),
        Just(RunState::Crashed),
    ]
}

#[test]
fn test_idle_only_validates() {
    assert!(validate_transition(RunState::Idle, RunState::Validating).is_ok());

    assert!(validate_transition(RunState::Idle, RunState::Running).is_err());
    assert!(validate_transition(RunState::Idle, RunState::Starting).is_err());
}

#[test]
fn test_running_ends_three_ways() {
    for to in [RunState::Completing, RunState::Cancelling, RunState::Crashed] {
        assert!(validate_transition(RunState::Running, to).is_ok());
    }
    assert!(validate_transition(RunState::Running, RunState::Idle).is_err());
}

#[test]
fn test_every_state_returns_to_idle() {
    // Bounded walk: every state reaches Idle in at most four steps
    for start in RunState::ALL {
        let mut frontier = vec![start];
        let mut reached = start == RunState::Idle;
        for _ in 0..4 {
            frontier = frontier.into_iter().flat_map(allowed_transitions).collect();
            reached |= frontier.contains(&RunState::Idle);
        }
        assert!(reached, "{start} never returns to idle");
    }
}

proptest! {
    #[test]
    fn prop_validation_matches_allowed(from in any_state(), to in any_state()) {
        let allowed = allowed_transitions(from);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
    }

    #[test]
    fn prop_terminal_states_only_go_idle(from in any_state(), to in any_state()) {
        if from.is_terminal() && validate_transition(from, to).is_ok() {
            prop_assert_eq!(to, RunState::Idle);
        }
    }

    #[test]
    fn prop_walks_hit_one_terminal_per_run(choices in proptest::collection::vec(0usize..8, 1..40)) {
        let mut state = RunState::Idle;
        let mut terminals_this_run = 0;
        for choice in choices {
            let next = allowed_transitions(state);
            state = next[choice % next.len()];
            if state.is_terminal() {
                terminals_this_run += 1;
            }
            if state == RunState::Idle {
                prop_assert!(terminals_this_run <= 1);
                terminals_this_run = 0;
            }
        }
    }
}
