use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use runwarden::exec::OperationLatch;
use runwarden::types::TerminalState;

const OUTCOMES: [TerminalState; 4] = [
    TerminalState::TimedOut,
    TerminalState::Closed,
    TerminalState::Errored,
    TerminalState::Stopped,
];

#[test]
fn first_outcome_sticks() {
    let latch = OperationLatch::new();
    assert_eq!(latch.state(), None);
    assert!(!latch.is_settled());

    assert!(latch.try_settle(TerminalState::Closed));
    assert!(!latch.try_settle(TerminalState::Stopped));
    assert!(!latch.try_settle(TerminalState::Closed));

    assert!(latch.is_settled());
    assert_eq!(latch.state(), Some(TerminalState::Closed));
}

#[test]
fn racing_threads_produce_one_winner() {
    for _ in 0..200 {
        let latch = Arc::new(OperationLatch::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = OUTCOMES
            .iter()
            .copied()
            .map(|outcome| {
                let latch = Arc::clone(&latch);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if latch.try_settle(outcome) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("latch thread panicked");
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(OUTCOMES.contains(&latch.state().expect("settled")));
    }
}
