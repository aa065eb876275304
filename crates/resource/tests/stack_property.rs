//! Property tests for unwind ordering and release idempotence

use proptest::prelude::*;
use scopekit_resource::testing::{CallLog, MockBehavior, MockConfig, MockResource, ResourceCall};
use scopekit_resource::{Error, ErrorKind, Journal, Policy, ResourceStack};

fn arb_policy() -> impl Strategy<Value = Policy> {
    prop_oneof![
        Just(Policy::Suppress),
        Just(Policy::Propagate),
        any::<bool>().prop_map(|propagate| Policy::Transactional { propagate }),
    ]
}

/// One planned member: its policy and whether its release fails.
fn arb_members() -> impl Strategy<Value = Vec<(Policy, bool)>> {
    prop::collection::vec((arb_policy(), any::<bool>()), 1..8)
}

fn name(i: usize) -> String {
    format!("r{i}")
}

fn config(log: &CallLog, fail_release: bool) -> MockConfig {
    MockConfig::new(log.clone()).with_behavior(MockBehavior {
        fail_release,
        ..MockBehavior::default()
    })
}

proptest! {
    /// Members unwind in exact reverse order, once each, whatever the body did.
    #[test]
    fn unwind_is_reverse_and_exactly_once(
        members in arb_members(),
        body_fails in any::<bool>(),
    ) {
        let log = CallLog::new();
        let journal = Journal::new();

        let result = ResourceStack::run(&journal, |stack| {
            for (i, (policy, fail_release)) in members.iter().enumerate() {
                stack.acquire::<MockResource>(name(i), &config(&log, *fail_release), *policy)?;
            }
            if body_fails {
                return Err(Error::operation("body", "boom"));
            }
            Ok(())
        });

        let expected: Vec<String> = (0..members.len()).rev().map(name).collect();
        prop_assert_eq!(log.releases(), expected.clone());
        prop_assert_eq!(journal.released(), expected);

        let failing = members.iter().filter(|(_, f)| *f).count();
        match result {
            Ok(_) => prop_assert_eq!(failing, 0),
            Err(err) => prop_assert_eq!(err.cleanup_failures().len(), failing),
        }
    }

    /// A failed acquisition unwinds everything before it, in reverse, once.
    #[test]
    fn failed_acquisition_unwinds_prefix(
        members in arb_members(),
        fail_at in any::<prop::sample::Index>(),
    ) {
        let log = CallLog::new();
        let journal = Journal::new();
        let k = fail_at.index(members.len());

        let err = ResourceStack::run(&journal, |stack| {
            for (i, (policy, _)) in members.iter().enumerate() {
                let mut cfg = config(&log, false);
                if i == k {
                    cfg = cfg.with_behavior(MockBehavior {
                        fail_acquire: true,
                        ..MockBehavior::default()
                    });
                }
                stack.acquire::<MockResource>(name(i), &cfg, *policy)?;
            }
            Ok(())
        })
        .unwrap_err();

        prop_assert_eq!(err.kind(), ErrorKind::Acquisition);
        let failed = name(k);
        prop_assert_eq!(err.resource_id(), Some(failed.as_str()));
        let expected: Vec<String> = (0..k).rev().map(name).collect();
        prop_assert_eq!(log.releases(), expected);
        prop_assert_eq!(log.count(|c| matches!(c, ResourceCall::Commit(_))), 0);
    }

    /// Transactional members commit once on success and roll back once on
    /// failure, never both.
    #[test]
    fn transactional_members_commit_xor_rollback(
        count in 1usize..6,
        body_fails in any::<bool>(),
    ) {
        let log = CallLog::new();
        let journal = Journal::new();

        let _ = ResourceStack::run(&journal, |stack| {
            for i in 0..count {
                stack.acquire::<MockResource>(
                    name(i),
                    &config(&log, false),
                    Policy::Transactional { propagate: true },
                )?;
            }
            if body_fails {
                return Err(Error::operation("body", "boom"));
            }
            Ok(())
        });

        let commits = log.count(|c| matches!(c, ResourceCall::Commit(_)));
        let rollbacks = log.count(|c| matches!(c, ResourceCall::Rollback(_)));
        if body_fails {
            prop_assert_eq!((commits, rollbacks), (0, count));
        } else {
            prop_assert_eq!((commits, rollbacks), (count, 0));
        }
    }
}
