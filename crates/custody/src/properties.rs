use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use custodia_core::{DomainError, UserId};

use crate::commands::{
    AddUnits, Condition, DeleteResource, RemoveUnits, ReturnTarget, SetCondition, TransferCustody,
    UpdateResource,
};
use crate::event::CustodyEvent;
use crate::kind::{CustodyKind, ResourceKind};
use crate::ledger::{RecordWrite, ResourceLedger, ResourceWrite};
use crate::ops;
use crate::record::CustodyState;
use crate::resource::ResourceStatus;
use crate::testing::{Desk, LabelPatch, Shelf, at, commit, grant_cmd, ledger, return_cmd};

#[test]
fn grant_merge_and_full_return_restores_stock() {
    let holder = UserId::new();
    let l = ledger::<Shelf>(5);

    let change = ops::grant(&l, &grant_cmd(&l, holder, 3)).unwrap();
    let l = commit(l, &change);
    assert_eq!(l.resource.quantity(), 2);
    assert_eq!(l.active_for(holder).unwrap().quantity, 3);

    let change = ops::grant(&l, &grant_cmd(&l, holder, 1)).unwrap();
    assert!(matches!(change.event, CustodyEvent::CustodyMerged { held: 4, .. }));
    let l = commit(l, &change);
    assert_eq!(l.resource.quantity(), 1);
    assert_eq!(l.active.len(), 1);
    assert_eq!(l.active[0].quantity, 4);

    let change = ops::return_custody(&l, &return_cmd(&l, holder, Some(4))).unwrap();
    assert!(matches!(
        change.event,
        CustodyEvent::CustodyReturned {
            returned: 4,
            record_deleted: true,
            ..
        }
    ));
    let l = commit(l, &change);
    assert_eq!(l.resource.quantity(), 5);
    assert!(l.active.is_empty());
}

#[test]
fn oversized_grant_is_rejected_without_change() {
    let l = ledger::<Shelf>(2);
    let before = l.clone();

    let err = ops::grant(&l, &grant_cmd(&l, UserId::new(), 3)).unwrap_err();
    assert_eq!(
        err,
        DomainError::InsufficientStock {
            requested: 3,
            available: 2
        }
    );
    assert_eq!(l, before);
}

#[test]
fn single_holder_kind_attaches_and_detaches_holder() {
    let ana = UserId::new();
    let l = ledger::<Desk>(1);

    let l = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, ana, 1)).unwrap());
    assert_eq!(l.resource.holder(), Some(ana));
    assert_eq!(l.resource.status(), ResourceStatus::InUse);
    assert!(!l.resource.is_available());

    let err = ops::grant(&l, &grant_cmd(&l, UserId::new(), 1)).unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    let change = ops::return_custody(&l, &return_cmd(&l, ana, None)).unwrap();
    let closed = change.record.clone().unwrap();
    assert_eq!(closed.state, CustodyState::Returned);
    assert_eq!(closed.returned_at, Some(at()));
    assert!(matches!(change.records[0], RecordWrite::Update(_)));

    let l = commit(l, &change);
    assert_eq!(l.resource.holder(), None);
    assert_eq!(l.resource.status(), ResourceStatus::Available);
    assert!(l.resource.is_available());
}

#[test]
fn partial_return_appends_timestamped_note() {
    let ana = UserId::new();
    let l = ledger::<Shelf>(4);
    let l = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, ana, 3)).unwrap());

    let change = ops::return_custody(&l, &return_cmd(&l, ana, Some(1))).unwrap();
    let record = change.record.clone().unwrap();
    assert_eq!(record.quantity, 2);
    assert_eq!(record.state, CustodyState::Active);
    assert!(record.notes.contains("2024-03-04 09:00:00"));
    assert!(record.notes.contains("partial return of 1 unit"));

    let l = commit(l, &change);
    assert_eq!(l.resource.quantity(), 2);
}

#[test]
fn return_more_than_held_is_invalid() {
    let ana = UserId::new();
    let l = ledger::<Shelf>(4);
    let l = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, ana, 2)).unwrap());

    let err = ops::return_custody(&l, &return_cmd(&l, ana, Some(3))).unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let err = ops::return_custody(&l, &return_cmd(&l, UserId::new(), None)).unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}

#[test]
fn grant_rules_reject_bad_requests() {
    let l = ledger::<Shelf>(3);
    let holder = UserId::new();

    let mut cmd = grant_cmd(&l, holder, 1);
    cmd.kind = CustodyKind::Assignment;
    assert!(matches!(ops::grant(&l, &cmd), Err(DomainError::Validation(_))));

    let mut cmd = grant_cmd(&l, holder, 1);
    cmd.due_on = Some(at().date_naive() - Duration::days(1));
    assert!(matches!(ops::grant(&l, &cmd), Err(DomainError::Validation(_))));

    let mut cmd = grant_cmd(&l, holder, 1);
    cmd.due_on = NaiveDate::from_ymd_opt(2024, 3, 4);
    assert!(ops::grant(&l, &cmd).is_ok());
}

#[test]
fn damaged_resources_cannot_be_granted_and_condition_needs_empty_custody() {
    let l = ledger::<Desk>(2);
    let damage = SetCondition {
        resource_id: l.resource.resource_id(),
        condition: Condition::Damaged,
        actor: None,
        occurred_at: at(),
    };
    let damaged = commit(l.clone(), &ops::set_condition(&l, &damage).unwrap());
    assert_eq!(damaged.resource.status(), ResourceStatus::Damaged);
    assert!(matches!(
        ops::grant(&damaged, &grant_cmd(&damaged, UserId::new(), 1)),
        Err(DomainError::Validation(_))
    ));

    let held = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, UserId::new(), 1)).unwrap());
    assert!(matches!(
        ops::set_condition(&held, &damage),
        Err(DomainError::Conflict(_))
    ));

    let shelf = ledger::<Shelf>(1);
    let damage_shelf = SetCondition {
        resource_id: shelf.resource.resource_id(),
        ..damage
    };
    assert!(matches!(
        ops::set_condition(&shelf, &damage_shelf),
        Err(DomainError::Validation(_))
    ));
}

#[test]
fn transfer_moves_the_whole_record() {
    let ana = UserId::new();
    let luis = UserId::new();
    let l = ledger::<Desk>(2);
    let l = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, ana, 2)).unwrap());
    let source = l.active_for(ana).unwrap().id;

    let change = ops::transfer(
        &l,
        &TransferCustody {
            record_id: source,
            to_holder: luis,
            notes: Some("changed classroom".to_string()),
            actor: None,
            occurred_at: at(),
        },
    )
    .unwrap();
    let closed = match &change.records[0] {
        RecordWrite::Update(r) => r.clone(),
        other => panic!("unexpected write {other:?}"),
    };
    assert_eq!(closed.state, CustodyState::Transferred);

    let l = commit(l, &change);
    assert_eq!(l.resource.quantity(), 0);
    assert_eq!(l.resource.holder(), Some(luis));
    assert_eq!(l.active.len(), 1);
    assert_eq!(l.active_for(luis).unwrap().quantity, 2);
}

#[test]
fn stock_adjustment_clamps_and_rejects_zero() {
    let l = ledger::<Shelf>(3);
    let adjust = |delta| AddUnits {
        resource_id: l.resource.resource_id(),
        delta,
        actor: None,
        occurred_at: at(),
    };

    assert!(matches!(ops::add_units(&l, &adjust(0)), Err(DomainError::Validation(_))));

    let change = ops::add_units(&l, &adjust(-10)).unwrap();
    assert!(matches!(change.event, CustodyEvent::StockAdjusted { delta: -3, stock_after: 0, .. }));
    assert_eq!(commit(l.clone(), &change).resource.quantity(), 0);

    let change = ops::add_units(&l, &adjust(4)).unwrap();
    assert_eq!(commit(l.clone(), &change).resource.quantity(), 7);
}

#[test]
fn removal_is_guarded_by_active_custody() {
    let l = ledger::<Shelf>(3);
    let id = l.resource.resource_id();
    let remove = |units, force| RemoveUnits {
        resource_id: id,
        units,
        force,
        actor: None,
        occurred_at: at(),
    };

    assert!(matches!(ops::remove_units(&l, &remove(0, false)), Err(DomainError::Validation(_))));
    let partial = ops::remove_units(&l, &remove(2, false)).unwrap();
    assert_eq!(partial.resource_after().unwrap().quantity(), 1);

    let held = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, UserId::new(), 1)).unwrap());
    assert!(matches!(
        ops::remove_units(&held, &remove(2, false)),
        Err(DomainError::Conflict(_))
    ));
    let forced = ops::remove_units(&held, &remove(2, true)).unwrap();
    assert_eq!(forced.resource, ResourceWrite::Delete(id));
    assert!(matches!(
        forced.event,
        CustodyEvent::ResourceRemoved {
            units_in_custody: 1,
            forced: true,
            ..
        }
    ));

    let delete = DeleteResource {
        resource_id: id,
        force: false,
        actor: None,
        occurred_at: at(),
    };
    assert!(matches!(ops::delete(&held, &delete), Err(DomainError::Conflict(_))));
    assert!(ops::delete(&l, &delete).is_ok());
}

#[test]
fn update_renormalises_code_and_validates_details() {
    let l = ledger::<Shelf>(1);
    let change = ops::update(
        &l,
        UpdateResource {
            resource_id: l.resource.resource_id(),
            code: Some(" r-002 ".to_string()),
            patch: LabelPatch {
                name: Some("Microscope".to_string()),
            },
            actor: None,
            occurred_at: at(),
        },
    )
    .unwrap();
    let after = change.resource_after().unwrap();
    assert_eq!(after.code(), "R-002");
    assert_eq!(after.label(), "Microscope");

    let err = ops::update(
        &l,
        UpdateResource {
            resource_id: l.resource.resource_id(),
            code: None,
            patch: LabelPatch {
                name: Some(" ".to_string()),
            },
            actor: None,
            occurred_at: at(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[test]
fn return_by_record_id_targets_that_record() {
    let ana = UserId::new();
    let l = ledger::<Shelf>(2);
    let l = commit(l.clone(), &ops::grant(&l, &grant_cmd(&l, ana, 2)).unwrap());
    let id = l.active_for(ana).unwrap().id;

    let mut cmd = return_cmd(&l, ana, None);
    cmd.target = ReturnTarget::Record(id);
    let l = commit(l.clone(), &ops::return_custody(&l, &cmd).unwrap());
    assert_eq!(l.resource.quantity(), 2);
}

#[derive(Debug, Clone)]
enum Step {
    Grant { holder: usize, units: u32 },
    Return { holder: usize, units: Option<u32> },
    Transfer { from: usize, to: usize },
    Adjust { delta: i64 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..3, 1u32..6).prop_map(|(holder, units)| Step::Grant { holder, units }),
        (0usize..3, proptest::option::of(1u32..6))
            .prop_map(|(holder, units)| Step::Return { holder, units }),
        (0usize..3, 0usize..3).prop_map(|(from, to)| Step::Transfer { from, to }),
        (-4i64..5).prop_map(|delta| Step::Adjust { delta }),
    ]
}

/// Replays `steps`; rejected steps must leave the ledger untouched. Returns
/// the final ledger and the total the books say should exist.
fn replay<K: ResourceKind>(
    mut l: ResourceLedger<K>,
    holders: &[UserId],
    steps: &[Step],
) -> (ResourceLedger<K>, i64) {
    let mut expected_total = i64::from(l.resource.quantity());
    for s in steps {
        let result = match s {
            Step::Grant { holder, units } => ops::grant(&l, &grant_cmd(&l, holders[*holder], *units)),
            Step::Return { holder, units } => {
                ops::return_custody(&l, &return_cmd(&l, holders[*holder], *units))
            }
            Step::Transfer { from, to } => match l.active_for(holders[*from]) {
                Some(r) => ops::transfer(
                    &l,
                    &TransferCustody {
                        record_id: r.id,
                        to_holder: holders[*to],
                        notes: None,
                        actor: None,
                        occurred_at: at(),
                    },
                ),
                None => continue,
            },
            Step::Adjust { delta } => ops::add_units(
                &l,
                &AddUnits {
                    resource_id: l.resource.resource_id(),
                    delta: *delta,
                    actor: None,
                    occurred_at: at(),
                },
            ),
        };
        if let Ok(change) = result {
            if let CustodyEvent::StockAdjusted { delta, .. } = change.event {
                expected_total += delta;
            }
            l = l.apply(&change).expect("no step deletes the resource");
        }
    }
    (l, expected_total)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    #[test]
    fn units_are_conserved_for_shared_resources(
        initial in 0u32..10,
        steps in proptest::collection::vec(step(), 0..40),
    ) {
        let holders = [UserId::new(), UserId::new(), UserId::new()];
        let (l, expected) = replay(ledger::<Shelf>(initial), &holders, &steps);

        prop_assert!(l.check_invariants().is_ok());
        prop_assert_eq!(i64::from(l.resource.quantity()) + i64::from(l.units_in_custody()), expected);
        prop_assert!(expected >= 0);
    }

    #[test]
    fn units_are_conserved_for_single_holder_resources(
        initial in 0u32..10,
        steps in proptest::collection::vec(step(), 0..40),
    ) {
        let holders = [UserId::new(), UserId::new(), UserId::new()];
        let (l, expected) = replay(ledger::<Desk>(initial), &holders, &steps);

        prop_assert!(l.check_invariants().is_ok());
        prop_assert!(l.active.len() <= 1);
        prop_assert_eq!(i64::from(l.resource.quantity()) + i64::from(l.units_in_custody()), expected);
    }

    #[test]
    fn repeated_grants_consolidate(
        grants in proptest::collection::vec(1u32..4, 1..8),
    ) {
        let total: u32 = grants.iter().sum();
        let holder = UserId::new();
        let mut l = ledger::<Shelf>(total);
        for units in &grants {
            let change = ops::grant(&l, &grant_cmd(&l, holder, *units)).unwrap();
            l = l.apply(&change).unwrap();
        }
        prop_assert_eq!(l.active.len(), 1);
        prop_assert_eq!(l.active[0].quantity, total);
        prop_assert_eq!(l.resource.quantity(), 0);
    }

    #[test]
    fn grant_then_return_round_trips(initial in 1u32..20, pick in 1u32..20) {
        let k = pick.min(initial);
        let holder = UserId::new();
        let start = ledger::<Desk>(initial);

        let l = start.clone().apply(&ops::grant(&start, &grant_cmd(&start, holder, k)).unwrap()).unwrap();
        let l = l.clone().apply(&ops::return_custody(&l, &return_cmd(&l, holder, Some(k))).unwrap()).unwrap();

        prop_assert_eq!(l.resource.quantity(), initial);
        prop_assert!(l.active.is_empty());
        prop_assert_eq!(l.resource.status(), start.resource.status());
        prop_assert_eq!(l.resource.holder(), None);
    }

    #[test]
    fn returns_are_bounded_by_holding(held in 1u32..10, extra in 1u32..5) {
        let holder = UserId::new();
        let l = ledger::<Shelf>(held);
        let l = l.clone().apply(&ops::grant(&l, &grant_cmd(&l, holder, held)).unwrap()).unwrap();

        let cmd = return_cmd(&l, holder, Some(held + extra));
        prop_assert!(matches!(ops::return_custody(&l, &cmd), Err(DomainError::Validation(_))));
        prop_assert_eq!(l.active[0].quantity, held);
    }
}
