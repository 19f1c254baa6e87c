mod common;

use claims_service::*;
use common::*;
use rust_decimal::Decimal;
use std::sync::Arc;

#[tokio::test]
async fn test_nhis_claim_needs_gdrg_before_approval() {
    let fx = Fixture::new();
    let records = vec![fx.record(fx.amoxicillin, "AMOX-500", "10", "2.00")];
    let claim = fx.engine.create_claim(fx.new_claim(&fx.nhis_plan, records), ACTOR).await.unwrap();
    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();

    let err = fx.engine.approve_claim(claim.id, ACTOR).await.unwrap_err();
    assert!(matches!(err, ClaimsError::Validation(ValidationError::MissingGdrg)));
    let unchanged = fx.engine.get_claim(claim.id).await.unwrap();
    assert_eq!(unchanged.status, ClaimStatus::PendingVetting);

    fx.engine.set_gdrg(claim.id, "OPDC06A").await.unwrap();
    let approved = fx.engine.approve_claim(claim.id, ACTOR).await.unwrap();
    assert_eq!(approved.status, ClaimStatus::Vetted);
    assert_eq!(approved.vetted_by.as_deref(), Some(ACTOR));
    assert_eq!(approved.totals.gdrg_amount, d("45.00"));
}

#[tokio::test]
async fn test_approval_requires_exactly_one_primary_diagnosis() {
    let fx = Fixture::new();
    let mut input = fx.new_claim(&fx.private_plan, vec![fx.procedure("1", "50.00")]);
    input.diagnoses = vec![NewDiagnosis::secondary("I10")];
    let claim = fx.engine.create_claim(input, ACTOR).await.unwrap();
    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();

    assert_eq!(
        fx.engine.approval_blockers(claim.id).await.unwrap(),
        vec![ValidationError::NoPrimaryDiagnosis]
    );
    assert!(matches!(
        fx.engine.approve_claim(claim.id, ACTOR).await,
        Err(ClaimsError::Validation(ValidationError::NoPrimaryDiagnosis))
    ));

    let diagnosis_id = claim.diagnoses[0].id;
    fx.engine.set_primary_diagnosis(claim.id, diagnosis_id).await.unwrap();
    assert!(fx.engine.approval_blockers(claim.id).await.unwrap().is_empty());
    fx.engine.approve_claim(claim.id, ACTOR).await.unwrap();
}

#[tokio::test]
async fn test_claim_without_diagnoses_is_blocked() {
    let fx = Fixture::new();
    let mut input = fx.new_claim(&fx.nhis_plan, vec![]);
    input.diagnoses.clear();
    let claim = fx.engine.create_claim(input, ACTOR).await.unwrap();

    let blockers = fx.engine.approval_blockers(claim.id).await.unwrap();
    assert_eq!(blockers, vec![ValidationError::MissingDiagnosis, ValidationError::MissingGdrg]);
}

#[tokio::test]
async fn test_uncovered_items_do_not_block_approval() {
    let fx = Fixture::new();
    // consumables have no rule and no default on the private plan
    let gauze = fx.record(
        insurance_service::ItemRef::new(insurance_service::ItemKind::Consumable, uuid::Uuid::new_v4()),
        "GAUZE",
        "2",
        "5.00",
    );
    let claim = fx.vetted_claim(vec![gauze]).await;
    assert_eq!(claim.status, ClaimStatus::Vetted);
    assert_eq!(claim.totals.uncovered_count, 1);
}

#[tokio::test]
async fn test_rejection_needs_reason_and_is_terminal() {
    let fx = Fixture::new();
    let claim = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![fx.procedure("1", "80.00")]), ACTOR)
        .await
        .unwrap();
    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();

    assert!(matches!(
        fx.engine.reject_claim(claim.id, "  ", ACTOR).await,
        Err(ClaimsError::Validation(ValidationError::MissingRejectionReason))
    ));
    let rejected = fx.engine.reject_claim(claim.id, "duplicate visit", ACTOR).await.unwrap();
    assert_eq!(rejected.status, ClaimStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("duplicate visit"));

    // no path out of rejected, and no edits
    assert!(matches!(
        fx.engine.submit_for_vetting(claim.id, ACTOR).await,
        Err(ClaimsError::ImmutableClaim { status: ClaimStatus::Rejected, .. })
    ));
    assert!(matches!(
        fx.engine.approve_claim(claim.id, ACTOR).await,
        Err(ClaimsError::ImmutableClaim { .. })
    ));
    assert!(matches!(
        fx.engine.add_item(claim.id, fx.procedure("1", "5.00")).await,
        Err(ClaimsError::ImmutableClaim { .. })
    ));
}

#[tokio::test]
async fn test_draft_cannot_skip_vetting() {
    let fx = Fixture::new();
    let claim = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![fx.procedure("1", "10.00")]), ACTOR)
        .await
        .unwrap();
    assert!(matches!(
        fx.engine.approve_claim(claim.id, ACTOR).await,
        Err(ClaimsError::InvalidClaimTransition { from: ClaimStatus::Draft, .. })
    ));
}

#[tokio::test]
async fn test_rejected_claim_can_be_cloned_into_new_draft() {
    let fx = Fixture::new();
    let record = fx.procedure("2", "40.00");
    let source = record.source;
    let claim = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![record]), ACTOR)
        .await
        .unwrap();
    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();
    fx.engine.reject_claim(claim.id, "wrong member", ACTOR).await.unwrap();

    let clone = fx.engine.clone_claim(claim.id, ACTOR).await.unwrap();
    assert_eq!(clone.status, ClaimStatus::Draft);
    assert_eq!(clone.cloned_from, Some(claim.id));
    assert_ne!(clone.claim_number, claim.claim_number);
    assert_eq!(clone.items.len(), 1);
    assert_eq!(clone.items[0].source, source);
    assert_eq!(clone.total_claim_amount(), d("80.00"));

    let original = fx.engine.get_claim(claim.id).await.unwrap();
    assert_eq!(original.status, ClaimStatus::Rejected);

    // clones are only made from rejected claims
    assert!(matches!(
        fx.engine.clone_claim(clone.id, ACTOR).await,
        Err(ClaimsError::Validation(ValidationError::CloneRequiresRejected))
    ));
}

#[tokio::test]
async fn test_same_source_record_on_two_claims_conflicts() {
    let fx = Fixture::new();
    let record = fx.procedure("1", "30.00");
    let first = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![record.clone()]), ACTOR)
        .await
        .unwrap();

    let err = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![record.clone()]), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimsError::ItemAlreadyClaimed { claim_id, .. } if claim_id == first.id));
    assert!(error_common::Categorized::is_retryable(&err));

    let other = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![fx.procedure("1", "1.00")]), ACTOR)
        .await
        .unwrap();
    assert!(matches!(
        fx.engine.add_item(other.id, record.clone()).await,
        Err(ClaimsError::ItemAlreadyClaimed { .. })
    ));

    // once the holder is rejected the record is free again
    fx.engine.submit_for_vetting(first.id, ACTOR).await.unwrap();
    fx.engine.reject_claim(first.id, "billed in error", ACTOR).await.unwrap();
    let reclaimed = fx.engine.add_item(other.id, record).await.unwrap();
    assert_eq!(reclaimed.items.len(), 2);
}

#[tokio::test]
async fn test_failed_creation_attaches_nothing() {
    let fx = Fixture::new();
    let taken = fx.procedure("1", "30.00");
    let fresh = fx.procedure("1", "20.00");
    fx.engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![taken.clone()]), ACTOR)
        .await
        .unwrap();

    assert!(fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![fresh.clone(), taken]), ACTOR)
        .await
        .is_err());
    // `fresh` was not left reserved by the failed attempt
    fx.engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![fresh]), ACTOR)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_claims_on_one_record_have_one_winner() {
    let fx = Fixture::new();
    let record = fx.procedure("1", "30.00");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&fx.engine);
        let input = fx.new_claim(&fx.private_plan, vec![record.clone()]);
        tasks.push(tokio::spawn(async move { engine.create_claim(input, ACTOR).await }));
    }

    let mut won = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => won += 1,
            Err(ClaimsError::ItemAlreadyClaimed { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_plan_must_be_in_effect_on_encounter_date() {
    let fx = Fixture::new();
    let mut input = fx.new_claim(&fx.private_plan, vec![]);
    input.encounter.service_date = chrono::NaiveDate::from_ymd_opt(2027, 2, 1).unwrap();
    assert!(matches!(
        fx.engine.create_claim(input, ACTOR).await,
        Err(ClaimsError::Validation(ValidationError::PlanNotEffective { .. }))
    ));
}

#[tokio::test]
async fn test_items_are_removed_only_before_vetting() {
    let fx = Fixture::new();
    let claim = fx.vetted_claim(vec![fx.procedure("1", "10.00"), fx.procedure("1", "15.00")]).await;
    let item_id = claim.items[0].id;

    assert!(matches!(
        fx.engine.remove_item(claim.id, item_id).await,
        Err(ClaimsError::ImmutableClaim { status: ClaimStatus::Vetted, .. })
    ));

    let draft = fx
        .engine
        .create_claim(fx.new_claim(&fx.private_plan, vec![fx.procedure("1", "10.00"), fx.procedure("1", "15.00")]), ACTOR)
        .await
        .unwrap();
    let trimmed = fx.engine.remove_item(draft.id, draft.items[1].id).await.unwrap();
    assert_eq!(trimmed.items.len(), 1);
    assert_eq!(trimmed.total_claim_amount(), d("10.00"));
}

#[tokio::test]
async fn test_every_claim_transition_is_recorded() {
    let fx = Fixture::new();
    let claim = fx.vetted_claim(vec![fx.procedure("1", "10.00")]).await;
    let history = fx.engine.claim_history(claim.id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|row| (row.previous_status, row.new_status)).collect();
    assert_eq!(
        statuses,
        vec![
            (None, ClaimStatus::Draft),
            (Some(ClaimStatus::Draft), ClaimStatus::PendingVetting),
            (Some(ClaimStatus::PendingVetting), ClaimStatus::Vetted),
        ]
    );
}

#[tokio::test]
async fn test_vetting_freezes_tariff_prices() {
    let fx = Fixture::new();
    let records = vec![fx.record(fx.amoxicillin, "AMOX-500", "10", "2.00")];
    let mut input = fx.new_claim(&fx.nhis_plan, records);
    input.gdrg_code = Some("OPDC06A".to_string());
    let claim = fx.engine.create_claim(input, ACTOR).await.unwrap();
    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();

    // still repriceable before approval
    fx.insurance.update_tariff_price(fx.amoxicillin_tariff.id, Decimal::new(130, 2)).unwrap();
    fx.engine.approve_claim(claim.id, ACTOR).await.unwrap();
    assert!(fx.insurance.update_tariff_price(fx.amoxicillin_tariff.id, Decimal::new(150, 2)).is_err());
}

#[tokio::test]
async fn test_diagnosis_and_gdrg_edits_before_vetting() {
    let fx = Fixture::new();
    let records = vec![fx.record(fx.amoxicillin, "AMOX-500", "10", "2.00")];
    let claim = fx.engine.create_claim(fx.new_claim(&fx.nhis_plan, records), ACTOR).await.unwrap();
    let primary_id = claim.diagnoses[0].id;

    let priced = fx.engine.set_gdrg(claim.id, "OPDC06A").await.unwrap();
    assert_eq!(priced.totals.grand_total, d("57.00"));
    let cleared = fx.engine.clear_gdrg(claim.id).await.unwrap();
    assert!(cleared.gdrg.is_none());
    assert_eq!(cleared.totals.grand_total, d("12.00"));

    fx.engine.add_diagnosis(claim.id, NewDiagnosis::secondary("r50.9")).await.unwrap();
    let trimmed = fx.engine.remove_diagnosis(claim.id, primary_id).await.unwrap();
    assert_eq!(trimmed.diagnoses.len(), 1);
    assert_eq!(trimmed.diagnoses[0].code, "R50.9");
    assert!(matches!(
        fx.engine.remove_diagnosis(claim.id, primary_id).await,
        Err(ClaimsError::DiagnosisNotFound { .. })
    ));

    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();
    assert_eq!(
        fx.engine.approval_blockers(claim.id).await.unwrap(),
        vec![ValidationError::NoPrimaryDiagnosis, ValidationError::MissingGdrg]
    );

    let pending = fx.engine.claims_with_status(ClaimStatus::PendingVetting).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, claim.id);
    assert!(fx.engine.claims_with_status(ClaimStatus::Draft).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_engines_sharing_storage_see_the_same_reservations() {
    let fx = Fixture::new();
    let claims = Arc::new(InMemoryClaimRepository::new());
    let batches = Arc::new(InMemoryBatchRepository::new());
    let bus = Arc::new(events_bus::EventBus::new());
    let make_engine = || {
        ClaimsEngine::new(config_engine::EngineSettings::default(), fx.insurance.clone())
            .with_claim_repository(claims.clone())
            .with_batch_repository(batches.clone())
            .with_event_bus(bus.clone())
    };
    let first = make_engine();
    let second = make_engine();

    let record = fx.procedure("1", "20.00");
    let claim = first
        .create_claim(fx.new_claim(&fx.private_plan, vec![record.clone()]), ACTOR)
        .await
        .unwrap();
    assert_eq!(second.get_claim(claim.id).await.unwrap().claim_number, claim.claim_number);
    assert_eq!(claims.source_holder(record.source).await.unwrap(), Some(claim.id));

    let err = second
        .create_claim(fx.new_claim(&fx.private_plan, vec![record]), ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimsError::ItemAlreadyClaimed { claim_id, .. } if claim_id == claim.id));
    assert!(Arc::ptr_eq(first.event_bus(), second.event_bus()));
}

#[tokio::test]
async fn test_vetted_claim_keeps_what_approval_checked() {
    let fx = Fixture::new();
    let records = vec![fx.record(fx.amoxicillin, "AMOX-500", "10", "2.00")];
    let mut input = fx.new_claim(&fx.nhis_plan, records);
    input.gdrg_code = Some("OPDC06A".to_string());
    let claim = fx.engine.create_claim(input, ACTOR).await.unwrap();
    fx.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();
    let vetted = fx.engine.approve_claim(claim.id, ACTOR).await.unwrap();
    let primary_id = vetted.diagnoses[0].id;

    assert!(matches!(
        fx.engine.clear_gdrg(claim.id).await,
        Err(ClaimsError::ImmutableClaim { status: ClaimStatus::Vetted, .. })
    ));
    assert!(matches!(
        fx.engine.remove_diagnosis(claim.id, primary_id).await,
        Err(ClaimsError::ImmutableClaim { status: ClaimStatus::Vetted, .. })
    ));
    assert!(matches!(
        fx.engine.add_diagnosis(claim.id, NewDiagnosis::primary("A09")).await,
        Err(ClaimsError::ImmutableClaim { status: ClaimStatus::Vetted, .. })
    ));

    // secondary detail may still be added
    let with_secondary = fx.engine.add_diagnosis(claim.id, NewDiagnosis::secondary("R50.9")).await.unwrap();
    let secondary_id = with_secondary.diagnoses[1].id;
    assert!(matches!(
        fx.engine.set_primary_diagnosis(claim.id, secondary_id).await,
        Err(ClaimsError::ImmutableClaim { status: ClaimStatus::Vetted, .. })
    ));

    let stored = fx.engine.get_claim(claim.id).await.unwrap();
    assert!(stored.gdrg.is_some());
    assert_eq!(stored.diagnoses.iter().filter(|diagnosis| diagnosis.is_primary).count(), 1);
    assert!(fx.engine.approval_blockers(claim.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_item_edits_keep_totals_consistent() {
    let fx = Fixture::new();
    let prices = ["10.00", "12.50", "7.25", "30.00", "4.40", "18.00"];
    let records: Vec<_> = prices.iter().map(|price| fx.procedure("1", price)).collect();
    let claim = fx.engine.create_claim(fx.new_claim(&fx.private_plan, records), ACTOR).await.unwrap();

    let mut tasks = Vec::new();
    for item in &claim.items[1..] {
        let engine = Arc::clone(&fx.engine);
        let (claim_id, item_id) = (claim.id, item.id);
        tasks.push(tokio::spawn(async move {
            for quantity in 2..=6 {
                let update = ItemUpdate { quantity: Some(Decimal::from(quantity)), ..ItemUpdate::default() };
                engine.update_item(claim_id, item_id, update).await.unwrap();
            }
        }));
    }
    // two writers on the first line; whichever lands last wins
    for quantity in [3, 7] {
        let engine = Arc::clone(&fx.engine);
        let (claim_id, item_id) = (claim.id, claim.items[0].id);
        tasks.push(tokio::spawn(async move {
            let update = ItemUpdate { quantity: Some(Decimal::from(quantity)), ..ItemUpdate::default() };
            engine.update_item(claim_id, item_id, update).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = fx.engine.get_claim(claim.id).await.unwrap();
    let first = &stored.items[0];
    assert!(first.quantity == Decimal::from(3) || first.quantity == Decimal::from(7));
    assert_eq!(first.subtotal, first.quantity * d("10.00"));
    for (item, price) in stored.items.iter().zip(prices).skip(1) {
        assert_eq!(item.quantity, Decimal::from(6));
        assert_eq!(item.subtotal, Decimal::from(6) * d(price));
    }

    let expected: Decimal = stored.items.iter().map(|item| item.subtotal).sum();
    assert_eq!(stored.totals.grand_total, expected);
    assert_eq!(stored.totals.procedures_total, expected);
    assert_eq!(stored.totals.insurance_covered_amount, expected);
}
