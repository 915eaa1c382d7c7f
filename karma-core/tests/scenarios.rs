//! End-to-end ledger scenarios driven through `KarmaLedger::apply`.

use chrono::{Duration, TimeZone, Utc};
use karma_core::{
    Address, AgentMetadata, DomainEvent, EngineConfig, Envelope, GovernanceUpdate, KarmaLedger,
    KarmaParameter, KarmaReason, Outcome, ProposalAction, ProposalDraft, ProposalStatus,
    RatingSubmission, Receipt, Request, TallyOutcome, Timestamp, VoteOption, VotingPowerCurve,
};

fn t(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn ledger() -> KarmaLedger {
    KarmaLedger::new(EngineConfig::default()).unwrap()
}

fn register(ledger: &mut KarmaLedger, name: &str, at: Timestamp) -> Receipt {
    ledger
        .apply(Envelope::new(
            name,
            at,
            Request::Register {
                address: Address::new(name),
                metadata: AgentMetadata::new(name, "test agent", "MCP"),
            },
        ))
        .unwrap()
}

fn log(ledger: &mut KarmaLedger, caller: &str, with: &[&str], at: Timestamp) -> Receipt {
    let mut participants = vec![Address::new(caller)];
    participants.extend(with.iter().map(|n| Address::new(*n)));
    ledger
        .apply(Envelope::new(
            caller,
            at,
            Request::LogInteraction {
                participants,
                interaction_type: "collaboration".into(),
                metadata: Default::default(),
            },
        ))
        .unwrap()
}

fn interaction_id(receipt: &Receipt) -> String {
    match &receipt.outcome {
        Outcome::InteractionLogged(outcome) => outcome.id.clone(),
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn rate(
    ledger: &mut KarmaLedger,
    rater: &str,
    rated: &str,
    score: i64,
    interaction: &str,
    at: Timestamp,
) -> karma_core::Result<Receipt> {
    ledger.apply(Envelope::new(
        rater,
        at,
        Request::SubmitRating(RatingSubmission::new(rated, score, interaction)),
    ))
}

fn propose(ledger: &mut KarmaLedger, proposer: &str, action: ProposalAction, at: Timestamp) -> u64 {
    let receipt = ledger
        .apply(Envelope::new(
            proposer,
            at,
            Request::CreateProposal(ProposalDraft::new("Proposal", "Details", action)),
        ))
        .unwrap();
    match receipt.outcome {
        Outcome::ProposalCreated { proposal_id } => proposal_id,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn vote(
    ledger: &mut KarmaLedger,
    voter: &str,
    proposal_id: u64,
    option: VoteOption,
    at: Timestamp,
) -> karma_core::Result<Receipt> {
    ledger.apply(Envelope::new(
        voter,
        at,
        Request::Vote {
            proposal_id,
            option,
        },
    ))
}

/// Twenty agents at base karma 50: total karma 1000.
fn council() -> (KarmaLedger, Vec<String>) {
    council_with(EngineConfig::default())
}

fn council_with(config: EngineConfig) -> (KarmaLedger, Vec<String>) {
    let mut ledger = KarmaLedger::new(config).unwrap();
    let names: Vec<String> = (0..20).map(|i| format!("agent-{i:02}")).collect();
    for name in &names {
        register(&mut ledger, name, t(0));
    }
    assert_eq!(ledger.quorum_base(t(0)), 1000.0);
    (ledger, names)
}

#[test]
fn test_rating_scenario_and_duplicate() {
    let mut ledger = ledger();
    register(&mut ledger, "A", t(0));
    register(&mut ledger, "B", t(1));
    assert_eq!(ledger.karma_at(&Address::new("A"), t(1)).unwrap(), 50.0);

    let logged = log(&mut ledger, "A", &["B"], t(10));
    let i1 = interaction_id(&logged);
    let before = ledger.karma_at(&Address::new("B"), t(20)).unwrap();

    let receipt = rate(&mut ledger, "A", "B", 8, &i1, t(20)).unwrap();
    let Outcome::RatingSubmitted { karma, .. } = &receipt.outcome else {
        panic!("unexpected outcome {:?}", receipt.outcome);
    };
    assert!(karma.delta > 0.0);
    assert!(karma.score > before);
    assert!(matches!(receipt.events[0], DomainEvent::RatingSubmitted { score: 8, .. }));
    assert!(matches!(
        receipt.events[1],
        DomainEvent::KarmaUpdated {
            reason: KarmaReason::RatingReceived,
            ..
        }
    ));

    let stats = ledger.rating_stats(&Address::new("B")).unwrap();
    assert_eq!(stats.average_score, 8.0);
    assert_eq!(stats.total_ratings, 1);

    let sequence = ledger.sequence();
    let err = rate(&mut ledger, "A", "B", 8, &i1, t(30)).unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_RATING");
    assert_eq!(ledger.sequence(), sequence);
    assert_eq!(ledger.rating_stats(&Address::new("B")).unwrap().total_ratings, 1);
}

#[test]
fn test_interaction_logging_is_idempotent_within_bucket() {
    let mut ledger = ledger();
    register(&mut ledger, "A", t(0));
    register(&mut ledger, "B", t(0));

    let first = log(&mut ledger, "A", &["B"], t(0));
    let sequence = ledger.sequence();
    let retry = log(&mut ledger, "A", &["B"], t(120));

    assert_eq!(interaction_id(&first), interaction_id(&retry));
    assert!(first.committed());
    assert!(!retry.committed());
    assert_eq!(ledger.sequence(), sequence);
    assert_eq!(ledger.interaction_count(&Address::new("A")), 1);
    assert!(ledger.verify_interaction(&interaction_id(&first)).unwrap());

    let next_bucket = log(&mut ledger, "A", &["B"], t(300));
    assert_ne!(interaction_id(&first), interaction_id(&next_bucket));
}

#[test]
fn test_interaction_bonus_applies_to_every_participant() {
    let mut ledger = ledger();
    for name in ["A", "B", "C"] {
        register(&mut ledger, name, t(0));
    }
    let receipt = log(&mut ledger, "A", &["B", "C"], t(5));
    let updates = receipt
        .events
        .iter()
        .filter(|e| matches!(e, DomainEvent::KarmaUpdated { .. }))
        .count();
    assert_eq!(updates, 3);
    assert_eq!(ledger.karma_at(&Address::new("C"), t(5)).unwrap(), 51.0);
}

#[test]
fn test_karma_never_increases_without_new_ratings() {
    let mut ledger = ledger();
    for name in ["A", "B", "C"] {
        register(&mut ledger, name, t(0));
    }
    let i1 = interaction_id(&log(&mut ledger, "A", &["B", "C"], t(10)));
    rate(&mut ledger, "A", "B", 10, &i1, t(20)).unwrap();
    rate(&mut ledger, "C", "B", 2, &i1, t(30)).unwrap();

    let b = Address::new("B");
    let mut last = ledger.karma_at(&b, t(30)).unwrap();
    for day in 1..=90 {
        let now = t(30) + Duration::days(day);
        let karma = ledger.karma_at(&b, now).unwrap();
        assert!(karma <= last, "karma rose on day {day}: {last} -> {karma}");
        last = karma;
    }

    let receipt = ledger
        .apply(Envelope::new(
            "anyone",
            t(30) + Duration::days(90),
            Request::RecalculateKarma { agent: b.clone() },
        ))
        .unwrap();
    let Outcome::KarmaRecalculated(update) = receipt.outcome else {
        panic!("unexpected outcome");
    };
    assert!(update.delta <= 0.0);
    assert_eq!(
        ledger.karma_history(&b).unwrap().last().map(|s| s.reason),
        Some(KarmaReason::Recalculated)
    );
}

#[test]
fn test_leaderboard_is_deterministic() {
    let mut ledger = ledger();
    for (i, name) in ["D", "C", "B", "A"].iter().enumerate() {
        register(&mut ledger, name, t(i as i64));
    }
    let i1 = interaction_id(&log(&mut ledger, "A", &["B"], t(10)));
    rate(&mut ledger, "A", "B", 9, &i1, t(11)).unwrap();

    let first = ledger.leaderboard(t(20), None);
    let second = ledger.leaderboard(t(20), None);
    assert_eq!(first, second);

    let order: Vec<_> = first.iter().map(|e| e.address.as_str().to_string()).collect();
    // B rated up, A has the interaction bonus, D and C tie and keep registration order
    assert_eq!(order, ["B", "A", "D", "C"]);
    assert_eq!(ledger.leaderboard(t(20), Some(2)).len(), 2);
}

#[test]
fn test_below_quorum_proposal_rejected() {
    let (mut ledger, names) = council();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        },
        t(10),
    );
    assert_eq!(ledger.proposal(id).unwrap().quorum_base, 1000.0);

    vote(&mut ledger, &names[1], id, VoteOption::Yes, t(20)).unwrap();
    vote(&mut ledger, &names[2], id, VoteOption::Yes, t(21)).unwrap();
    vote(&mut ledger, &names[3], id, VoteOption::No, t(22)).unwrap();

    let proposal = ledger.proposal(id).unwrap();
    assert_eq!(proposal.status, ProposalStatus::Active);
    assert_eq!(proposal.tally.yes, 100.0);
    assert_eq!(proposal.tally.no, 50.0);

    let end = proposal.voting_end;
    let receipt = ledger
        .apply(Envelope::new(&*names[0], end, Request::FinalizeProposal { proposal_id: id }))
        .unwrap();
    assert_eq!(
        receipt.outcome,
        Outcome::ProposalFinalized {
            status: ProposalStatus::Rejected,
            outcome: TallyOutcome::QuorumNotMet,
        }
    );

    let err = ledger
        .apply(Envelope::new(&*names[0], end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap_err();
    assert_eq!(err.code(), "QUORUM_NOT_MET");
}

#[test]
fn test_unanimous_but_below_quorum_is_rejected() {
    let (mut ledger, names) = council();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::SystemUpgrade {
            version: "2.0.0".into(),
            code_hash: "0f".repeat(32),
        },
        t(10),
    );
    for voter in &names[..3] {
        vote(&mut ledger, voter, id, VoteOption::Yes, t(20)).unwrap();
    }
    let end = ledger.proposal(id).unwrap().voting_end;
    ledger
        .apply(Envelope::new("cranker", end, Request::AdvanceProposals))
        .unwrap();
    let proposal = ledger.proposal(id).unwrap();
    assert_eq!(proposal.status, ProposalStatus::Rejected);
    assert_eq!(proposal.outcome, Some(TallyOutcome::QuorumNotMet));
}

#[test]
fn test_vote_replacement_keeps_only_second_vote() {
    let (mut ledger, names) = council();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        },
        t(10),
    );

    vote(&mut ledger, &names[1], id, VoteOption::Yes, t(20)).unwrap();
    let receipt = vote(&mut ledger, &names[1], id, VoteOption::NoWithVeto, t(21)).unwrap();
    assert_eq!(
        receipt.outcome,
        Outcome::VoteCast {
            weight: 50.0,
            replaced: true
        }
    );

    let tally = ledger.proposal(id).unwrap().tally;
    assert_eq!(tally.yes, 0.0);
    assert_eq!(tally.no_with_veto, 50.0);
    assert_eq!(tally.total_cast(), 50.0);
    assert_eq!(ledger.votes(id).len(), 1);
}

#[test]
fn test_passed_parameter_change_is_executed() {
    let (mut ledger, names) = council();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::BaseScore(60.0)],
        },
        t(10),
    );
    for voter in &names[..5] {
        vote(&mut ledger, voter, id, VoteOption::Yes, t(20)).unwrap();
    }

    // Execution requires an explicit finalize first
    let end = ledger.proposal(id).unwrap().voting_end;
    let err = ledger
        .apply(Envelope::new("x", end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap_err();
    assert_eq!(err.code(), "PROPOSAL_NOT_PASSED");

    ledger
        .apply(Envelope::new("x", end, Request::FinalizeProposal { proposal_id: id }))
        .unwrap();
    let receipt = ledger
        .apply(Envelope::new("x", end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap();
    assert_eq!(receipt.outcome, Outcome::ProposalExecuted { proposal_id: id });
    let karma_updates = receipt
        .events
        .iter()
        .filter(|e| {
            matches!(
                e,
                DomainEvent::KarmaUpdated {
                    reason: KarmaReason::ParametersChanged,
                    ..
                }
            )
        })
        .count();
    assert_eq!(karma_updates, names.len());
    assert_eq!(ledger.config().karma.base_score, 60.0);
    assert_eq!(ledger.karma_at(&Address::new(&*names[7]), end).unwrap(), 60.0);

    let err = ledger
        .apply(Envelope::new("x", end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap_err();
    assert_eq!(err.code(), "ALREADY_EXECUTED");
}

#[test]
fn test_executed_suspension_bars_participation() {
    let (mut ledger, names) = council();
    let target = names[19].clone();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::AgentSuspension {
            agent: Address::new(&*target),
            reason: "sybil ring".into(),
        },
        t(10),
    );
    for voter in &names[..6] {
        vote(&mut ledger, voter, id, VoteOption::Yes, t(20)).unwrap();
    }
    let end = ledger.proposal(id).unwrap().voting_end;
    ledger
        .apply(Envelope::new("x", end, Request::FinalizeProposal { proposal_id: id }))
        .unwrap();
    let receipt = ledger
        .apply(Envelope::new("x", end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap();
    assert!(receipt
        .events
        .iter()
        .any(|e| matches!(e, DomainEvent::AgentSuspended { proposal_id, .. } if *proposal_id == id)));

    assert!(!ledger.agent(&Address::new(&*target)).unwrap().status.is_active());
    assert_eq!(ledger.quorum_base(end), 950.0);

    let err = ledger
        .apply(Envelope::new(
            &*target,
            end,
            Request::LogInteraction {
                participants: vec![Address::new(&*target), Address::new(&*names[0])],
                interaction_type: "task".into(),
                metadata: Default::default(),
            },
        ))
        .unwrap_err();
    assert_eq!(err.code(), "AGENT_SUSPENDED");
}

#[test]
fn test_system_upgrade_records_protocol_version() {
    let (mut ledger, names) = council();
    let code_hash = "ab".repeat(32);
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::SystemUpgrade {
            version: "1.1.0".into(),
            code_hash: code_hash.clone(),
        },
        t(10),
    );
    for voter in &names[..5] {
        vote(&mut ledger, voter, id, VoteOption::Yes, t(20)).unwrap();
    }
    let end = ledger.proposal(id).unwrap().voting_end;
    ledger
        .apply(Envelope::new("x", end, Request::AdvanceProposals))
        .unwrap();
    ledger
        .apply(Envelope::new("x", end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap();

    let protocol = ledger.protocol_version().unwrap();
    assert_eq!(protocol.version, "1.1.0");
    assert_eq!(protocol.code_hash, code_hash);
    assert_eq!(protocol.proposal_id, id);
}

#[test]
fn test_curve_change_does_not_strand_open_proposals() {
    let (mut ledger, names) = council();
    let switch = propose(
        &mut ledger,
        &names[0],
        ProposalAction::GovernanceUpdate(GovernanceUpdate {
            voting_power: Some(VotingPowerCurve::SquareRoot),
            ..Default::default()
        }),
        t(10),
    );
    for voter in &names[..5] {
        vote(&mut ledger, voter, switch, VoteOption::Yes, t(20)).unwrap();
    }

    // Opened under the linear curve, still voting when the switch lands
    let open = propose(
        &mut ledger,
        &names[1],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        },
        t(10) + Duration::days(2),
    );
    assert_eq!(ledger.proposal(open).unwrap().voting_power, VotingPowerCurve::Linear);

    let switch_end = ledger.proposal(switch).unwrap().voting_end;
    ledger
        .apply(Envelope::new("x", switch_end, Request::FinalizeProposal { proposal_id: switch }))
        .unwrap();
    let receipt = ledger
        .apply(Envelope::new("x", switch_end, Request::ExecuteProposal { proposal_id: switch }))
        .unwrap();
    assert_eq!(receipt.outcome, Outcome::ProposalExecuted { proposal_id: switch });
    assert_eq!(ledger.config().governance.voting_power, VotingPowerCurve::SquareRoot);

    for voter in &names {
        let receipt = vote(&mut ledger, voter, open, VoteOption::Yes, switch_end).unwrap();
        assert!(matches!(receipt.outcome, Outcome::VoteCast { weight, .. } if weight == 50.0));
    }
    let proposal = ledger.proposal(open).unwrap();
    assert_eq!(proposal.tally.yes, proposal.quorum_base);

    let end = proposal.voting_end;
    let receipt = ledger
        .apply(Envelope::new("x", end, Request::FinalizeProposal { proposal_id: open }))
        .unwrap();
    assert_eq!(
        receipt.outcome,
        Outcome::ProposalFinalized {
            status: ProposalStatus::Passed,
            outcome: TallyOutcome::Passed,
        }
    );

    // New proposals pick up the new curve
    let later = propose(
        &mut ledger,
        &names[2],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(3.0)],
        },
        end,
    );
    let later = ledger.proposal(later).unwrap();
    assert_eq!(later.voting_power, VotingPowerCurve::SquareRoot);
    assert!((later.quorum_base - 20.0 * 50f64.sqrt()).abs() < 1e-9);
}

#[test]
fn test_vetoed_proposal_cannot_execute() {
    let (mut ledger, names) = council();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        },
        t(10),
    );
    for voter in &names[..3] {
        vote(&mut ledger, voter, id, VoteOption::Yes, t(20)).unwrap();
    }
    for voter in &names[3..5] {
        vote(&mut ledger, voter, id, VoteOption::NoWithVeto, t(20)).unwrap();
    }

    let end = ledger.proposal(id).unwrap().voting_end;
    let receipt = ledger
        .apply(Envelope::new("x", end, Request::FinalizeProposal { proposal_id: id }))
        .unwrap();
    assert_eq!(
        receipt.outcome,
        Outcome::ProposalFinalized {
            status: ProposalStatus::Rejected,
            outcome: TallyOutcome::Vetoed,
        }
    );

    let err = ledger
        .apply(Envelope::new("x", end, Request::ExecuteProposal { proposal_id: id }))
        .unwrap_err();
    assert_eq!(err.code(), "PROPOSAL_NOT_PASSED");
}

#[test]
fn test_cancelled_proposal_is_closed() {
    let (mut ledger, names) = council();
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        },
        t(10),
    );
    vote(&mut ledger, &names[1], id, VoteOption::Yes, t(20)).unwrap();

    let err = ledger
        .apply(Envelope::new(&*names[1], t(30), Request::CancelProposal { proposal_id: id }))
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    let receipt = ledger
        .apply(Envelope::new(&*names[0], t(30), Request::CancelProposal { proposal_id: id }))
        .unwrap();
    assert_eq!(receipt.outcome, Outcome::ProposalCancelled { proposal_id: id });
    assert_eq!(receipt.events, vec![DomainEvent::ProposalCancelled { proposal_id: id }]);

    let proposal = ledger.proposal(id).unwrap();
    assert_eq!(proposal.status, ProposalStatus::Rejected);
    assert_eq!(proposal.outcome, Some(TallyOutcome::Cancelled));

    let err = vote(&mut ledger, &names[2], id, VoteOption::Yes, t(40)).unwrap_err();
    assert_eq!(err.code(), "VOTING_CLOSED");
    let err = ledger
        .apply(Envelope::new(&*names[0], t(40), Request::ExecuteProposal { proposal_id: id }))
        .unwrap_err();
    assert_eq!(err.code(), "PROPOSAL_NOT_PASSED");
}

#[test]
fn test_voting_gates_through_apply() {
    let mut config = EngineConfig::default();
    config.governance.voting_delay_secs = 3600;
    config.governance.min_karma_for_voting = 60.0;
    let (mut ledger, names) = council_with(config);
    let id = propose(
        &mut ledger,
        &names[0],
        ProposalAction::ParameterChange {
            changes: vec![KarmaParameter::InteractionBonus(2.0)],
        },
        t(10),
    );
    let sequence = ledger.sequence();

    let err = vote(&mut ledger, &names[1], id, VoteOption::Yes, t(20)).unwrap_err();
    assert_eq!(err.code(), "VOTING_NOT_STARTED");

    let err = vote(&mut ledger, &names[1], id, VoteOption::Yes, t(10 + 3600)).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_KARMA");
    assert_eq!(ledger.proposal(id).unwrap().status, ProposalStatus::Pending);
    assert_eq!(ledger.sequence(), sequence);

    let mut config = EngineConfig::default();
    config.governance.min_karma_for_proposal = 60.0;
    let (mut ledger, names) = council_with(config);
    let err = ledger
        .apply(Envelope::new(
            &*names[0],
            t(10),
            Request::CreateProposal(ProposalDraft::new(
                "Proposal",
                "Details",
                ProposalAction::ParameterChange {
                    changes: vec![KarmaParameter::InteractionBonus(2.0)],
                },
            )),
        ))
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_KARMA");
    assert!(ledger.proposals().is_empty());
}

#[test]
fn test_rating_rate_limit_through_apply() {
    let mut config = EngineConfig::default();
    config.ratings.max_ratings_per_window = Some(1);
    let mut ledger = KarmaLedger::new(config).unwrap();
    for name in ["A", "B", "C"] {
        register(&mut ledger, name, t(0));
    }
    let i1 = interaction_id(&log(&mut ledger, "A", &["B", "C"], t(10)));

    rate(&mut ledger, "A", "B", 8, &i1, t(20)).unwrap();
    let err = rate(&mut ledger, "A", "C", 8, &i1, t(30)).unwrap_err();
    assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
    assert_eq!(ledger.ratings_by(&Address::new("A")).len(), 1);

    rate(&mut ledger, "A", "C", 8, &i1, t(20 + 3600)).unwrap();
}

#[test]
fn test_rejected_writes_leave_state_unchanged() {
    let mut ledger = ledger();
    register(&mut ledger, "A", t(0));
    register(&mut ledger, "B", t(0));
    let sequence = ledger.sequence();

    let err = ledger
        .apply(Envelope::new(
            "A",
            t(5),
            Request::UpdateMetadata {
                address: Address::new("B"),
                patch: Default::default(),
            },
        ))
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    let err = ledger
        .apply(Envelope::new(
            "A",
            t(5),
            Request::CreateProposal(ProposalDraft::new(
                "",
                "no title",
                ProposalAction::ParameterChange {
                    changes: vec![KarmaParameter::InteractionBonus(2.0)],
                },
            )),
        ))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PROPOSAL");
    assert!(ledger.proposals().is_empty());
    assert_eq!(ledger.sequence(), sequence);
}

#[test]
fn test_timestamps_must_not_regress() {
    let mut ledger = ledger();
    register(&mut ledger, "A", t(100));
    let err = ledger
        .apply(Envelope::new(
            "B",
            t(50),
            Request::Register {
                address: Address::new("B"),
                metadata: AgentMetadata::new("B", "", "MCP"),
            },
        ))
        .unwrap_err();
    assert_eq!(err.code(), "TIMESTAMP_REGRESSION");
    assert!(!ledger.is_registered(&Address::new("B")));
}

#[test]
fn test_history_is_chronological() {
    let mut ledger = ledger();
    register(&mut ledger, "A", t(0));
    register(&mut ledger, "B", t(0));
    let i1 = interaction_id(&log(&mut ledger, "A", &["B"], t(10)));
    rate(&mut ledger, "A", "B", 7, &i1, t(20)).unwrap();

    let history = ledger.karma_history(&Address::new("B")).unwrap();
    let reasons: Vec<_> = history.iter().map(|s| s.reason).collect();
    assert_eq!(
        reasons,
        [
            KarmaReason::Registered,
            KarmaReason::InteractionLogged,
            KarmaReason::RatingReceived
        ]
    );
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(history.iter().all(|s| s.verify(&Address::new("B"))));
}
