//! Elimination engine - boundary tracking, fall detection, kill attribution

use crate::config::GameConfig;
use crate::util::time::secs_between;
use crate::ws::protocol::{Attribution, EliminationReason, Vec3};

use super::participant::HitRecord;
use super::scoring::{finalize, live_out_of_bounds_secs};
use super::session::SessionStore;

/// Result of eliminating one participant
#[derive(Debug, Clone, PartialEq)]
pub struct Elimination {
    pub id: String,
    pub name: String,
    pub reason: EliminationReason,
    pub eliminated_by: Option<Attribution>,
}

/// Outside the arena disc (plus margin) or below the platform
pub fn is_out_of_bounds(position: Vec3, arena_radius: f32, config: &GameConfig) -> bool {
    position.planar_length() > arena_radius + config.boundary_margin
        || position.y < config.boundary_floor_y
}

/// Run the per-tick checks for one participant: boundary first, then fall.
/// At most one elimination is produced.
pub fn evaluate(store: &mut SessionStore, id: &str, now: u64) -> Option<Elimination> {
    let radius = store.arena_radius();
    let running_since = store.running_since();
    let config = store.config().clone();

    let p = store.participant_mut(id)?;
    if p.is_eliminated {
        return None;
    }

    let outside = is_out_of_bounds(p.position, radius, &config);
    if outside && !p.is_out_of_bounds {
        p.is_out_of_bounds = true;
        p.out_of_bounds_since = Some(now);
    } else if !outside && p.is_out_of_bounds {
        if let Some(since) = p.out_of_bounds_since.take() {
            p.out_of_bounds_time += secs_between(since, now);
        }
        p.is_out_of_bounds = false;
    }

    if p.is_out_of_bounds {
        let limit_secs = config.out_of_bounds_limit_ms as f64 / 1000.0;
        if live_out_of_bounds_secs(p, now) >= limit_secs {
            return eliminate(store, id, EliminationReason::Boundary, now);
        }
    } else if let Some(started) = running_since {
        p.survival_time = secs_between(started, now);
    }

    if p.position.y < config.fall_threshold_y {
        return eliminate(store, id, EliminationReason::Pushed, now);
    }

    None
}

/// Eliminate a participant and finalize their score. A no-op returning `None` if the
/// participant is unknown or already eliminated, so repeated calls never double-credit.
pub fn eliminate(
    store: &mut SessionStore,
    id: &str,
    reason: EliminationReason,
    now: u64,
) -> Option<Elimination> {
    let running_since = store.running_since();
    let config = store.config().clone();

    let (name, hit) = {
        let p = store.participant_mut(id)?;
        if p.is_eliminated {
            return None;
        }

        finalize(p, now, running_since, &config);
        p.is_eliminated = true;
        p.eliminated_at = Some(now);
        (p.name.clone(), p.last_hit_by.clone())
    };

    let eliminated_by = match (reason, hit) {
        (EliminationReason::Pushed, Some(hit)) => credit_hitter(store, &hit, now, &config),
        _ => None,
    };

    Some(Elimination {
        id: id.to_string(),
        name,
        reason,
        eliminated_by,
    })
}

/// Credit the recorded hitter if the hit is recent enough and the hitter is still in play
fn credit_hitter(
    store: &mut SessionStore,
    hit: &HitRecord,
    now: u64,
    config: &GameConfig,
) -> Option<Attribution> {
    if now.saturating_sub(hit.at) >= config.attribution_window_ms {
        return None;
    }

    let hitter = store.participant_mut(&hit.hitter_id)?;
    if hitter.is_eliminated {
        return None;
    }
    hitter.eliminations += 1;

    Some(Attribution {
        id: hitter.id.clone(),
        name: hitter.name.clone(),
    })
}

/// Remember that `hitter_id` touched `hit_id`. Attribution is settled later, at elimination.
pub fn record_collision(store: &mut SessionStore, hit_id: &str, hitter_id: &str, now: u64) -> bool {
    let Some((hit, hitter)) = store.pair_mut(hit_id, hitter_id) else {
        return false;
    };
    if hit.is_eliminated || hitter.is_eliminated {
        return false;
    }

    hit.last_hit_by = Some(HitRecord {
        hitter_id: hitter.id.clone(),
        hitter_name: hitter.name.clone(),
        at: now,
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::Phase;

    const START: u64 = 1_000_000;

    fn playing(ids: &[&str]) -> SessionStore {
        let mut store = SessionStore::new(GameConfig::default(), 1);
        for (i, id) in ids.iter().enumerate() {
            store.add_participant(id, &id.to_lowercase(), i as u64);
        }
        store.set_phase(Phase::Playing, START);
        store
    }

    fn place(store: &mut SessionStore, id: &str, position: Vec3) {
        store.update_kinematics(id, position, Vec3::ZERO, START);
    }

    #[test]
    fn boundary_elimination_after_ten_seconds_outside() {
        let mut store = playing(&["A"]);
        place(&mut store, "A", Vec3::new(11.5, 1.0, 0.0));

        assert_eq!(evaluate(&mut store, "A", START), None);
        assert!(store.participant("A").unwrap().is_out_of_bounds);
        assert_eq!(evaluate(&mut store, "A", START + 9_999), None);

        let out = evaluate(&mut store, "A", START + 10_000).unwrap();
        assert_eq!(out.reason, EliminationReason::Boundary);
        assert_eq!(out.eliminated_by, None);

        let a = store.participant("A").unwrap();
        assert!(a.is_eliminated);
        assert_eq!(a.out_of_bounds_time, 10.0);
        assert_eq!(a.out_of_bounds_since, None);
    }

    #[test]
    fn margin_keeps_edge_participants_in_bounds() {
        let mut store = playing(&["A"]);
        place(&mut store, "A", Vec3::new(10.9, 0.5, 0.0));
        evaluate(&mut store, "A", START + 1_000);
        let a = store.participant("A").unwrap();
        assert!(!a.is_out_of_bounds);
        assert_eq!(a.survival_time, 1.0);
    }

    #[test]
    fn excursions_accumulate_and_never_shrink() {
        let mut store = playing(&["A"]);

        place(&mut store, "A", Vec3::new(0.0, -2.0, 0.0));
        evaluate(&mut store, "A", START);
        place(&mut store, "A", Vec3::new(0.0, 1.0, 0.0));
        evaluate(&mut store, "A", START + 2_000);
        assert_eq!(store.participant("A").unwrap().out_of_bounds_time, 2.0);

        place(&mut store, "A", Vec3::new(12.0, 1.0, 0.0));
        evaluate(&mut store, "A", START + 5_000);
        assert_eq!(store.participant("A").unwrap().out_of_bounds_time, 2.0);
        place(&mut store, "A", Vec3::new(1.0, 1.0, 0.0));
        evaluate(&mut store, "A", START + 6_000);
        assert_eq!(store.participant("A").unwrap().out_of_bounds_time, 3.0);
    }

    #[test]
    fn limit_counts_previous_excursions() {
        let mut store = playing(&["A"]);
        store.participant_mut("A").unwrap().out_of_bounds_time = 8.0;
        place(&mut store, "A", Vec3::new(20.0, 1.0, 0.0));
        evaluate(&mut store, "A", START);
        assert_eq!(evaluate(&mut store, "A", START + 1_999), None);
        let out = evaluate(&mut store, "A", START + 2_000).unwrap();
        assert_eq!(out.reason, EliminationReason::Boundary);
    }

    #[test]
    fn survival_freezes_while_outside() {
        let mut store = playing(&["A"]);
        evaluate(&mut store, "A", START + 4_000);
        assert_eq!(store.participant("A").unwrap().survival_time, 4.0);

        place(&mut store, "A", Vec3::new(30.0, 1.0, 0.0));
        evaluate(&mut store, "A", START + 6_000);
        assert_eq!(store.participant("A").unwrap().survival_time, 4.0);
    }

    #[test]
    fn falling_below_threshold_eliminates_immediately() {
        let mut store = playing(&["A"]);
        place(&mut store, "A", Vec3::new(0.0, -5.01, 0.0));

        let out = evaluate(&mut store, "A", START + 100).unwrap();
        assert_eq!(out.reason, EliminationReason::Pushed);
        assert!(store.participant("A").unwrap().is_eliminated);
    }

    #[test]
    fn boundary_wins_when_both_fire_in_one_tick() {
        let mut store = playing(&["A", "B"]);
        store.participant_mut("A").unwrap().out_of_bounds_time = 10.0;
        record_collision(&mut store, "A", "B", START);
        place(&mut store, "A", Vec3::new(0.0, -6.0, 0.0));

        let out = evaluate(&mut store, "A", START + 50).unwrap();
        assert_eq!(out.reason, EliminationReason::Boundary);
        assert_eq!(out.eliminated_by, None);
        assert_eq!(store.participant("B").unwrap().eliminations, 0);
        assert_eq!(evaluate(&mut store, "A", START + 100), None);
    }

    #[test]
    fn attribution_window_is_exclusive_at_three_seconds() {
        let mut store = playing(&["A", "B"]);
        assert!(record_collision(&mut store, "A", "B", START));
        let credited = eliminate(&mut store, "A", EliminationReason::Pushed, START + 2_999).unwrap();
        assert_eq!(
            credited.eliminated_by,
            Some(Attribution {
                id: "B".into(),
                name: "b".into()
            })
        );
        assert_eq!(store.participant("B").unwrap().eliminations, 1);

        let mut store = playing(&["A", "B"]);
        record_collision(&mut store, "A", "B", START);
        let late = eliminate(&mut store, "A", EliminationReason::Pushed, START + 3_001).unwrap();
        assert_eq!(late.eliminated_by, None);
        assert_eq!(store.participant("B").unwrap().eliminations, 0);
    }

    #[test]
    fn dead_hitter_gets_no_credit() {
        let mut store = playing(&["A", "B", "C"]);
        record_collision(&mut store, "A", "B", START);
        eliminate(&mut store, "B", EliminationReason::Pushed, START + 100);

        let out = eliminate(&mut store, "A", EliminationReason::Pushed, START + 200).unwrap();
        assert_eq!(out.eliminated_by, None);
        assert_eq!(store.participant("B").unwrap().eliminations, 0);
    }

    #[test]
    fn departed_hitter_gets_no_credit() {
        let mut store = playing(&["A", "B"]);
        record_collision(&mut store, "A", "B", START);
        store.remove_participant("B");
        let out = eliminate(&mut store, "A", EliminationReason::Pushed, START + 10).unwrap();
        assert_eq!(out.eliminated_by, None);
    }

    #[test]
    fn freshest_hit_wins_attribution() {
        let mut store = playing(&["A", "B", "C"]);
        record_collision(&mut store, "A", "B", START);
        record_collision(&mut store, "A", "C", START + 500);
        let out = eliminate(&mut store, "A", EliminationReason::Pushed, START + 1_000).unwrap();
        assert_eq!(out.eliminated_by.map(|a| a.id), Some("C".to_string()));
    }

    #[test]
    fn fall_during_outside_excursion_is_pushed_and_credited() {
        let mut store = playing(&["A", "B"]);
        place(&mut store, "A", Vec3::new(30.0, 1.0, 0.0));
        assert_eq!(evaluate(&mut store, "A", START + 1_000), None);
        assert!(store.participant("A").unwrap().is_out_of_bounds);

        record_collision(&mut store, "A", "B", START + 2_000);
        place(&mut store, "A", Vec3::new(30.0, -5.5, 0.0));

        let out = evaluate(&mut store, "A", START + 3_000).unwrap();
        assert_eq!(out.reason, EliminationReason::Pushed);
        assert_eq!(out.eliminated_by.map(|a| a.id), Some("B".to_string()));
        assert_eq!(store.participant("B").unwrap().eliminations, 1);
    }

    #[test]
    fn eliminate_is_idempotent() {
        let mut store = playing(&["A", "B"]);
        record_collision(&mut store, "A", "B", START);
        assert!(eliminate(&mut store, "A", EliminationReason::Pushed, START + 10).is_some());
        assert!(eliminate(&mut store, "A", EliminationReason::Pushed, START + 20).is_none());
        assert_eq!(store.participant("B").unwrap().eliminations, 1);
    }

    #[test]
    fn boundary_and_konami_never_attribute() {
        let mut store = playing(&["A", "B"]);
        record_collision(&mut store, "A", "B", START);
        let out = eliminate(&mut store, "A", EliminationReason::Konami, START + 10).unwrap();
        assert_eq!(out.eliminated_by, None);
        assert_eq!(store.participant("B").unwrap().eliminations, 0);
    }

    #[test]
    fn score_is_finalized_at_elimination() {
        let mut store = playing(&["A"]);
        store.participant_mut("A").unwrap().eliminations = 2;
        eliminate(&mut store, "A", EliminationReason::Pushed, START + 45_300);

        let a = store.participant("A").unwrap();
        assert_eq!(a.survival_time, 45.3);
        let final_score = a.final_score.unwrap();
        assert!((final_score - 245.3).abs() < 1e-9);
        // later queries report the same number
        let later = store.breakdown(a, START + 90_000);
        assert_eq!(later.score, final_score);
    }

    #[test]
    fn collisions_require_two_live_participants() {
        let mut store = playing(&["A", "B"]);
        assert!(!record_collision(&mut store, "A", "A", START));
        assert!(!record_collision(&mut store, "A", "ghost", START));

        eliminate(&mut store, "B", EliminationReason::Boundary, START);
        assert!(!record_collision(&mut store, "A", "B", START + 1));
        assert!(store.participant("A").unwrap().last_hit_by.is_none());
    }
}
