#![deny(warnings)]

//! Headless HUD: an ECS schedule that drives a session and mirrors its state
//! into a HUD resource each frame.

use bevy_ecs::prelude::*;
use chrono::NaiveDate;
use data_pipeline::{synthetic_store, SyntheticSpec};
use fund_core::{Phase, ProductId, RawCommentary, SimConfig};
use fund_runtime::{Session, SessionError, SharedSession, SimEvent};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Resource, Clone)]
struct Game(SharedSession);

/// Player input queued for the next frame.
#[derive(Resource, Default)]
struct Controls {
    pick: Option<ProductId>,
    resume: bool,
}

#[derive(Resource, Default)]
struct HudState {
    date: Option<NaiveDate>,
    phase: Option<Phase>,
    weeks: u32,
    remaining_adjustments: u8,
    selected: Option<ProductId>,
    user_return: f64,
    paused: bool,
    finished: bool,
    last_event: String,
}

fn controls_system(game: Res<Game>, mut controls: ResMut<Controls>, mut hud: ResMut<HudState>) {
    if controls.resume {
        controls.resume = false;
        hud.paused = false;
    }
    let Some(pick) = controls.pick.take() else {
        return;
    };
    let res = game.0.with(|s| {
        s.open_selector()?;
        s.select_product(pick)
    });
    match res {
        Ok(()) => hud.last_event = format!("holding fund {}", pick.0),
        Err(e) => {
            warn!(%e, "pick refused");
            hud.last_event = e.to_string();
        }
    }
}

fn advance_system(game: Res<Game>, mut hud: ResMut<HudState>) {
    if hud.paused || hud.finished {
        return;
    }
    match game.0.try_advance() {
        Ok(report) => {
            hud.weeks += 1;
            for ev in &report.events {
                match ev {
                    SimEvent::AnnualSummary(s) => {
                        hud.last_event = format!("{} closed at {:+.2}%", s.year, s.user.total_return)
                    }
                    SimEvent::PhaseChanged { .. } => hud.last_event = "live phase".into(),
                    SimEvent::FinalSummary(s) => {
                        hud.last_event = format!(
                            "finished: rank {} of {}",
                            s.user_rank(),
                            s.leaderboard.participants
                        )
                    }
                    _ => {}
                }
            }
            if report.needs_attention() {
                hud.paused = true;
            }
        }
        Err(SessionError::Busy) => {}
        Err(e) => hud.last_event = e.to_string(),
    }
}

fn sync_hud_system(game: Res<Game>, mut hud: ResMut<HudState>) {
    let snap = game.0.with(|s| s.snapshot());
    hud.date = Some(snap.state.current_date);
    hud.phase = Some(snap.state.phase);
    hud.remaining_adjustments = snap.state.remaining_adjustments;
    hud.selected = snap.selected;
    hud.user_return = snap.user.total_return;
    hud.finished = snap.finished;
}

fn build(session: Session) -> (World, Schedule) {
    let mut world = World::new();
    world.insert_resource(Game(SharedSession::new(session)));
    world.insert_resource(Controls::default());
    world.insert_resource(HudState::default());
    let mut schedule = Schedule::default();
    schedule.add_systems((controls_system, advance_system, sync_hud_system).chain());
    (world, schedule)
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let session = synthetic_store(&SyntheticSpec::default())
        .map_err(|e| e.to_string())
        .and_then(|store| {
            Session::new(store, RawCommentary::default(), SimConfig::default())
                .map_err(|e| e.to_string())
        });
    let session = match session {
        Ok(s) => s,
        Err(e) => {
            eprintln!("game-frontend: {e}");
            std::process::exit(1);
        }
    };
    let (mut world, mut schedule) = build(session);
    world.resource_mut::<Controls>().pick = Some(ProductId(0));

    // headless: acknowledge every pause and keep the first fund
    while !world.resource::<HudState>().finished {
        schedule.run(&mut world);
        let paused = world.resource::<HudState>().paused;
        if paused {
            let hud = world.resource::<HudState>();
            info!(date = ?hud.date, event = %hud.last_event, "paused");
            let reselect = world.resource::<Game>().0.with(|s| s.selector_open());
            let mut controls = world.resource_mut::<Controls>();
            controls.resume = true;
            if reselect {
                controls.pick = Some(ProductId(0));
            }
        }
    }
    let s = world.resource::<HudState>();
    println!(
        "game-frontend: HUD | weeks={} return={:+.2}% status={}",
        s.weeks, s.user_return, s.last_event
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(start: NaiveDate) -> Session {
        let store = synthetic_store(&SyntheticSpec {
            products: 3,
            start: NaiveDate::from_ymd_opt(2021, 12, 3).unwrap(),
            weeks: 12,
            ..SyntheticSpec::default()
        })
        .unwrap();
        let cfg = SimConfig {
            start_date: start,
            ..SimConfig::default()
        };
        Session::new(store, RawCommentary::default(), cfg).unwrap()
    }

    #[test]
    fn frame_applies_pick_and_ticks() {
        let (mut world, mut schedule) = build(session(NaiveDate::from_ymd_opt(2021, 12, 1).unwrap()));
        world.resource_mut::<Controls>().pick = Some(ProductId(2));
        schedule.run(&mut world);
        let hud = world.resource::<HudState>();
        assert_eq!(hud.weeks, 1);
        assert_eq!(hud.selected, Some(ProductId(2)));
        assert_eq!(hud.date, NaiveDate::from_ymd_opt(2021, 12, 8));
        assert_eq!(hud.phase, Some(Phase::Tutorial));
    }

    #[test]
    fn pauses_on_year_end_until_resumed() {
        let (mut world, mut schedule) = build(session(NaiveDate::from_ymd_opt(2021, 12, 15).unwrap()));
        schedule.run(&mut world); // 22 Dec
        schedule.run(&mut world); // 29 Dec, year summary
        assert!(world.resource::<HudState>().paused);
        schedule.run(&mut world);
        assert_eq!(world.resource::<HudState>().weeks, 2);
        world.resource_mut::<Controls>().resume = true;
        schedule.run(&mut world); // 5 Jan, live phase
        let hud = world.resource::<HudState>();
        assert_eq!(hud.weeks, 3);
        assert_eq!(hud.phase, Some(Phase::Live));
        assert!(hud.paused);
    }
}
