#![deny(warnings)]

//! Headless CLI: plays a scripted strategy through a dataset and prints the
//! yearly and final reports.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use data_pipeline::{load_commentary_or_default, load_products, synthetic_store, SyntheticSpec};
use fund_core::{parse_date_str, ProductId, RawCommentary, SimConfig};
use fund_runtime::{
    AnnualSummary, AutoPlay, FinalSummary, Session, SessionError, SharedSession, SimEvent,
    StopReason, TickReport,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    data: Option<String>,
    reviews: Option<String>,
    config: Option<String>,
    fund: usize,
    switches: Vec<(NaiveDate, ProductId)>,
    autoplay: bool,
    autoplay_ms: Option<u64>,
    json: bool,
}

fn parse_switch(s: &str) -> Option<(NaiveDate, ProductId)> {
    let (date, id) = s.rsplit_once(':')?;
    Some((parse_date_str(date)?, ProductId(id.parse().ok()?)))
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--data" => args.data = it.next(),
            "--reviews" => args.reviews = it.next(),
            "--config" => args.config = it.next(),
            "--fund" => {
                args.fund = it
                    .next()
                    .and_then(|s| s.parse().ok())
                    .context("--fund expects a product id")?
            }
            "--switch" => {
                let raw = it.next().unwrap_or_default();
                let sw = parse_switch(&raw)
                    .with_context(|| format!("--switch expects DATE:ID, got {raw:?}"))?;
                args.switches.push(sw);
            }
            "--autoplay" => args.autoplay = true,
            "--autoplay-ms" => args.autoplay_ms = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args.switches.sort_by_key(|(d, _)| *d);
    Ok(args)
}

fn load_config(path: Option<&str>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config {path}"))
}

/// Scripted player: a starting fund plus dated switches.
struct Plan {
    fund: ProductId,
    pending: VecDeque<(NaiveDate, ProductId)>,
}

impl Plan {
    fn due(&mut self, today: NaiveDate) -> Option<ProductId> {
        let mut pick = None;
        while self.pending.front().is_some_and(|(d, _)| *d <= today) {
            pick = self.pending.pop_front().map(|(_, p)| p);
        }
        pick
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        if session.is_finished() {
            return Ok(());
        }
        let today = session.state().current_date;
        let due = self.due(today);
        if let Some(p) = due {
            self.fund = p;
        }
        if !session.selector_open() && due.is_some() {
            match session.open_selector() {
                Ok(()) => {}
                Err(SessionError::AdjustmentExhausted { year }) => {
                    warn!(%today, year, "switch skipped, no adjustments left");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
        if session.selector_open() {
            session.select_product(self.fund)?;
        }
        Ok(())
    }
}

fn print_annual(s: &AnnualSummary) {
    println!(
        "== {} | you: {:+.2}% (vol {:.2}%, max dd {:.2}%, sharpe {:.2})",
        s.year, s.user.total_return, s.user.volatility, s.user.max_drawdown, s.user.sharpe_ratio
    );
    for row in s.funds.iter().take(5) {
        println!("   #{:<3} {:<28} {:+.2}%", row.rank, row.name, row.stats.total_return);
    }
}

fn print_final(s: &FinalSummary) {
    println!(
        "== final | you: {:+.2}% | rank {} of {}",
        s.user.total_return,
        s.user_rank(),
        s.leaderboard.participants
    );
    for row in s.leaderboard.top(10) {
        println!(
            "   #{:<3} {:<28} {:+.2}%  sharpe {:.2}",
            row.rank, row.name, row.stats.total_return, row.stats.sharpe_ratio
        );
    }
}

fn print_report(report: &TickReport) {
    for ev in &report.events {
        match ev {
            SimEvent::Advanced { date, index } => debug!(%date, index, "week"),
            SimEvent::PhaseChanged { phase, .. } => println!("-- phase: {phase:?}"),
            SimEvent::AnnualSummary(s) => print_annual(s),
            SimEvent::FinalSummary(s) => print_final(s),
            _ => {}
        }
    }
}

fn play_manual(session: &mut Session, plan: &mut Plan) -> Result<()> {
    while !session.is_finished() {
        plan.apply(session)?;
        let report = session.advance()?;
        print_report(&report);
    }
    Ok(())
}

async fn play_auto(shared: &SharedSession, plan: &mut Plan, period: Duration) -> Result<()> {
    loop {
        shared.with(|s| plan.apply(s))?;
        let outcome = AutoPlay::start(shared.clone(), period).join().await;
        if let Some(report) = &outcome.last {
            print_report(report);
        }
        match outcome.reason {
            StopReason::NeedsAttention => continue,
            StopReason::Finished | StopReason::Cancelled => return Ok(()),
            StopReason::Failed(e) => bail!("auto-advance failed: {e}"),
        }
    }
}

#[derive(Serialize)]
struct Output<'a> {
    git_sha: &'a str,
    summary: &'a FinalSummary,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .init();

    let args = parse_args()?;
    info!(
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        ?args,
        "starting CLI"
    );

    let config = load_config(args.config.as_deref())?;
    let store = match &args.data {
        Some(path) => load_products(path)?,
        None => synthetic_store(&SyntheticSpec::default())?,
    };
    let commentary = match &args.reviews {
        Some(path) => load_commentary_or_default(path),
        None => RawCommentary::default(),
    };
    let autoplay = args
        .autoplay_ms
        .or(args.autoplay.then_some(config.autoplay_interval_ms))
        .map(Duration::from_millis);
    let mut session = Session::new(store, commentary, config)?;
    println!("{}", session.commentary());

    let mut plan = Plan {
        fund: ProductId(args.fund),
        pending: args.switches.into_iter().collect(),
    };
    let summary = match autoplay {
        None => {
            play_manual(&mut session, &mut plan)?;
            session.final_summary()
        }
        Some(period) => {
            let shared = SharedSession::new(session);
            play_auto(&shared, &mut plan, period).await?;
            shared.with(|s| s.final_summary())
        }
    };

    if args.json {
        let out = Output {
            git_sha: env!("GIT_SHA"),
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}
