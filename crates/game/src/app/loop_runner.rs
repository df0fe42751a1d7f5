use std::process::ExitCode;

use field_engine::{FieldWorld, FixedFrameClock, FrameClock, TickReport};
use tracing::{error, info, warn};

use super::bootstrap::{AppError, AppWiring};
use super::report::{write_text_atomic, ActorSummary, RunSummary};
use super::scenario::{LoadedScenario, ResolvedOrder};
use super::script_log::ScriptLog;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_scenario(app) {
        Ok(summary) => {
            println!("{}", summary.render_text());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

/// Issues scheduled orders at the start of their tick, then ticks the world.
pub(crate) struct ScenarioRun {
    loaded: LoadedScenario,
    clock: FixedFrameClock,
    host: ScriptLog,
    next_order: usize,
    rejected_orders: u32,
}

impl ScenarioRun {
    pub(crate) fn new(loaded: LoadedScenario, clock: FixedFrameClock) -> Self {
        Self {
            loaded,
            clock,
            host: ScriptLog::default(),
            next_order: 0,
            rejected_orders: 0,
        }
    }

    pub(crate) fn world(&self) -> &FieldWorld {
        &self.loaded.world
    }

    pub(crate) fn step(&mut self) -> TickReport {
        let tick = self.loaded.world.tick_count();
        self.host.set_tick(tick);
        while let Some(order) = self.loaded.orders.get(self.next_order) {
            if order.tick > tick {
                break;
            }
            let order = order.clone();
            self.next_order += 1;
            if !issue_order(&mut self.loaded, &order, &mut self.host) {
                self.rejected_orders += 1;
            }
        }
        let dt = self.clock.delta_seconds();
        self.loaded.world.tick(dt, &mut self.host)
    }

    pub(crate) fn finish(self, scenario: String) -> RunSummary {
        let world = &self.loaded.world;
        for order in &self.loaded.orders[self.next_order..] {
            warn!(
                tick = order.tick,
                actor = %order.actor_name,
                last_tick = world.tick_count(),
                "order_never_issued"
            );
        }

        let summary = RunSummary {
            scenario,
            ticks: world.tick_count(),
            metrics: world.metrics_totals(),
            rejected_orders: self.rejected_orders,
            actors: ActorSummary::collect(world),
            script_calls: self.host.into_entries(),
        };
        info!(
            ticks = summary.ticks,
            script_calls = summary.script_calls.len(),
            rejected_orders = summary.rejected_orders,
            "run_finished"
        );
        summary
    }
}

pub(crate) fn run_scenario(app: AppWiring) -> Result<RunSummary, AppError> {
    let loaded = app.scenario.instantiate(app.config)?;
    let clock = FixedFrameClock::new(app.dt_seconds).with_time_scale(app.time_scale);
    let mut run = ScenarioRun::new(loaded, clock);
    for _ in 0..app.ticks {
        run.step();
    }
    let summary = run.finish(app.scenario_label);

    if let Some(path) = &app.report_path {
        let text = serde_json::to_string_pretty(&summary)?;
        write_text_atomic(path, &text).map_err(|source| AppError::Report {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "report_written");
    }
    Ok(summary)
}

fn issue_order(
    loaded: &mut LoadedScenario,
    order: &ResolvedOrder,
    host: &mut ScriptLog,
) -> bool {
    match loaded.apply(order, host) {
        Ok(status) => {
            info!(
                tick = order.tick,
                actor = %order.actor_name,
                order = ?order.order,
                status = ?status,
                "order_issued"
            );
            true
        }
        Err(err) => {
            warn!(
                tick = order.tick,
                actor = %order.actor_name,
                error = %err,
                "order_rejected"
            );
            false
        }
    }
}
