use crate::generator::profile::{build_scan, ScenarioConfig};
use crate::monitor::model::MonitorModel;
use crate::workflow::runner::Runner;
use anyhow::Result;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

fn monitor_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9100))
}

#[derive(Debug)]
struct WarpError;

impl warp::reject::Reject for WarpError {}

/// Hosts the monitor HTTP endpoint and runs scenarios posted to it.
pub struct MonitorBridge {
    state: Arc<RwLock<MonitorModel>>,
}

impl MonitorBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        let state = Arc::new(RwLock::new(MonitorModel::default()));
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let runner_filter = warp::any().map(move || runner.clone());

        let get_route = warp::path("summary")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<RwLock<MonitorModel>>| warp::reply::json(&*state.read().unwrap()));

        let scenario_route = warp::path("scenario")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                |scenario: ScenarioConfig,
                 state: Arc<RwLock<MonitorModel>>,
                 runner: Arc<Runner>| async move {
                    let outcome = build_scan(&scenario, &runner.config().radar)
                        .and_then(|pulses| runner.run_scan(&pulses));
                    match outcome {
                        Ok(summary) => {
                            let model =
                                MonitorModel::from_summary(&summary, scenario.description.clone());
                            let mut guard = state.write().unwrap();
                            *guard = model;
                            if let Some(name) = scenario.description.as_ref() {
                                println!(
                                    "[monitor] scenario {} -> {} beams, {} gates flagged",
                                    name,
                                    summary.beams.len(),
                                    summary.gates_flagged
                                );
                            }
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "beams": summary.beams.len(),
                                    "gates_flagged": summary.gates_flagged,
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            eprintln!("scenario error: {}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        thread::spawn(move || {
            let routes = get_route.or(scenario_route);
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build runtime");
            runtime.block_on(async move {
                warp::serve(routes).run(monitor_bind_address()).await;
            });
        });

        Self { state }
    }

    pub fn publish(&self, model: &MonitorModel) -> Result<()> {
        let mut guard = self.state.write().unwrap();
        *guard = model.clone();
        println!(
            "[monitor] beams: {}, gates flagged: {}",
            guard.beams_emitted, guard.gates_flagged
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[monitor] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> MonitorModel {
        self.state.read().unwrap().clone()
    }
}
