//! The scenario tick loop.
//!
//! Each step the runner moves every entity along its velocity, swaps the
//! new poses into the shared directory, ticks the due sensors and writes
//! every report delivered on the bus as one JSON line.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use logicam_kernel::FaultPolicy;
use logicam_middleware::TopicReceiver;
use logicam_perception::{Pose3, Vec3};
use logicam_runtime::{FAULT_TOPIC, SensorManager};
use logicam_types::{DetectionReport, EventPayload, SimTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScenarioConfig;

/// One line of output.
#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    topic: &'a str,
    #[serde(flatten)]
    report: &'a DetectionReport,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub reports: usize,
    pub faults: usize,
    pub tick_errors: usize,
}

struct Entity {
    name: String,
    start: Pose3,
    velocity: Vec3,
}

impl Entity {
    fn pose_at(&self, t: f64) -> Pose3 {
        Pose3::new(self.start.position.add(self.velocity.scale(t)), self.start.orientation)
    }
}

/// Run `cfg` to completion, or until `stop` is raised.
pub fn run(
    cfg: &ScenarioConfig,
    stop: &AtomicBool,
    out: &mut dyn Write,
) -> Result<RunSummary, String> {
    let policy = FaultPolicy::new(cfg.fault_policy.max_consecutive_publish_failures);
    let mut manager = SensorManager::new().with_fault_policy(policy);

    let mut receivers: Vec<TopicReceiver> = Vec::new();
    for sensor in &cfg.sensors {
        manager
            .create_sensor(sensor)
            .map_err(|e| format!("sensor '{}': {}", sensor.name, e))?;
        receivers.push(manager.bus().subscribe(&sensor.resolved_topic()));
    }
    let mut faults = manager.bus().subscribe(FAULT_TOPIC);

    let entities: Vec<Entity> = cfg
        .entities
        .iter()
        .map(|e| Entity {
            name: e.name.clone(),
            start: Pose3::from_xyz_rpy(e.position, e.rpy),
            velocity: Vec3::from(e.velocity),
        })
        .collect();

    info!(
        sensors = manager.len(),
        entities = entities.len(),
        steps = cfg.simulation.steps,
        "scenario started"
    );

    let mut summary = RunSummary::default();
    for step in 0..cfg.simulation.steps {
        if stop.load(Ordering::SeqCst) {
            warn!(step, "scenario interrupted");
            break;
        }
        let t = step as f64 * cfg.simulation.step_size;
        let now = SimTime::from_secs_f64(t);

        manager
            .directory()
            .replace(entities.iter().map(|e| (e.name.clone(), e.pose_at(t))));

        for tick in manager.run_once(now, false) {
            if tick.result.is_err() {
                summary.tick_errors += 1;
            }
        }

        for rx in &mut receivers {
            while let Some(event) = rx.try_recv() {
                if let EventPayload::Detections(report) = &event.payload {
                    let line = ReportLine {
                        topic: rx.topic(),
                        report,
                    };
                    let json = serde_json::to_string(&line)
                        .map_err(|e| format!("Failed to encode report: {}", e))?;
                    writeln!(out, "{json}").map_err(|e| format!("Failed to write report: {}", e))?;
                    summary.reports += 1;
                }
            }
        }
        while let Some(event) = faults.try_recv() {
            if let EventPayload::SensorFault { sensor, message } = event.payload {
                warn!(sensor = %sensor, reason = %message, "sensor taken out of service");
                summary.faults += 1;
            }
        }

        summary.steps += 1;
        if cfg.simulation.real_time {
            std::thread::sleep(Duration::from_secs_f64(cfg.simulation.step_size));
        }
    }

    manager.shutdown();
    info!(steps = summary.steps, reports = summary.reports, "scenario finished");
    Ok(summary)
}
