//! Property tests for the push/poll merge.
//!
//! Any interleaving of polled snapshots and pushed sensor patches must leave
//! the store equal to a sequential fold of the same updates.

use std::sync::Arc;

use proptest::prelude::*;
use scada_core::{SensorStatus, SensorUpdate, Snapshot};
use scada_dashboard::{
    AlertSink, DashboardConfig, DashboardStore, DashboardUpdate, LogAlertSink, MergePolicy,
    ReceivedUpdate, UpdateMultiplexer, UpdateSource,
};
use serde_json::json;

const KNOWN_SENSORS: [&str; 3] = ["L1-TEMP", "L1-PRES", "L2-FLOW"];

#[derive(Debug, Clone)]
enum Op {
    Poll {
        temp: f64,
        flow: f64,
        uptime: u64,
        version: Option<u64>,
    },
    Push(Vec<SensorUpdate>),
}

fn snapshot(temp: f64, flow: f64, uptime: u64, version: Option<u64>) -> Snapshot {
    let mut value = json!({
        "lines": [
            {
                "id": "L1", "name": "Mixing", "status": "running",
                "sensors": [
                    {"id": "L1-TEMP", "type": "temperature", "value": temp, "unit": "C", "status": "normal"},
                    {"id": "L1-PRES", "type": "pressure", "value": 2.5, "unit": "bar", "status": "normal"}
                ]
            },
            {
                "id": "L2", "name": "Filling", "status": "idle",
                "sensors": [
                    {"id": "L2-FLOW", "type": "flow", "value": flow, "unit": "L/min", "status": "normal"}
                ]
            }
        ],
        "uptime_sec": uptime
    });
    if let Some(version) = version {
        value["version"] = json!(version);
    }
    Snapshot::from_value(value).unwrap()
}

fn sensor_id() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => proptest::sample::select(KNOWN_SENSORS.to_vec()).prop_map(str::to_string),
        1 => Just("L9-GHOST".to_string()),
    ]
}

prop_compose! {
    fn sensor_update()(
        id in sensor_id(),
        value in -50.0f64..500.0,
        unit in proptest::option::of(Just("K".to_string())),
        status in proptest::option::of(proptest::sample::select(vec![
            SensorStatus::Normal,
            SensorStatus::High,
            SensorStatus::Critical,
        ])),
    ) -> SensorUpdate {
        SensorUpdate { id, value, unit, status }
    }
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0.0f64..120.0, 0.0f64..40.0, 0u64..100_000, proptest::option::of(0u64..20))
            .prop_map(|(temp, flow, uptime, version)| Op::Poll { temp, flow, uptime, version }),
        proptest::collection::vec(sensor_update(), 0..4).prop_map(Op::Push),
    ]
}

/// Sequential reference: snapshots replace, patches rewrite known sensors.
fn fold(ops: &[Op], policy: MergePolicy) -> Option<Snapshot> {
    let mut state: Option<Snapshot> = None;
    for op in ops {
        match op {
            Op::Poll {
                temp,
                flow,
                uptime,
                version,
            } => {
                let incoming = snapshot(*temp, *flow, *uptime, *version);
                let stale = policy == MergePolicy::Versioned
                    && matches!(
                        (incoming.version, state.as_ref().and_then(|s| s.version)),
                        (Some(new), Some(old)) if new < old
                    );
                if !stale {
                    state = Some(incoming);
                }
            }
            Op::Push(updates) => {
                let Some(current) = state.as_mut() else {
                    continue;
                };
                // Within one batch the last entry for an id is the one applied.
                for sensor in current.lines.iter_mut().flat_map(|l| l.sensors.iter_mut()) {
                    let Some(update) = updates.iter().rev().find(|u| u.id == sensor.id) else {
                        continue;
                    };
                    sensor.value = update.value;
                    if let Some(unit) = &update.unit {
                        sensor.unit = unit.clone();
                    }
                    if let Some(status) = update.status {
                        sensor.status = status;
                    }
                }
            }
        }
    }
    state
}

fn run_multiplexer(ops: &[Op], policy: MergePolicy) -> DashboardStore {
    let config = DashboardConfig {
        merge_policy: policy,
        ..DashboardConfig::default()
    };
    let alerts: Arc<dyn AlertSink> = Arc::new(LogAlertSink);
    let (mut mux, _updates) = UpdateMultiplexer::new(DashboardStore::default(), alerts, &config);

    for op in ops {
        let received = match op {
            Op::Poll {
                temp,
                flow,
                uptime,
                version,
            } => ReceivedUpdate::now(
                UpdateSource::Poll,
                DashboardUpdate::Snapshot(snapshot(*temp, *flow, *uptime, *version)),
            ),
            Op::Push(updates) => {
                ReceivedUpdate::now(UpdateSource::Push, DashboardUpdate::Sensors(updates.clone()))
            }
        };
        mux.apply(received);
    }
    mux.store().clone()
}

proptest! {
    #[test]
    fn arrival_order_matches_sequential_fold(ops in proptest::collection::vec(op(), 0..24)) {
        let store = run_multiplexer(&ops, MergePolicy::ArrivalOrder);
        let expected = fold(&ops, MergePolicy::ArrivalOrder);
        prop_assert_eq!(store.current().as_deref().cloned(), expected);
    }

    #[test]
    fn versioned_matches_sequential_fold(ops in proptest::collection::vec(op(), 0..24)) {
        let store = run_multiplexer(&ops, MergePolicy::Versioned);
        let expected = fold(&ops, MergePolicy::Versioned);
        prop_assert_eq!(store.current().as_deref().cloned(), expected);
    }

    #[test]
    fn patches_never_add_or_reorder_sensors(ops in proptest::collection::vec(op(), 1..24)) {
        let store = run_multiplexer(&ops, MergePolicy::ArrivalOrder);
        if let Some(current) = store.current() {
            let ids: Vec<&str> = current
                .lines
                .iter()
                .flat_map(|l| l.sensors.iter().map(|s| s.id.as_str()))
                .collect();
            prop_assert_eq!(ids, KNOWN_SENSORS.to_vec());
        }
    }

    #[test]
    fn store_stays_empty_without_a_snapshot(
        patches in proptest::collection::vec(proptest::collection::vec(sensor_update(), 0..4), 0..12)
    ) {
        let ops: Vec<Op> = patches.into_iter().map(Op::Push).collect();
        let store = run_multiplexer(&ops, MergePolicy::ArrivalOrder);
        prop_assert!(store.current().is_none());
        prop_assert_eq!(store.revision(), 0);
    }
}

#[test]
fn later_patch_for_same_id_wins_within_one_batch() {
    let ops = vec![
        Op::Poll {
            temp: 70.0,
            flow: 12.0,
            uptime: 10,
            version: None,
        },
        Op::Push(vec![
            SensorUpdate {
                id: "L1-TEMP".to_string(),
                value: 71.0,
                unit: None,
                status: None,
            },
            SensorUpdate {
                id: "L1-TEMP".to_string(),
                value: 72.0,
                unit: None,
                status: None,
            },
        ]),
    ];
    let store = run_multiplexer(&ops, MergePolicy::ArrivalOrder);
    assert_eq!(store.current().unwrap().lines[0].sensors[0].value, 72.0);
    assert_eq!(store.current().as_deref().cloned(), fold(&ops, MergePolicy::ArrivalOrder));
}
