//! Poller (C5): the single long-running task that keeps the State Mirror
//! fresh and drives the §4.5.1/§4.5.2 recovery thresholds.

use crate::arbiter::BusArbiter;
use crate::codec::{encode_address, frequency_from_raw, hundredths_from_raw, max_frequency_from_raw, voltage_from_raw};
use crate::metrics::PollerMetrics;
use crate::registry::Registry;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use vfd_common::error::{GatewayError, TransportError};
use vfd_common::types::DriveMode;

const CYCLE_DELAY: Duration = Duration::from_millis(200);
const INTER_DRIVE_DELAY: Duration = Duration::from_millis(100);
const POLL_TIMEOUT: Duration = Duration::from_millis(400);
const REINITIALIZE_THRESHOLD: u32 = 5;
const OFFLINE_THRESHOLD: u32 = 10;

/// Refresh one drive's mirror with the two-call Frenic sequence (§4.5.1).
/// Each call is its own arbiter acquisition so a pending command can
/// interleave between them.
async fn refresh_drive(
    registry: &Registry,
    arbiter: &BusArbiter,
    id: &str,
    slave_id: u8,
) -> Result<(), GatewayError> {
    let m05 = encode_address("M05").expect("M05 is a valid function code");
    let r = arbiter
        .with_transport(|t| t.read_holding(slave_id, m05, 10, POLL_TIMEOUT))
        .await?;

    let f03 = encode_address("F03").expect("F03 is a valid function code");
    let f03_block = arbiter
        .with_transport(|t| t.read_holding(slave_id, f03, 1, POLL_TIMEOUT))
        .await?;

    registry.update_state(id, |s| {
        s.tgt_frequency = frequency_from_raw(r[0]);
        s.cur_frequency = frequency_from_raw(r[4]);
        s.input_power = hundredths_from_raw(r[5]);
        s.output_current = hundredths_from_raw(r[6]);
        s.output_voltage = voltage_from_raw(r[7]);
        s.tgt_drive_mode = DriveMode::decode_status_word(r[8]);
        s.cur_drive_mode = DriveMode::decode_status_word(r[9]);
        s.max_frequency = max_frequency_from_raw(f03_block[0]);
    });
    Ok(())
}

/// Whether `err` is the serial-device-absent case (§4.5 step b), which must
/// not be charged to any individual drive's fail counter.
fn is_port_open_error(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Transport(TransportError::PortClosed))
}

/// Run one full cycle over every registered drive. Exposed separately from
/// [`run`] so tests can drive a bounded number of cycles instead of an
/// infinite loop.
pub async fn poll_once(registry: &Registry, arbiter: &BusArbiter, metrics: &PollerMetrics) {
    if !arbiter.is_initialized().await {
        return;
    }

    for id in registry.ids_in_order() {
        let Some(descriptor) = registry.get_descriptor(id) else {
            continue;
        };
        let slave_id = descriptor.slave_id;

        match refresh_drive(registry, arbiter, id, slave_id).await {
            Ok(()) => {
                registry.reset_fail_count(id);
                sleep(INTER_DRIVE_DELAY).await;
            }
            Err(err) if is_port_open_error(&err) => {
                warn!(drive = %id, "serial device unavailable, skipping poll without charging drive");
            }
            Err(err) => {
                let count = registry.increment_fail_count(id).unwrap_or(0);
                metrics.record_poll_failure();
                warn!(drive = %id, %err, poll_fail_count = count, "poll failed");
                if count > REINITIALIZE_THRESHOLD {
                    info!(drive = %id, poll_fail_count = count, "triggering bus recovery");
                    metrics.record_reinitialization();
                    if let Err(reinit_err) = arbiter.initialize().await {
                        error!(%reinit_err, "bus recovery attempt failed");
                    }
                }
                if count > OFFLINE_THRESHOLD {
                    registry.update_state(id, |s| s.cur_drive_mode = DriveMode::Offline);
                }
            }
        }
    }
}

/// Run the poller until `shutdown` is set: sleep, poll every registered
/// drive, repeat. A shutdown request interrupts the sleep but never an
/// in-flight poll cycle, so the drive that's mid-refresh when the signal
/// arrives still gets its `reset_fail_count`/mirror update (§4.9 step 6).
pub async fn run(
    registry: &Registry,
    arbiter: &BusArbiter,
    metrics: &PollerMetrics,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            () = sleep(CYCLE_DELAY) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
        metrics.record_cycle();
        poll_once(registry, arbiter, metrics).await;
        if *shutdown.borrow() {
            return;
        }
    }
}
