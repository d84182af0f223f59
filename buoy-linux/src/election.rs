//! Bootstrap window: look for a master, take the role if nobody answers, else ask for an id.

use std::sync::Arc;
use std::time::Duration;

use buoy_core::{BuoyNode, NodeError, Role};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::info;

use crate::radio::Radio;

/// Upper bound of the random delay added to the bootstrap window, so buoys powered on
/// together do not all time out at once.
const MAX_JITTER: Duration = Duration::from_millis(500);

pub async fn run_bootstrap(
    radio: Arc<Radio>,
    node: Arc<Mutex<BuoyNode>>,
    window: Duration,
) -> Result<Role, NodeError> {
    let detect = {
        let node = node.lock().await;
        match node.role() {
            Role::Unknown => Some(node.master_detection()?),
            _ => None,
        }
    };
    if let Some(out) = detect {
        radio.send(&out).await;
        tokio::time::sleep(window + jitter()).await;
    }

    let (role, request) = {
        let mut node = node.lock().await;
        match node.role() {
            Role::Unknown => {
                node.declare_master()?;
                info!("no master answered\n{}", node.info());
                (Role::Master, None)
            }
            Role::Slave => (Role::Slave, Some(node.id_request()?)),
            Role::Master => (Role::Master, None),
        }
    };
    if let Some(out) = request {
        info!(master = %out.destination, "requesting an id");
        radio.send(&out).await;
    }
    Ok(role)
}

fn jitter() -> Duration {
    let max = MAX_JITTER.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}
