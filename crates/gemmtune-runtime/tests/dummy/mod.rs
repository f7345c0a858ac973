mod kernels;
mod tune;

pub use kernels::*;
pub use tune::*;

use gemmtune_runtime::client::ComputeClient;
use gemmtune_runtime::device::{DeviceId, DeviceProperties};

/// Type id of the dummy device, so its autotune cache never mixes with a real host.
const DUMMY_DEVICE: u16 = 7;

pub fn test_client() -> ComputeClient {
    ComputeClient::new(DeviceProperties {
        id: DeviceId::new(DUMMY_DEVICE, 0),
        arch: "gfx942".to_string(),
        compute_units: 4,
        memory_capacity: 1024 * 1024,
    })
    .unwrap()
}
