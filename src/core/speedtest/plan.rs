//! Request sizing for the transfer phases.
//!
//! Download and upload both start with a short warm-up. In single-connection
//! mode the main workload is a fixed run of sequential requests. In
//! multi-connection mode the warm-up speed picks a tier: faster links get
//! more concurrent requests with larger payloads.

use serde::{Deserialize, Serialize};

/// Transfer parallelism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    /// Sequential requests over one connection at a time.
    Single,
    /// Tiered number of concurrent requests.
    Multi,
}

impl TransferMode {
    pub fn from_flag(multi_connection: bool) -> Self {
        if multi_connection {
            TransferMode::Multi
        } else {
            TransferMode::Single
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Single => "single",
            TransferMode::Multi => "multi",
        }
    }
}

/// One batch of identical requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    pub requests: usize,
    pub size_index: usize,
}

/// `(minimum warm-up Mbps, workload)`, fastest tier first.
type Tier = (f64, Workload);

const fn tier(min_mbps: f64, requests: usize, size_index: usize) -> Tier {
    (
        min_mbps,
        Workload {
            requests,
            size_index,
        },
    )
}

const DOWNLOAD_TIERS: [Tier; 4] = [
    tier(50.0, 32, 6),
    tier(10.0, 16, 4),
    tier(4.0, 8, 4),
    tier(2.5, 4, 4),
];

const UPLOAD_TIERS: [Tier; 4] = [
    tier(50.0, 40, 9),
    tier(10.0, 16, 9),
    tier(4.0, 8, 9),
    tier(2.5, 4, 5),
];

/// Sizes and counts for every request a measurement issues.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    /// Side lengths of `random<N>x<N>.jpg` download images.
    pub download_sizes: Vec<u32>,

    /// Upload payload sizes in KB.
    pub upload_sizes_kb: Vec<u32>,

    /// Latency requests; the minimum wins.
    pub ping_samples: usize,

    pub warmup_requests: usize,

    /// Image side length used for the download warm-up.
    pub download_warmup_size: u32,

    /// Index into `upload_sizes_kb` used for the upload warm-up.
    pub upload_warmup_index: usize,

    /// Workload in single-connection mode, for both directions.
    pub single: Workload,
}

impl Default for TransferPlan {
    fn default() -> Self {
        TransferPlan {
            download_sizes: vec![350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500, 4000],
            upload_sizes_kb: vec![100, 300, 500, 800, 1000, 1500, 2500, 3000, 3500, 4000],
            ping_samples: 3,
            warmup_requests: 2,
            download_warmup_size: 750,
            upload_warmup_index: 4,
            single: Workload {
                requests: 6,
                size_index: 3,
            },
        }
    }
}

impl TransferPlan {
    /// Main download batch, or `None` when the warm-up speed stands as the result.
    pub fn download_workload(&self, mode: TransferMode, warmup_mbps: f64) -> Option<Workload> {
        self.workload(mode, warmup_mbps, &DOWNLOAD_TIERS)
    }

    /// Main upload batch, or `None` when the warm-up speed stands as the result.
    pub fn upload_workload(&self, mode: TransferMode, warmup_mbps: f64) -> Option<Workload> {
        self.workload(mode, warmup_mbps, &UPLOAD_TIERS)
    }

    fn workload(&self, mode: TransferMode, warmup_mbps: f64, tiers: &[Tier]) -> Option<Workload> {
        match mode {
            TransferMode::Single => Some(self.single),
            TransferMode::Multi => tiers
                .iter()
                .find(|(min_mbps, _)| warmup_mbps > *min_mbps)
                .map(|(_, workload)| *workload),
        }
    }

    /// Image side length at `index`, clamped to the largest size.
    pub fn download_size(&self, index: usize) -> u32 {
        clamped(&self.download_sizes, index)
    }

    /// Upload payload length in bytes at `index`, clamped to the largest size.
    pub fn upload_bytes(&self, index: usize) -> usize {
        clamped(&self.upload_sizes_kb, index) as usize * 1024
    }
}

fn clamped(sizes: &[u32], index: usize) -> u32 {
    sizes
        .get(index)
        .or_else(|| sizes.last())
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_mode_ignores_warmup_speed() {
        let plan = TransferPlan::default();
        for speed in [0.5, 3.0, 500.0] {
            assert_eq!(
                plan.download_workload(TransferMode::Single, speed),
                Some(Workload {
                    requests: 6,
                    size_index: 3
                })
            );
        }
    }

    #[test]
    fn test_download_tiers() {
        let plan = TransferPlan::default();
        let at = |mbps| plan.download_workload(TransferMode::Multi, mbps);

        assert_eq!(at(120.0).unwrap().requests, 32);
        assert_eq!(at(120.0).unwrap().size_index, 6);
        assert_eq!(at(50.0).unwrap().requests, 16);
        assert_eq!(at(8.0).unwrap().requests, 8);
        assert_eq!(at(3.0).unwrap().requests, 4);
        assert_eq!(at(2.5), None);
    }

    #[test]
    fn test_upload_tiers() {
        let plan = TransferPlan::default();
        let at = |mbps| plan.upload_workload(TransferMode::Multi, mbps);

        assert_eq!(at(60.0).unwrap().requests, 40);
        assert_eq!(at(20.0).unwrap().size_index, 9);
        assert_eq!(at(3.0).unwrap().size_index, 5);
        assert_eq!(at(1.0), None);
    }

    #[test]
    fn test_sizes_clamp_to_last_entry() {
        let plan = TransferPlan::default();
        assert_eq!(plan.download_size(3), 1000);
        assert_eq!(plan.download_size(42), 4000);
        assert_eq!(plan.upload_bytes(0), 100 * 1024);
        assert_eq!(plan.upload_bytes(99), 4000 * 1024);
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(TransferMode::from_flag(true), TransferMode::Multi);
        assert_eq!(TransferMode::from_flag(false).as_str(), "single");
    }
}
