use std::time::Instant;

use gemmtune_runtime::client::ComputeClient;
use gemmtune_runtime::local_tuner;
use gemmtune_runtime::tune::{AutotuneError, FunctionTunable, LocalTuner, Tunable, TunableSet};

static TUNER: LocalTuner<String, String> = local_tuner!("bench");

fn sum(data: Vec<u64>) -> Result<u64, AutotuneError> {
    Ok(data.iter().sum())
}

fn sum_pairwise(data: Vec<u64>) -> Result<u64, AutotuneError> {
    Ok(data.chunks(2).map(|chunk| chunk.iter().sum::<u64>()).sum())
}

fn main() {
    let client = ComputeClient::host(0).expect("host client");
    let set = TUNER.init(|| {
        TunableSet::new(
            |data: &Vec<u64>| format!("len={}", data.len()),
            |_key: &String, data: &Vec<u64>| data.clone(),
        )
        .with(Tunable::new(FunctionTunable::named("sum", sum)))
        .with(Tunable::new(FunctionTunable::named("sum-pairwise", sum_pairwise)))
    });

    for len in [1 << 10, 1 << 14, 1 << 18] {
        let data: Vec<u64> = (0..len).collect();

        let start = Instant::now();
        let cold = TUNER
            .execute(&"host".to_string(), &client, set.clone(), data.clone())
            .expect("autotune");
        let cold_elapsed = start.elapsed();

        let start = Instant::now();
        let warm = TUNER
            .execute(&"host".to_string(), &client, set.clone(), data)
            .expect("cached");
        let warm_elapsed = start.elapsed();

        assert_eq!(cold, warm);
        println!("len={len}: autotune {cold_elapsed:?}, cached {warm_elapsed:?}");
    }
}
