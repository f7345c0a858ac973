mod dummy;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dummy::*;
use gemmtune_runtime::tune::{AutotuneError, LocalTuner, TuneCacheResult};
use gemmtune_runtime::local_tuner;
use serial_test::serial;

fn bindings(
    client: &gemmtune_runtime::client::ComputeClient,
    lhs: &[u8],
    rhs: &[u8],
) -> Bindings {
    Bindings::new(
        client.create(lhs).unwrap(),
        client.create(rhs).unwrap(),
        client.empty(lhs.len()).unwrap(),
    )
}

#[test_log::test]
fn created_resource_is_the_same_when_read() {
    let client = test_client();
    let resource = Vec::from([0, 1, 2]);
    let handle = client.create(&resource).unwrap();

    let obtained_resource = client.read_one(&handle).unwrap();

    assert_eq!(resource, obtained_resource)
}

#[test_log::test]
fn empty_allocates_zeroed_memory() {
    let client = test_client();
    let handle = client.empty(4).unwrap();

    let empty_resource = client.read_one(&handle).unwrap();

    assert_eq!(empty_resource, vec![0; 4]);
}

#[test_log::test]
fn typed_resources_round_trip() {
    let client = test_client();
    let handle = client.create_from_slice(&[1.5f32, -2.0]).unwrap();

    assert_eq!(client.read_as::<f32>(&handle).unwrap(), vec![1.5, -2.0]);
}

#[test_log::test]
fn execute_elementwise_addition() {
    let client = test_client();
    let inputs = bindings(&client, &[0, 1, 2], &[4, 4, 4]);
    let out = inputs.out.clone();

    client
        .launch(Box::new(ElementwiseAddition::new(inputs)))
        .unwrap();

    assert_eq!(client.read_one(&out).unwrap(), vec![4, 5, 6]);
    client.sync().unwrap();
}

#[test_log::test]
fn kernel_errors_are_reported_by_sync() {
    let client = test_client();
    let inputs = bindings(&client, &[0], &[0]);

    client.launch(Box::new(FailingKernel::new(inputs))).unwrap();

    let err = client.sync().unwrap_err();
    assert!(err.to_string().contains("unsupported problem"), "{err}");
    client.sync().unwrap();
}

#[test_log::test]
fn dropping_handles_releases_memory() {
    let client = test_client();
    let handle = client.empty(256).unwrap();
    let clone = handle.clone();

    assert_eq!(client.memory_usage().unwrap().bytes_in_use, 256);

    core::mem::drop(handle);
    assert_eq!(client.memory_usage().unwrap().bytes_in_use, 256);

    core::mem::drop(clone);
    assert_eq!(client.memory_usage().unwrap().bytes_in_use, 0);
}

#[test_log::test]
fn allocations_over_capacity_fail() {
    let client = test_client();

    assert!(client.empty(2 * 1024 * 1024).is_err());
}

#[test_log::test]
#[serial]
fn autotune_basic_addition_execution() {
    static TUNER: LocalTuner<String, String> = local_tuner!("autotune_basic_addition_execution");

    let client = test_client();
    let inputs = bindings(&client, &[0, 1, 2], &[4, 4, 4]);
    let out = inputs.out.clone();

    let test_set = TUNER.init(|| {
        let client = test_client();
        let shapes = vec![vec![1, 3], vec![1, 3], vec![1, 3]];
        dummy::addition_set(client, shapes)
    });
    TUNER
        .execute(&"test".to_string(), &client, test_set, inputs)
        .unwrap();

    // If slow kernel was selected it would output [0, 1, 2]
    assert_eq!(client.read_one(&out).unwrap(), vec![4, 5, 6]);
}

#[test_log::test]
#[serial]
fn autotune_basic_multiplication_execution() {
    static TUNER: LocalTuner<String, String> =
        local_tuner!("autotune_basic_multiplication_execution");

    let client = test_client();
    let inputs = bindings(&client, &[0, 1, 2], &[4, 4, 4]);
    let out = inputs.out.clone();

    let test_set = TUNER.init(|| {
        let client = test_client();
        let shapes = vec![vec![1, 3], vec![1, 3], vec![1, 3]];
        dummy::multiplication_set(client, shapes)
    });
    TUNER
        .execute(&"test".to_string(), &client, test_set, inputs)
        .unwrap();

    // If slow kernel was selected it would output [0, 1, 2]
    assert_eq!(client.read_one(&out).unwrap(), vec![0, 4, 8]);
}

#[test_log::test]
#[serial]
fn autotune_result_is_cached_for_the_key() {
    static TUNER: LocalTuner<String, String> = local_tuner!("autotune_result_is_cached");

    let client = test_client();
    let id = "test".to_string();
    let init = || dummy::addition_set(test_client(), vec![vec![1, 2]]);

    let set = TUNER.init(init);
    TUNER
        .execute(&id, &client, set.clone(), bindings(&client, &[1, 1], &[1, 1]))
        .unwrap();

    let key = "add-[1, 2]".to_string();
    assert_eq!(
        TUNER.autotune_result(&id, &key),
        TuneCacheResult::Hit { fastest_index: 0 }
    );

    // The same closure type returns the same set.
    assert!(Arc::ptr_eq(&set, &TUNER.init(init)));

    let inputs = bindings(&client, &[2, 3], &[5, 5]);
    let out = inputs.out.clone();
    TUNER.execute(&id, &client, set, inputs).unwrap();
    assert_eq!(client.read_one(&out).unwrap(), vec![7, 8]);
}

#[test_log::test]
#[serial]
fn autotune_skips_failing_tunables() {
    static TUNER: LocalTuner<String, String> = local_tuner!("autotune_skips_failing_tunables");

    let client = test_client();
    let inputs = bindings(&client, &[1, 2], &[3, 4]);
    let out = inputs.out.clone();

    let set = TUNER.init(|| dummy::failing_set(test_client(), "skips"));
    TUNER
        .execute(&"test".to_string(), &client, set, inputs)
        .unwrap();

    assert_eq!(client.read_one(&out).unwrap(), vec![4, 6]);
}

#[test_log::test]
#[serial]
fn autotune_without_valid_tunable_fails() {
    static TUNER: LocalTuner<String, String> = local_tuner!("autotune_without_valid_tunable");

    let client = test_client();
    let inputs = bindings(&client, &[1], &[1]);

    let set = TUNER.init(|| dummy::invalid_set(test_client(), "invalid"));
    let err = TUNER
        .execute(&"test".to_string(), &client, set, inputs)
        .unwrap_err();

    match err {
        AutotuneError::NoValidTunable { key, failures } => {
            assert_eq!(key, "invalid-invalid");
            let names: Vec<_> = failures.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(names, vec!["failing", "skip"]);
        }
        err => panic!("Unexpected error {err}"),
    }
    assert_eq!(
        TUNER.autotune_result(&"test".to_string(), &"invalid-invalid".to_string()),
        TuneCacheResult::Miss
    );
}

#[test_log::test]
#[serial]
fn autotune_stops_at_first_valid_group() {
    static TUNER: LocalTuner<String, String> = local_tuner!("autotune_stops_at_first_valid_group");

    let client = test_client();
    let inputs = bindings(&client, &[1, 2], &[1, 1]);
    let out = inputs.out.clone();
    let low_group_runs = Arc::new(AtomicUsize::new(0));

    let counter = low_group_runs.clone();
    let set = TUNER.init(move || dummy::grouped_set(test_client(), "groups", counter.clone()));
    TUNER
        .execute(&"test".to_string(), &client, set, inputs)
        .unwrap();

    assert_eq!(client.read_one(&out).unwrap(), vec![2, 3]);
    assert_eq!(low_group_runs.load(Ordering::Relaxed), 0);
}
