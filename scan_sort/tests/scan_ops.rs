mod common;

use common::{host, random_values, rng, NoProgressDevice};
use scan_sort::{
    scan, sequential_scan, Device, DispatchOrder, Error, HierarchicalScan, LookbackScan,
    ScanStrategy,
};

const STRATEGIES: [ScanStrategy; 2] = [ScanStrategy::Lookback, ScanStrategy::Hierarchical];

#[test]
fn scans_the_concrete_example() {
    let device = host(DispatchOrder::Ascending);
    for strategy in STRATEGIES {
        let ys = scan(&device, &[3, 1, 4, 1, 5], strategy).unwrap();
        assert_eq!(ys, [3, 4, 8, 9, 14], "{strategy:?}");
    }
}

#[test]
fn matches_the_running_sum_of_random_values() {
    let device = host(DispatchOrder::Ascending);
    let xs = random_values(65536, 100, &mut rng());
    let expected = sequential_scan(&xs);
    for strategy in STRATEGIES {
        assert_eq!(scan(&device, &xs, strategy).unwrap(), expected, "{strategy:?}");
    }
}

#[test]
fn single_element_is_returned_unchanged() {
    let device = host(DispatchOrder::Ascending);
    for strategy in STRATEGIES {
        assert_eq!(scan(&device, &[-42], strategy).unwrap(), [-42]);
    }
}

#[test]
fn handles_sizes_that_are_not_multiples_of_a_section() {
    let device = host(DispatchOrder::Ascending);
    let mut rng = rng();
    for len in [2, 127, 128, 129, 255, 511, 512, 513, 1000, 16385] {
        let xs = random_values(len, 1000, &mut rng);
        let expected = sequential_scan(&xs);
        for strategy in STRATEGIES {
            assert_eq!(
                scan(&device, &xs, strategy).unwrap(),
                expected,
                "{strategy:?} over {len} elements"
            );
        }
    }
}

#[test]
fn hierarchical_scan_spans_three_levels() {
    let device = host(DispatchOrder::Ascending);
    let mut rng = rng();
    for (len, levels) in [(20000, [20000, 156, 1]), (40000, [40000, 312, 2])] {
        let xs = random_values(len, 100, &mut rng);
        let hierarchical = HierarchicalScan::new(&device, len).unwrap();
        assert_eq!(hierarchical.level_sizes().as_slice(), levels);

        let data = device.upload(&xs).unwrap();
        hierarchical.run(&data).unwrap();
        assert_eq!(device.read_back(&data).unwrap(), sequential_scan(&xs));
    }
}

#[test]
fn rerunning_on_the_same_input_gives_the_same_output() {
    let device = host(DispatchOrder::Ascending);
    let xs = random_values(3000, 50, &mut rng());
    let expected = sequential_scan(&xs);

    let lookback = LookbackScan::new(&device, xs.len()).unwrap();
    let input = device.upload(&xs).unwrap();
    for _ in 0..3 {
        let output = device.alloc_zeroed(xs.len()).unwrap();
        lookback.run(&input, &output).unwrap();
        assert_eq!(device.read_back(&output).unwrap(), expected);
    }
    assert_eq!(device.read_back(&input).unwrap(), xs);

    let hierarchical = HierarchicalScan::new(&device, xs.len()).unwrap();
    for _ in 0..2 {
        let data = device.upload(&xs).unwrap();
        hierarchical.run(&data).unwrap();
        assert_eq!(device.read_back(&data).unwrap(), expected);
    }
}

#[test]
fn lookback_and_hierarchical_agree() {
    let device = host(DispatchOrder::Ascending);
    let mut rng = rng();
    for len in [1, 700, 4096, 9999] {
        let xs = random_values(len, 1 << 20, &mut rng);
        assert_eq!(
            scan(&device, &xs, ScanStrategy::Lookback).unwrap(),
            scan(&device, &xs, ScanStrategy::Hierarchical).unwrap(),
            "{len} elements"
        );
    }
}

#[test]
fn result_does_not_depend_on_dispatch_order() {
    let xs = random_values(10000, 100, &mut rng());
    let expected = sequential_scan(&xs);
    for order in [DispatchOrder::Descending, DispatchOrder::Shuffled(11)] {
        let device = host(order);
        for strategy in STRATEGIES {
            assert_eq!(
                scan(&device, &xs, strategy).unwrap(),
                expected,
                "{strategy:?} dispatched {order:?}"
            );
        }
    }
}

#[test]
fn sums_wrap_like_the_host_reference() {
    let device = host(DispatchOrder::Ascending);
    let xs: Vec<i32> = (0..1500)
        .map(|i| if i % 3 == 0 { i32::MAX } else { -(i as i32) })
        .collect();
    let expected = sequential_scan(&xs);
    for strategy in STRATEGIES {
        assert_eq!(scan(&device, &xs, strategy).unwrap(), expected);
    }
}

#[test]
fn empty_input_is_rejected() {
    let device = host(DispatchOrder::Ascending);
    for strategy in STRATEGIES {
        assert!(matches!(scan(&device, &[], strategy), Err(Error::EmptyInput)));
    }
    assert!(matches!(
        LookbackScan::new(&device, 0),
        Err(Error::EmptyInput)
    ));
}

#[test]
fn lookback_requires_forward_progress() {
    let device = NoProgressDevice(host(DispatchOrder::Ascending));
    assert!(matches!(
        scan(&device, &[1, 2, 3], ScanStrategy::Lookback),
        Err(Error::ForwardProgress)
    ));
    assert_eq!(ScanStrategy::Auto.resolve(&device), ScanStrategy::Hierarchical);
    assert_eq!(
        scan(&device, &[1, 2, 3], ScanStrategy::Auto).unwrap(),
        [1, 3, 6]
    );
}
