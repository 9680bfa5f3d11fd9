mod common;

use common::host;
use scan_sort::{
    device::{decode_le, encode_le, Kernel, Launch},
    Device, DispatchOrder, Error, HostConfig, HostDevice, LookbackScan,
    ScanStrategy,
};

#[test]
fn written_buffer_bound_twice_is_rejected_before_launch() {
    let device = host(DispatchOrder::Ascending);
    let data = device.upload(&[3, 1, 2]).unwrap();
    let prefix = device.upload(&[0, 1, 1]).unwrap();

    let result = device.launch(&Launch::RadixScatter {
        bit: 0,
        source: &data,
        prefix: [&prefix, &prefix],
        output: &data,
    });
    assert!(matches!(
        result,
        Err(Error::Aliasing {
            kernel: Kernel::RadixScatter,
            buffer: "output"
        })
    ));
    assert_eq!(device.read_back(&data).unwrap(), [3, 1, 2]);
}

#[test]
fn both_streams_cannot_share_a_buffer() {
    let device = host(DispatchOrder::Ascending);
    let data = device.alloc_zeroed(300).unwrap();
    let sums = device.alloc_zeroed(2).unwrap();
    let result = device.launch(&Launch::DualAddBlockSums {
        streams: [&data, &data],
        sums: [&sums, &sums],
    });
    assert!(matches!(
        result,
        Err(Error::Aliasing {
            kernel: Kernel::DualAddBlockSums,
            buffer: "zeros"
        })
    ));
}

#[test]
fn wrongly_sized_level_is_a_capacity_error() {
    let device = host(DispatchOrder::Ascending);
    let data = device.alloc_zeroed(300).unwrap();
    let sums = device.alloc_zeroed(3).unwrap();

    let result = device.launch(&Launch::AddBlockSums {
        data: &data,
        sums: &sums,
    });
    assert!(matches!(
        result,
        Err(Error::Capacity {
            kernel: Kernel::AddBlockSums,
            buffer: "sums",
            expected: 2,
            actual: 3
        })
    ));
}

#[test]
fn wrongly_sized_status_table_is_a_capacity_error() {
    let device = host(DispatchOrder::Ascending);
    let input = device.alloc_zeroed(1000).unwrap();
    let output = device.alloc_zeroed(1000).unwrap();
    let counter = device.alloc_zeroed(1).unwrap();
    let status = device.alloc_zeroed(3).unwrap();

    let result = device.launch(&Launch::LookbackScan {
        input: &input,
        output: &output,
        counter: &counter,
        status: &status,
    });
    assert!(matches!(
        result,
        Err(Error::Capacity {
            buffer: "status",
            expected: 6,
            ..
        })
    ));
}

#[test]
fn lookback_input_must_match_the_planned_length() {
    let device = host(DispatchOrder::Ascending);
    let lookback = LookbackScan::new(&device, 10).unwrap();
    let input = device.alloc_zeroed(11).unwrap();
    let output = device.alloc_zeroed(11).unwrap();
    assert!(matches!(
        lookback.run(&input, &output),
        Err(Error::LengthMismatch {
            expected: 10,
            actual: 11
        })
    ));
}

#[test]
fn raw_buffers_are_packed_little_endian() {
    let xs = [0, 1, -1, i32::MIN, 0x01020304];
    let bytes = encode_le(&xs);
    assert_eq!(bytes.len(), 20);
    assert_eq!(&bytes[16..], &[4, 3, 2, 1]);
    assert_eq!(decode_le(&bytes).unwrap(), xs);
    assert!(matches!(decode_le(&bytes[..7]), Err(Error::Layout(7))));
}

#[test]
fn oversized_emulator_fails_the_launch() {
    let device = HostDevice::new(HostConfig {
        resident_blocks: 100_000,
        ..HostConfig::default()
    });
    let xs = vec![1; 512 * 40];
    let result = LookbackScan::new(&device, xs.len())
        .and_then(|plan| plan.run(&device.upload(&xs)?, &device.alloc_zeroed(xs.len())?));
    assert!(matches!(result, Err(Error::Launch(_))));

    let device = HostDevice::new(HostConfig::default().with_resident_blocks(100_000));
    let ys = scan_sort::scan(&device, &xs, ScanStrategy::Hierarchical).unwrap();
    assert_eq!(ys[xs.len() - 1], 512 * 40);
}
