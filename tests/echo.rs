#[allow(dead_code)]
mod common;

use std::cell::RefCell;
use std::rc::Rc;

use rstest::rstest;

use common::{pump, vnet_endpoint, LatencySimulator};
use kcp_engine::Config;

const MESSAGE_COUNT: u32 = 1000;
const SEND_PERIOD_MS: u32 = 20;

#[derive(Clone, Copy, Debug)]
enum Mode {
    Default,
    Normal,
    Fast,
}

fn mode_config(mode: Mode) -> Config {
    let config = match mode {
        Mode::Default => Config::normal(),
        Mode::Normal => Config::no_congestion(),
        Mode::Fast => Config::fast(),
    };

    Config {
        send_window: 128,
        receive_window: 128,
        ..config
    }
}

struct Summary {
    elapsed_ms: u32,
    avg_rtt: u32,
    max_rtt: u32,
    tx: usize,
    dropped: usize,
}

fn diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

// Peer 0 sends sequence-numbered, timestamped messages every 20ms and peer 1 echoes them back.
// Returns once every echo has been received in order.
fn echo_trial(mode: Mode, lost_rate: u32, seed: u64, start_ms: u32, time_limit_ms: u32) -> Summary {
    let vnet = Rc::new(RefCell::new(LatencySimulator::new(
        seed, start_ms, lost_rate, 60, 125,
    )));

    let mut config0 = mode_config(mode);
    if let Mode::Fast = mode {
        config0.min_rto_ms = Some(10);
        config0.fast_resend = 1;
    }

    let mut kcp0 = vnet_endpoint(&vnet, 0, config0);
    let mut kcp1 = vnet_endpoint(&vnet, 1, mode_config(mode));

    let mut current = start_ms;
    let mut slap = current.wrapping_add(SEND_PERIOD_MS);

    let mut index = 0_u32;
    let mut next = 0_u32;

    let mut sum_rtt = 0_u64;
    let mut max_rtt = 0_u32;

    let mut sent_md5 = md5::Context::new();
    let mut recv_md5 = md5::Context::new();

    let mut buffer = [0u8; 10];

    while next < MESSAGE_COUNT {
        vnet.borrow_mut().advance(1);
        current = vnet.borrow().current();

        assert!(
            diff(current, start_ms) < time_limit_ms as i32,
            "{:?} mode stalled at {} of {} messages",
            mode,
            next,
            MESSAGE_COUNT
        );

        kcp0.update(current);
        kcp1.update(current);

        while diff(current, slap) >= 0 && index < MESSAGE_COUNT {
            let mut message = [0u8; 8];
            message[..4].copy_from_slice(&index.to_le_bytes());
            message[4..].copy_from_slice(&current.to_le_bytes());

            kcp0.send(&message).unwrap();
            sent_md5.consume(message);

            index += 1;
            slap = slap.wrapping_add(SEND_PERIOD_MS);
        }

        pump(&vnet, &mut kcp0, &mut kcp1);

        while let Ok(len) = kcp1.recv(&mut buffer) {
            kcp1.send(&buffer[..len]).unwrap();
        }

        while let Ok(len) = kcp0.recv(&mut buffer) {
            assert_eq!(len, 8);

            let sn = u32::from_le_bytes(buffer[..4].try_into().unwrap());
            let ts = u32::from_le_bytes(buffer[4..8].try_into().unwrap());

            assert_eq!(sn, next, "{:?} mode received messages out of order", mode);
            next += 1;

            let rtt = current.wrapping_sub(ts);
            sum_rtt += rtt as u64;
            max_rtt = max_rtt.max(rtt);

            recv_md5.consume(&buffer[..8]);
        }
    }

    assert_eq!(sent_md5.compute(), recv_md5.compute());

    let vnet = vnet.borrow();

    Summary {
        elapsed_ms: current.wrapping_sub(start_ms),
        avg_rtt: (sum_rtt / MESSAGE_COUNT as u64) as u32,
        max_rtt,
        tx: vnet.tx(0),
        dropped: vnet.dropped(0) + vnet.dropped(1),
    }
}

#[rstest]
#[case(Mode::Default)]
#[case(Mode::Normal)]
#[case(Mode::Fast)]
fn echo_lossless(#[case] mode: Mode) {
    let summary = echo_trial(mode, 0, 0x5EED, 1_000_000, 60_000);

    println!(
        "{:?} mode: {}ms, avgrtt={} maxrtt={} tx={}",
        mode, summary.elapsed_ms, summary.avg_rtt, summary.max_rtt, summary.tx
    );

    assert_eq!(summary.dropped, 0);

    // Without a congestion window, nothing holds an echo back for long
    if !matches!(mode, Mode::Default) {
        assert!(summary.max_rtt < 1000, "maxrtt = {}", summary.max_rtt);
    }
}

#[rstest]
#[case(Mode::Default)]
#[case(Mode::Normal)]
#[case(Mode::Fast)]
fn echo_lossy(#[case] mode: Mode) {
    let summary = echo_trial(mode, 10, 0xD00D, 1_000_000, 600_000);

    println!(
        "{:?} mode: {}ms, avgrtt={} maxrtt={} tx={}",
        mode, summary.elapsed_ms, summary.avg_rtt, summary.max_rtt, summary.tx
    );

    // Every message made it through despite the drops
    assert!(summary.dropped > 0);
}

#[test]
fn echo_across_clock_wrap() {
    // The virtual clock wraps around u32::MAX midway through
    let summary = echo_trial(Mode::Fast, 10, 0xF00D, u32::MAX - 10_000, 600_000);

    assert!(summary.elapsed_ms > MESSAGE_COUNT * SEND_PERIOD_MS);
}
