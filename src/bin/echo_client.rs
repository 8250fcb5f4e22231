use rand::Rng;

static MESSAGE_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1000);

const CONV: u32 = 0x11223344;

fn main() {
    let config = kcp_engine::Config::fast();

    let mut session = kcp_engine::Session::connect_with_config(
        ("127.0.0.1", 8889),
        ("127.0.0.1", 8888),
        CONV,
        config,
    )
    .expect("failed to create kcp session");

    let mut rng = rand::thread_rng();

    loop {
        let len = rng.gen_range(1..4000);
        let message = (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();

        let t0 = std::time::Instant::now();

        session
            .send(&message)
            .expect("message exceeds receive window");

        match session.wait_message_timeout(MESSAGE_TIMEOUT) {
            Ok(Some(reply)) => {
                let ok = *reply == message[..];
                println!(
                    "{} bytes, rtt {}ms, srtt {}ms, rto {}ms, match {}",
                    len,
                    t0.elapsed().as_millis(),
                    session.endpoint().srtt(),
                    session.endpoint().rto(),
                    ok
                );
            }
            Ok(None) => {
                println!("no reply after {}ms", MESSAGE_TIMEOUT.as_millis());
            }
            Err(err) => {
                println!("socket error: {err}");
                break;
            }
        }

        if session.is_dead() {
            println!("link dead");
            break;
        }

        std::thread::sleep(std::time::Duration::from_millis(100));
    }
}
