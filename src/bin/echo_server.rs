static MESSAGE_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1000);

const CONV: u32 = 0x11223344;

fn main() {
    let config = kcp_engine::Config::fast();

    let mut session = kcp_engine::Session::connect_with_config(
        ("127.0.0.1", 8888),
        ("127.0.0.1", 8889),
        CONV,
        config,
    )
    .expect("failed to create kcp session");

    loop {
        match session.wait_message_timeout(MESSAGE_TIMEOUT) {
            Ok(Some(message)) => {
                println!("echo {} bytes", message.len());

                if let Err(err) = session.send(&message) {
                    println!("send failed: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => {
                println!("socket error: {err}");
                break;
            }
        }

        if session.is_dead() {
            println!("link dead");
            break;
        }
    }
}
